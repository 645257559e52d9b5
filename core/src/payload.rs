//! Request bodies for logging charging sessions.
//!
//! # Design
//! The server distinguishes "not sent" from "sent as null", so the options
//! builders record only the fields a caller actually sets. Fields are kept in
//! an insertion-ordered JSON map and `energyConsumedKwh` is always written
//! first. Numbers JSON cannot represent are refused when the payload is
//! built rather than being sent as `null`.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::error::{EvTrackerError, Result};

/// Wire format for timestamps: second precision, always UTC, `Z` suffix.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A session boundary, either pre-formatted by the caller or a structured time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Timestamp {
    /// Sent to the server exactly as given.
    Formatted(String),
    At(DateTime<Utc>),
}

impl Timestamp {
    pub fn to_wire(&self) -> String {
        match self {
            Timestamp::Formatted(raw) => raw.clone(),
            Timestamp::At(at) => at.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

impl From<&str> for Timestamp {
    fn from(raw: &str) -> Self {
        Timestamp::Formatted(raw.to_string())
    }
}

impl From<String> for Timestamp {
    fn from(raw: String) -> Self {
        Timestamp::Formatted(raw)
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Timestamp {
    fn from(at: DateTime<Tz>) -> Self {
        Timestamp::At(at.with_timezone(&Utc))
    }
}

#[derive(Debug, Clone, Default)]
struct Fields {
    values: Map<String, Value>,
    // Keys last set to NaN or infinity.
    non_finite: Vec<String>,
}

impl Fields {
    fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_string(), value.into());
    }

    fn set_upper(&mut self, key: &str, value: &str) {
        self.set(key, value.to_uppercase());
    }

    fn set_number(&mut self, key: &str, value: f64) {
        self.non_finite.retain(|k| k != key);
        if !value.is_finite() {
            self.non_finite.push(key.to_string());
        }
        self.set(key, value);
    }

    fn into_payload(self, energy_kwh: f64) -> Result<Value> {
        let mut rejected = self.non_finite;
        if !energy_kwh.is_finite() {
            rejected.insert(0, "energyConsumedKwh".to_string());
        }
        if !rejected.is_empty() {
            return Err(EvTrackerError::InvalidPayload(format!(
                "{} must be finite",
                rejected.join(", ")
            )));
        }

        let mut payload = Map::with_capacity(self.values.len() + 1);
        payload.insert("energyConsumedKwh".to_string(), Value::from(energy_kwh));
        payload.extend(self.values);
        Ok(Value::Object(payload))
    }
}

/// Optional fields for `EvTrackerClient::log_session`.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    fields: Fields,
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_time(mut self, at: impl Into<Timestamp>) -> Self {
        self.fields.set("startTime", at.into().to_wire());
        self
    }

    pub fn end_time(mut self, at: impl Into<Timestamp>) -> Self {
        self.fields.set("endTime", at.into().to_wire());
        self
    }

    pub fn car_id(mut self, car_id: i64) -> Self {
        self.fields.set("carId", car_id);
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.fields.set("location", location.into());
        self
    }

    /// Idempotency key; resubmitting the same value does not create a duplicate.
    pub fn external_id(mut self, external_id: impl Into<String>) -> Self {
        self.fields.set("externalId", external_id.into());
        self
    }

    /// Charging provider, e.g. `HOME` or a public network operator code.
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.fields.set("provider", provider.into());
        self
    }

    /// `GRID` or `SOLAR`; upper-cased before sending.
    pub fn energy_source(mut self, source: &str) -> Self {
        self.fields.set_upper("energySource", source);
        self
    }

    /// `HIGH` or `LOW` tariff; upper-cased before sending.
    pub fn rate_type(mut self, rate: &str) -> Self {
        self.fields.set_upper("rateType", rate);
        self
    }

    pub fn price_per_kwh(mut self, price: f64) -> Self {
        self.fields.set_number("pricePerKwhWithoutVat", price);
        self
    }

    pub fn vat_percentage(mut self, vat: f64) -> Self {
        self.fields.set_number("vatPercentage", vat);
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.fields.set("notes", notes.into());
        self
    }

    /// Fails with `InvalidPayload` when `energy_kwh` or a numeric field is not finite.
    pub fn into_payload(self, energy_kwh: f64) -> Result<Value> {
        self.fields.into_payload(energy_kwh)
    }
}

/// Optional fields for `EvTrackerClient::log_session_simple`.
///
/// Anything left unset is filled in by the server: start time estimated from
/// the energy, end time now, the account's default car, location "Home".
#[derive(Debug, Clone, Default)]
pub struct SimpleSessionOptions {
    fields: Fields,
}

impl SimpleSessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_time(mut self, at: impl Into<Timestamp>) -> Self {
        self.fields.set("startTime", at.into().to_wire());
        self
    }

    pub fn end_time(mut self, at: impl Into<Timestamp>) -> Self {
        self.fields.set("endTime", at.into().to_wire());
        self
    }

    pub fn car_id(mut self, car_id: i64) -> Self {
        self.fields.set("carId", car_id);
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.fields.set("location", location.into());
        self
    }

    pub fn external_id(mut self, external_id: impl Into<String>) -> Self {
        self.fields.set("externalId", external_id.into());
        self
    }

    pub fn energy_source(mut self, source: &str) -> Self {
        self.fields.set_upper("energySource", source);
        self
    }

    pub fn rate_type(mut self, rate: &str) -> Self {
        self.fields.set_upper("rateType", rate);
        self
    }

    pub fn into_payload(self, energy_kwh: f64) -> Result<Value> {
        self.fields.into_payload(energy_kwh)
    }
}
