//! Domain models for the EV Tracker API.
//!
//! # Design
//! Each model maps to and from the camelCase wire shape through serde. Missing
//! required fields (`id`, `name`) fail the parse; optional fields fall back to
//! a default or `None` and never raise, even when the server sends `null` or
//! a timestamp that does not parse.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// An EV registered in the user's account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Car {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

/// A charging session as returned after logging one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChargingSession {
    pub id: i64,
    #[serde(rename = "energyConsumedKwh", default, deserialize_with = "null_as_default")]
    pub energy_kwh: f64,
    #[serde(rename = "totalCost", default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_type: Option<String>,
}

/// Monthly/yearly statistics for the account.
///
/// The `last_session_*` and `avg_cost_per_kwh` fields stay `None` when the
/// server has nothing to report, which is not the same as zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AggregateState {
    #[serde(default, deserialize_with = "null_as_default")]
    pub monthly_energy: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub monthly_cost: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub monthly_sessions: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub yearly_energy: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub yearly_cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_session_energy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_session_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_cost_per_kwh: Option<f64>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_str().and_then(parse_timestamp))
}

/// Parse an ISO-8601 timestamp. Offset-less values are taken as UTC.
///
/// Seconds may be omitted (`2025-11-26T22:00Z`); a trailing `Z` is read as
/// `+00:00`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    let normalized = match raw.strip_suffix(|c: char| c.eq_ignore_ascii_case(&'z')) {
        Some(local) => format!("{local}+00:00"),
        None => raw.to_string(),
    };
    for format in ["%Y-%m-%dT%H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M%#z"] {
        if let Ok(parsed) = DateTime::parse_from_str(&normalized, format) {
            return Some(parsed.with_timezone(&Utc));
        }
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn car_parses_required_and_optional_fields() {
        let car: Car = serde_json::from_value(json!({
            "id": 7,
            "name": "Daily",
            "make": "Tesla",
            "model": "Model 3",
            "year": 2022,
            "batteryCapacity": 60
        }))
        .unwrap();
        assert_eq!(car.id, 7);
        assert_eq!(car.make.as_deref(), Some("Tesla"));
        assert_eq!(car.year, Some(2022));
    }

    #[test]
    fn car_optional_fields_may_be_null() {
        let car: Car =
            serde_json::from_value(json!({"id": 1, "name": "Tesla Model 3", "make": null}))
                .unwrap();
        assert!(car.make.is_none());
        assert!(car.model.is_none());
        assert!(car.year.is_none());
    }

    #[test]
    fn car_rejects_missing_id() {
        let result: Result<Car, _> = serde_json::from_value(json!({"name": "No id"}));
        assert!(result.is_err());
    }

    #[test]
    fn session_parses_minimal_object() {
        let session: ChargingSession =
            serde_json::from_value(json!({"id": 100, "energyConsumedKwh": 25.5})).unwrap();
        assert_eq!(session.id, 100);
        assert_eq!(session.energy_kwh, 25.5);
        assert!(session.cost.is_none());
        assert!(session.start_time.is_none());
        assert!(session.end_time.is_none());
        assert!(session.location.is_none());
        assert!(session.energy_source.is_none());
        assert!(session.rate_type.is_none());
    }

    #[test]
    fn session_energy_defaults_to_zero() {
        let session: ChargingSession = serde_json::from_value(json!({"id": 1})).unwrap();
        assert_eq!(session.energy_kwh, 0.0);
        let session: ChargingSession =
            serde_json::from_value(json!({"id": 1, "energyConsumedKwh": null})).unwrap();
        assert_eq!(session.energy_kwh, 0.0);
    }

    #[test]
    fn session_parses_timestamps_and_cost() {
        let session: ChargingSession = serde_json::from_value(json!({
            "id": 5,
            "energyConsumedKwh": 30.0,
            "totalCost": 150.25,
            "startTime": "2025-11-26T20:00:00Z",
            "endTime": "2025-11-26T23:00:00+01:00",
            "energySource": "SOLAR",
            "rateType": "LOW"
        }))
        .unwrap();
        assert_eq!(session.cost, Some(150.25));
        assert_eq!(
            session.start_time,
            Some(Utc.with_ymd_and_hms(2025, 11, 26, 20, 0, 0).unwrap())
        );
        assert_eq!(
            session.end_time,
            Some(Utc.with_ymd_and_hms(2025, 11, 26, 22, 0, 0).unwrap())
        );
        assert_eq!(session.energy_source.as_deref(), Some("SOLAR"));
    }

    #[test]
    fn session_invalid_timestamps_become_absent() {
        let session: ChargingSession = serde_json::from_value(json!({
            "id": 5,
            "startTime": "yesterday-ish",
            "endTime": 1732658400
        }))
        .unwrap();
        assert!(session.start_time.is_none());
        assert!(session.end_time.is_none());
    }

    #[test]
    fn offsetless_timestamp_is_utc() {
        assert_eq!(
            parse_timestamp("2025-11-26T22:00:00.500"),
            Some(
                Utc.with_ymd_and_hms(2025, 11, 26, 22, 0, 0).unwrap()
                    + chrono::Duration::milliseconds(500)
            )
        );
        assert_eq!(
            parse_timestamp("2025-11-26"),
            Some(Utc.with_ymd_and_hms(2025, 11, 26, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn minute_precision_timestamps_parse() {
        let ten_pm = Utc.with_ymd_and_hms(2025, 11, 26, 22, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2025-11-26T22:00Z"), Some(ten_pm));
        assert_eq!(parse_timestamp("2025-11-26T22:00z"), Some(ten_pm));
        assert_eq!(parse_timestamp("2025-11-26T23:00+01:00"), Some(ten_pm));
        assert_eq!(parse_timestamp("2025-11-26T17:00-0500"), Some(ten_pm));
        assert_eq!(parse_timestamp("2025-11-26T22:00"), Some(ten_pm));

        let session: ChargingSession =
            serde_json::from_value(json!({"id": 1, "startTime": "2025-11-26T22:00Z"})).unwrap();
        assert_eq!(session.start_time, Some(ten_pm));
    }

    #[test]
    fn z_suffix_with_fraction_parses() {
        assert_eq!(
            parse_timestamp("2025-11-26T22:00:00.250Z"),
            Some(
                Utc.with_ymd_and_hms(2025, 11, 26, 22, 0, 0).unwrap()
                    + chrono::Duration::milliseconds(250)
            )
        );
        assert_eq!(parse_timestamp("2025-11-26T22:00Zulu"), None);
    }

    #[test]
    fn session_serializes_back_to_wire_names() {
        let session = ChargingSession {
            id: 3,
            energy_kwh: 11.0,
            cost: Some(44.0),
            start_time: None,
            end_time: Some(Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()),
            location: Some("Home".to_string()),
            energy_source: None,
            rate_type: None,
        };
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["energyConsumedKwh"], 11.0);
        assert_eq!(json["totalCost"], 44.0);
        assert_eq!(json["endTime"], "2025-01-02T03:04:05Z");
        assert!(json.get("startTime").is_none());
    }

    #[test]
    fn aggregate_state_applies_defaults() {
        let state: AggregateState = serde_json::from_value(json!({
            "monthlyEnergy": 120.5,
            "monthlySessions": 4,
            "lastSessionCost": 0.0
        }))
        .unwrap();
        assert_eq!(state.monthly_energy, 120.5);
        assert_eq!(state.monthly_cost, 0.0);
        assert_eq!(state.monthly_sessions, 4);
        assert_eq!(state.yearly_energy, 0.0);
        assert!(state.last_session_energy.is_none());
        assert_eq!(state.last_session_cost, Some(0.0));
        assert!(state.avg_cost_per_kwh.is_none());
    }

    #[test]
    fn aggregate_state_from_empty_object() {
        let state: AggregateState = serde_json::from_value(json!({})).unwrap();
        assert_eq!(state, AggregateState::default());
    }
}
