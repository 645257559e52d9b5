//! Async client for the EV Tracker API.
//!
//! # Design
//! `EvTrackerClient` turns each domain operation into one `RequestExecutor`
//! call and maps the `data` field of the response envelope through the
//! matching model. Response mapping lives in small `parse_*` functions that
//! take the already-classified JSON, so it is testable without a server.
//!
//! The reqwest pool is either supplied by the caller or created lazily on the
//! first request. `owns_http_client` records which; only a self-created pool
//! is released by `close` or on drop.

use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{EvTrackerError, Result};
use crate::executor::RequestExecutor;
use crate::http::HttpMethod;
use crate::payload::{SessionOptions, SimpleSessionOptions};
use crate::types::{AggregateState, Car, ChargingSession};

const ENDPOINT_CARS: &str = "/cars";
const ENDPOINT_CARS_DEFAULT: &str = "/cars/default";
const ENDPOINT_SESSIONS: &str = "/sessions";
const ENDPOINT_SESSIONS_SIMPLE: &str = "/sessions/simple";
const ENDPOINT_STATE: &str = "/homeassistant/state";

/// Client for one EV Tracker account.
///
/// Safe to share across tasks; concurrent calls reuse the same pool.
#[derive(Debug)]
pub struct EvTrackerClient {
    executor: RequestExecutor,
    http: OnceCell<reqwest::Client>,
    owns_http_client: bool,
}

impl EvTrackerClient {
    /// Create a client that builds and owns its HTTP pool on first use.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            executor: executor_for(&config),
            http: OnceCell::new(),
            owns_http_client: true,
        }
    }

    /// Create a client on top of a caller-managed pool. The pool is never
    /// released by this client.
    pub fn with_http_client(config: ClientConfig, http: reqwest::Client) -> Self {
        Self {
            executor: executor_for(&config),
            http: OnceCell::new_with(Some(http)),
            owns_http_client: false,
        }
    }

    pub fn base_url(&self) -> &str {
        self.executor.base_url()
    }

    pub fn user_agent(&self) -> &str {
        self.executor.user_agent()
    }

    pub fn owns_http_client(&self) -> bool {
        self.owns_http_client
    }

    /// Whether a pool is currently attached (supplied, or created by a request).
    pub fn has_http_client(&self) -> bool {
        self.http.initialized()
    }

    /// Release the pool if this client created it.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.owns_http_client {
            return;
        }
        if self.http.take().is_some() {
            debug!("closed owned http client");
        }
    }

    async fn http(&self) -> Result<&reqwest::Client> {
        self.http
            .get_or_try_init(|| async {
                debug!("creating http client");
                reqwest::Client::builder()
                    .build()
                    .map_err(EvTrackerError::Connection)
            })
            .await
    }

    async fn request(
        &self,
        method: HttpMethod,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<Value> {
        let http = self.http().await?;
        self.executor.execute(http, method, endpoint, body).await
    }

    pub async fn list_cars(&self) -> Result<Vec<Car>> {
        let response = self.request(HttpMethod::Get, ENDPOINT_CARS, None).await?;
        parse_cars(response)
    }

    /// Cars as the server sent them, including fields `Car` does not model.
    pub async fn list_cars_raw(&self) -> Result<Vec<Map<String, Value>>> {
        let response = self.request(HttpMethod::Get, ENDPOINT_CARS, None).await?;
        parse_cars_raw(response)
    }

    /// The account's default car, or `None` when none is configured.
    pub async fn default_car(&self) -> Result<Option<Car>> {
        let response = self
            .request(HttpMethod::Get, ENDPOINT_CARS_DEFAULT, None)
            .await?;
        parse_default_car(response)
    }

    pub async fn aggregate_state(&self) -> Result<AggregateState> {
        let response = self.request(HttpMethod::Get, ENDPOINT_STATE, None).await?;
        parse_aggregate_state(response)
    }

    pub async fn aggregate_state_raw(&self) -> Result<Map<String, Value>> {
        let response = self.request(HttpMethod::Get, ENDPOINT_STATE, None).await?;
        parse_object_raw(response)
    }

    /// Log a session with full control over pricing and metadata.
    ///
    /// Non-finite numbers fail with `InvalidPayload` before anything is sent.
    pub async fn log_session(
        &self,
        energy_kwh: f64,
        options: SessionOptions,
    ) -> Result<ChargingSession> {
        let payload = options.into_payload(energy_kwh)?;
        debug!(payload = %payload, "logging session");
        let response = self
            .request(HttpMethod::Post, ENDPOINT_SESSIONS, Some(&payload))
            .await?;
        parse_session(response)
    }

    /// Log a session and let the server fill in whatever was not supplied.
    pub async fn log_session_simple(
        &self,
        energy_kwh: f64,
        options: SimpleSessionOptions,
    ) -> Result<ChargingSession> {
        let payload = options.into_payload(energy_kwh)?;
        debug!(payload = %payload, "logging simple session");
        let response = self
            .request(HttpMethod::Post, ENDPOINT_SESSIONS_SIMPLE, Some(&payload))
            .await?;
        parse_session(response)
    }

    /// Check the API key by listing cars.
    ///
    /// Returns `Ok(false)` for an invalid key and also for any other API
    /// error, so a transient 5xx is indistinguishable from a bad key here.
    /// Connection errors are returned as `Err`. Call `list_cars` directly to
    /// tell the cases apart.
    pub async fn validate_api_key(&self) -> Result<bool> {
        match self.list_cars().await {
            Ok(_) => Ok(true),
            Err(EvTrackerError::Authentication(_)) => Ok(false),
            Err(err @ EvTrackerError::Connection(_)) => Err(err),
            Err(err) => {
                warn!(error = %err, "API key validation error");
                Ok(false)
            }
        }
    }
}

impl Drop for EvTrackerClient {
    fn drop(&mut self) {
        self.release();
    }
}

fn executor_for(config: &ClientConfig) -> RequestExecutor {
    RequestExecutor::new(&config.base_url, &config.api_key, &config.user_agent)
}

/// Take the `data` member of a success envelope; `Null` when missing.
fn take_data(response: Value) -> Value {
    match response {
        Value::Object(mut envelope) => envelope.remove("data").unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn parse_cars(response: Value) -> Result<Vec<Car>> {
    match take_data(response) {
        Value::Null => Ok(Vec::new()),
        data => serde_json::from_value(data).map_err(EvTrackerError::Decode),
    }
}

fn parse_cars_raw(response: Value) -> Result<Vec<Map<String, Value>>> {
    match take_data(response) {
        Value::Null => Ok(Vec::new()),
        data => serde_json::from_value(data).map_err(EvTrackerError::Decode),
    }
}

fn parse_default_car(response: Value) -> Result<Option<Car>> {
    match take_data(response) {
        Value::Null => Ok(None),
        Value::Object(car) if car.is_empty() => Ok(None),
        data => serde_json::from_value(data)
            .map(Some)
            .map_err(EvTrackerError::Decode),
    }
}

fn parse_aggregate_state(response: Value) -> Result<AggregateState> {
    match take_data(response) {
        Value::Null => Ok(AggregateState::default()),
        data => serde_json::from_value(data).map_err(EvTrackerError::Decode),
    }
}

fn parse_object_raw(response: Value) -> Result<Map<String, Value>> {
    match take_data(response) {
        Value::Null => Ok(Map::new()),
        data => serde_json::from_value(data).map_err(EvTrackerError::Decode),
    }
}

fn parse_session(response: Value) -> Result<ChargingSession> {
    serde_json::from_value(take_data(response)).map_err(EvTrackerError::Decode)
}
