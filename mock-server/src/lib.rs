//! In-memory stand-in for the EV Tracker API.
//!
//! Serves the same routes as production under `/api/v1`, checks `x-api-key`,
//! and records every request it sees. Tests can inject a canned `Fault`
//! response to exercise error paths the real service rarely produces.

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};

pub const DEFAULT_API_KEY: &str = "test-key";

/// Charging power used to estimate a start time when none is sent.
const HOME_CHARGER_KW: f64 = 11.0;
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Car {
    pub id: i64,
    pub name: String,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: i64,
    pub energy_consumed_kwh: f64,
    pub total_cost: Option<f64>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: DateTime<Utc>,
    pub car_id: Option<i64>,
    pub location: Option<String>,
    pub provider: Option<String>,
    pub energy_source: Option<String>,
    pub rate_type: Option<String>,
    pub external_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    pub energy_consumed_kwh: f64,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub car_id: Option<i64>,
    pub location: Option<String>,
    pub external_id: Option<String>,
    pub provider: Option<String>,
    pub energy_source: Option<String>,
    pub rate_type: Option<String>,
    pub price_per_kwh_without_vat: Option<f64>,
    pub vat_percentage: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StateSummary {
    pub monthly_energy: f64,
    pub monthly_cost: f64,
    pub monthly_sessions: i64,
    pub yearly_energy: f64,
    pub yearly_cost: f64,
    pub last_session_energy: Option<f64>,
    pub last_session_cost: Option<f64>,
    pub avg_cost_per_kwh: Option<f64>,
}

/// A canned response returned for every request while set.
#[derive(Clone, Debug)]
pub struct Fault {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Fault {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}

impl IntoResponse for Fault {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, self.body).into_response();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                response.headers_mut().insert(name, value);
            }
        }
        response
    }
}

/// What the server saw for one request, before any auth check.
#[derive(Clone, Debug)]
pub struct ReceivedRequest {
    pub method: String,
    pub path: String,
    pub api_key: Option<String>,
    pub user_agent: Option<String>,
    pub body: Option<Value>,
}

#[derive(Debug, Default)]
struct Store {
    cars: Vec<Car>,
    default_car_id: Option<i64>,
    sessions: Vec<Session>,
    next_session_id: i64,
    fault: Option<Fault>,
    received: Vec<ReceivedRequest>,
}

#[derive(Clone)]
pub struct MockState {
    api_key: Arc<str>,
    store: Arc<RwLock<Store>>,
}

impl MockState {
    pub fn new(api_key: &str) -> Self {
        Self::with_cars(api_key, Vec::new(), None)
    }

    pub fn with_cars(api_key: &str, cars: Vec<Car>, default_car_id: Option<i64>) -> Self {
        Self {
            api_key: Arc::from(api_key),
            store: Arc::new(RwLock::new(Store {
                cars,
                default_car_id,
                next_session_id: 1,
                ..Store::default()
            })),
        }
    }

    /// Two cars, the first one set as default.
    pub fn demo(api_key: &str) -> Self {
        let cars = vec![
            Car {
                id: 1,
                name: "Tesla Model 3".to_string(),
                make: Some("Tesla".to_string()),
                model: Some("Model 3".to_string()),
                year: Some(2022),
            },
            Car {
                id: 2,
                name: "Weekend car".to_string(),
                make: Some("Skoda".to_string()),
                model: Some("Enyaq".to_string()),
                year: None,
            },
        ];
        Self::with_cars(api_key, cars, Some(1))
    }

    pub async fn set_fault(&self, fault: Fault) {
        self.store.write().await.fault = Some(fault);
    }

    pub async fn clear_fault(&self) {
        self.store.write().await.fault = None;
    }

    pub async fn received(&self) -> Vec<ReceivedRequest> {
        self.store.read().await.received.clone()
    }

    pub async fn sessions(&self) -> Vec<Session> {
        self.store.read().await.sessions.clone()
    }
}

pub fn app(state: MockState) -> Router {
    let api = Router::new()
        .route("/cars", get(list_cars))
        .route("/cars/default", get(default_car))
        .route("/homeassistant/state", get(aggregate_state))
        .route("/sessions", post(create_session))
        .route("/sessions/simple", post(create_simple_session))
        .with_state(state.clone());
    Router::new()
        .nest("/api/v1", api)
        .layer(middleware::from_fn_with_state(state, gate))
}

pub async fn run(listener: TcpListener, state: MockState) -> Result<(), std::io::Error> {
    axum::serve(listener, app(state)).await
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": { "message": message } }))).into_response()
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn gate(State(state): State<MockState>, request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let Ok(bytes) = axum::body::to_bytes(body, MAX_BODY_BYTES).await else {
        return error_response(StatusCode::PAYLOAD_TOO_LARGE, "request body too large");
    };

    let api_key = header_string(&parts.headers, "x-api-key");
    tracing::debug!(method = %parts.method, path = %parts.uri.path(), "request received");

    let fault = {
        let mut store = state.store.write().await;
        store.received.push(ReceivedRequest {
            method: parts.method.to_string(),
            path: parts.uri.path().to_string(),
            api_key: api_key.clone(),
            user_agent: header_string(&parts.headers, "user-agent"),
            body: serde_json::from_slice(&bytes).ok(),
        });
        store.fault.clone()
    };

    if let Some(fault) = fault {
        return fault.into_response();
    }
    if api_key.as_deref() != Some(&*state.api_key) {
        return error_response(StatusCode::UNAUTHORIZED, "Invalid API key");
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

async fn list_cars(State(state): State<MockState>) -> Json<Value> {
    let store = state.store.read().await;
    Json(json!({ "data": store.cars }))
}

async fn default_car(State(state): State<MockState>) -> Json<Value> {
    let store = state.store.read().await;
    let car = store
        .default_car_id
        .and_then(|id| store.cars.iter().find(|car| car.id == id));
    Json(json!({ "data": car }))
}

async fn aggregate_state(State(state): State<MockState>) -> Json<Value> {
    let store = state.store.read().await;
    Json(json!({ "data": summarize(&store.sessions, Utc::now()) }))
}

async fn create_session(State(state): State<MockState>, body: Bytes) -> Response {
    log_session(&state, &body, false).await
}

async fn create_simple_session(State(state): State<MockState>, body: Bytes) -> Response {
    log_session(&state, &body, true).await
}

async fn log_session(state: &MockState, body: &[u8], simple: bool) -> Response {
    let input: NewSession = match serde_json::from_slice(body) {
        Ok(input) => input,
        Err(err) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("invalid session payload: {err}"),
            )
        }
    };
    if !(input.energy_consumed_kwh > 0.0) {
        return error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "energyConsumedKwh must be positive",
        );
    }

    let end_time = match parse_time(input.end_time.as_deref(), "endTime") {
        Ok(end) => end.unwrap_or_else(Utc::now),
        Err(response) => return response,
    };
    let mut start_time = match parse_time(input.start_time.as_deref(), "startTime") {
        Ok(start) => start,
        Err(response) => return response,
    };

    let mut store = state.store.write().await;

    if let Some(external_id) = &input.external_id {
        if let Some(existing) = store
            .sessions
            .iter()
            .find(|s| s.external_id.as_ref() == Some(external_id))
        {
            return (StatusCode::OK, Json(json!({ "data": existing }))).into_response();
        }
    }

    let mut car_id = input.car_id;
    let mut location = input.location;
    if simple {
        if start_time.is_none() {
            let hours = input.energy_consumed_kwh / HOME_CHARGER_KW;
            start_time = Some(end_time - Duration::seconds((hours * 3600.0).round() as i64));
        }
        car_id = car_id.or(store.default_car_id);
        location = location.or_else(|| Some("Home".to_string()));
    }

    let total_cost = if simple {
        None
    } else {
        input.price_per_kwh_without_vat.map(|price| {
            let vat = input.vat_percentage.unwrap_or(0.0);
            round2(input.energy_consumed_kwh * price * (1.0 + vat / 100.0))
        })
    };

    let session = Session {
        id: store.next_session_id,
        energy_consumed_kwh: input.energy_consumed_kwh,
        total_cost,
        start_time,
        end_time,
        car_id,
        location,
        provider: if simple { None } else { input.provider },
        energy_source: input.energy_source,
        rate_type: input.rate_type,
        external_id: input.external_id,
        notes: if simple { None } else { input.notes },
    };
    store.next_session_id += 1;
    store.sessions.push(session.clone());

    (StatusCode::CREATED, Json(json!({ "data": session }))).into_response()
}

fn parse_time(raw: Option<&str>, field: &str) -> Result<Option<DateTime<Utc>>, Response> {
    match raw {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|at| Some(at.with_timezone(&Utc)))
            .map_err(|_| {
                error_response(
                    StatusCode::BAD_REQUEST,
                    &format!("{field} must be an ISO-8601 timestamp"),
                )
            }),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Monthly and yearly totals relative to `now`.
pub fn summarize(sessions: &[Session], now: DateTime<Utc>) -> StateSummary {
    let this_year: Vec<&Session> = sessions
        .iter()
        .filter(|s| s.end_time.year() == now.year())
        .collect();
    let this_month: Vec<&Session> = this_year
        .iter()
        .copied()
        .filter(|s| s.end_time.month() == now.month())
        .collect();

    let energy = |list: &[&Session]| list.iter().map(|s| s.energy_consumed_kwh).sum::<f64>();
    let cost = |list: &[&Session]| list.iter().filter_map(|s| s.total_cost).sum::<f64>();

    let priced_energy: f64 = this_year
        .iter()
        .filter(|s| s.total_cost.is_some())
        .map(|s| s.energy_consumed_kwh)
        .sum();
    let avg_cost_per_kwh = (priced_energy > 0.0).then(|| round2(cost(&this_year) / priced_energy));

    let last = sessions.iter().max_by_key(|s| s.end_time);

    StateSummary {
        monthly_energy: round2(energy(&this_month)),
        monthly_cost: round2(cost(&this_month)),
        monthly_sessions: this_month.len() as i64,
        yearly_energy: round2(energy(&this_year)),
        yearly_cost: round2(cost(&this_year)),
        last_session_energy: last.map(|s| s.energy_consumed_kwh),
        last_session_cost: last.and_then(|s| s.total_cost),
        avg_cost_per_kwh,
    }
}
