//! The authenticated request pipeline shared by every client operation.
//!
//! `RequestExecutor::execute` performs exactly one round trip: it builds the
//! request with auth headers, sends it through the caller's reqwest pool and
//! reduces the outcome to either the response JSON or a classified
//! `EvTrackerError`. Nothing is retried or cached here.

use std::fmt;

use serde_json::Value;
use tracing::{debug, error};

use crate::error::{EvTrackerError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Header carrying the account API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Delay reported for a 429 that comes without a `Retry-After` header.
pub const DEFAULT_RETRY_AFTER: &str = "60";

#[derive(Clone)]
pub struct RequestExecutor {
    base_url: String,
    api_key: String,
    user_agent: String,
}

impl fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl RequestExecutor {
    pub fn new(base_url: &str, api_key: &str, user_agent: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            user_agent: user_agent.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Build the request for `endpoint` without sending it.
    pub fn build_request(
        &self,
        method: HttpMethod,
        endpoint: &str,
        body: Option<&Value>,
    ) -> HttpRequest {
        HttpRequest {
            method,
            url: format!("{}{endpoint}", self.base_url),
            headers: vec![
                (API_KEY_HEADER.to_string(), self.api_key.clone()),
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Accept".to_string(), "application/json".to_string()),
                ("User-Agent".to_string(), self.user_agent.clone()),
            ],
            body: body.map(Value::to_string),
        }
    }

    pub async fn execute(
        &self,
        http: &reqwest::Client,
        method: HttpMethod,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<Value> {
        let request = self.build_request(method, endpoint, body);
        debug!(method = %request.method, url = %request.url, "api request");

        let response = send(http, request).await.map_err(|err| {
            error!(error = %err, "connection error");
            EvTrackerError::Connection(err)
        })?;
        debug!(status = response.status, "api response");

        classify(response)
    }
}

async fn send(
    http: &reqwest::Client,
    request: HttpRequest,
) -> std::result::Result<HttpResponse, reqwest::Error> {
    let mut builder = http.request(request.method.into(), &request.url);
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(body) = request.body {
        builder = builder.body(body);
    }

    let response = builder.send().await?;
    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();
    let body = response.text().await?;

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

/// Map a response to its JSON body or the matching error variant.
///
/// Checks run in order: 401, 403, 429, 5xx, remaining 4xx. Anything else is
/// treated as success and must carry a JSON body.
pub fn classify(response: HttpResponse) -> Result<Value> {
    match response.status {
        401 => Err(EvTrackerError::Authentication("Invalid API key".to_string())),
        403 => Err(EvTrackerError::Authentication(
            "API key lacks permissions or PRO subscription required".to_string(),
        )),
        429 => {
            let retry_after = response
                .header("Retry-After")
                .unwrap_or(DEFAULT_RETRY_AFTER)
                .to_string();
            Err(EvTrackerError::RateLimit { retry_after })
        }
        status if status >= 500 => Err(EvTrackerError::Api {
            status,
            message: format!("Server error: {status} - {}", response.body),
        }),
        status if status >= 400 => {
            let detail = envelope_message(&response.body);
            Err(EvTrackerError::Api {
                status,
                message: format!("API error: {status} - {detail}"),
            })
        }
        _ => serde_json::from_str(&response.body).map_err(EvTrackerError::Decode),
    }
}

/// Pull `error.message` out of a `{"error": {...}}` envelope.
///
/// Bodies that are not a JSON object, or whose `error` is not an object, fall
/// back to the raw text.
fn envelope_message(body: &str) -> String {
    let Ok(Value::Object(envelope)) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };
    match envelope.get("error") {
        None => "Unknown error".to_string(),
        Some(Value::Object(error)) => match error.get("message") {
            None => "Unknown error".to_string(),
            Some(Value::String(message)) => message.clone(),
            Some(other) => other.to_string(),
        },
        Some(_) => body.to_string(),
    }
}
