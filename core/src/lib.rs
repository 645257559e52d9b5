//! Async client for the EV Tracker charging-log service.
//!
//! # Overview
//! `EvTrackerClient` lists the account's cars, reads aggregate charging
//! statistics and logs charging sessions. Every call is one authenticated
//! HTTPS round trip that returns a typed value or a classified
//! `EvTrackerError`; nothing is retried, cached or queued.
//!
//! # Design
//! - `RequestExecutor` owns the pipeline: auth headers, the reqwest call and
//!   status classification (`executor::classify` is a pure function over
//!   `HttpResponse`).
//! - Models in `types` map the wire JSON both ways with serde. Required fields
//!   fail the parse; optional ones degrade to defaults or `None`.
//! - Session bodies are built by `SessionOptions` / `SimpleSessionOptions`,
//!   which only emit the fields a caller set.
//! - The client logs through `tracing` and never installs a subscriber.
//!
//! ```no_run
//! use evtracker::{ClientConfig, EvTrackerClient, SimpleSessionOptions};
//!
//! # async fn run() -> evtracker::Result<()> {
//! let client = EvTrackerClient::new(ClientConfig::new("my-api-key"));
//! for car in client.list_cars().await? {
//!     println!("{} {}", car.id, car.name);
//! }
//! let session = client
//!     .log_session_simple(25.5, SimpleSessionOptions::new().energy_source("solar"))
//!     .await?;
//! println!("logged session {}", session.id);
//! client.close();
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod payload;
pub mod types;

pub use client::EvTrackerClient;
pub use config::{ClientConfig, DEFAULT_API_BASE_URL, DEFAULT_USER_AGENT};
pub use error::{EvTrackerError, Result};
pub use executor::RequestExecutor;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use payload::{SessionOptions, SimpleSessionOptions, Timestamp};
pub use types::{AggregateState, Car, ChargingSession};
