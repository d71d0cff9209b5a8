//! WS Mock Server
//!
//! Stub-server engine for SOAP and REST services. Tests schedule responses per
//! call position, the transport layer dispatches inbound requests, and every
//! request is recorded for later verification.
//!
//! # Features
//!
//! - **Scheduled Responses**: Pick the response for the Nth call of an operation
//! - **Request Recording**: Bodies, query strings, headers and resource paths
//! - **WSDL Defaults**: Sample SOAP responses synthesized from the WSDL schema
//! - **Latency Simulation**: Per-response delays
//! - **Two Config Formats**: YAML, or the flat `SERVICE[i].KEY=value` property file
//!
//! # Example Configuration
//!
//! ```yaml
//! services:
//!   - name: ticketing
//!     wsdl: ticketing.wsdl
//!     operations:
//!       - input_message: reserveRequest
//!         default_response: reserve_response.xml
//!   - name: orders
//!     type: rest
//!     operations:
//!       - http_method: GET
//!         default_response_content_type: application/json
//!         body:
//!           type: json
//!           content:
//!             status: ok
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod loader;
pub mod model;
pub mod properties;
pub mod recorder;
pub mod request;
pub mod response;
pub mod sample;
pub mod schedule;
pub mod wsdl;
pub mod xml;

pub use config::MockServiceConfig;
pub use engine::{Delayer, MockEngine, TokioDelayer};
pub use error::{ConfigError, MockError};
pub use loader::{ConfigurationLoader, DirectoryLoader, MemoryLoader, ResourceLoader};
pub use model::{HttpMethod, MockConfiguration, Operation, Service, ServiceKind};
pub use request::{InboundRequest, RecordedRequest, RequestHeaders};
pub use response::{MockResponse, ResponseBody, ResponseEnvelope};
