//! Error types.

use thiserror::Error;

/// Errors reported to the caller of the engine (transport layer, setup and
/// verification surfaces).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MockError {
    #[error("Undefined webservice: {service}")]
    ServiceNotFound { service: String },

    #[error("Undefined webservice operation: operationId: {operation} of service: {service}")]
    OperationNotFound { service: String, operation: String },

    #[error("No operation of service {service} is configured for the request body")]
    OperationNotMatched { service: String },

    #[error("Recorded {query} are not supported for service {service} (resource paths {mode})")]
    UnsupportedQuery {
        service: String,
        query: &'static str,
        mode: &'static str,
    },

    #[error("Service {service} has no WSDL configured")]
    WsdlNotConfigured { service: String },

    #[error("Response positions start at 1, got {position}")]
    InvalidPosition { position: u32 },
}

impl MockError {
    /// True for every "not configured" failure the transport should map to a
    /// client-visible not-found response.
    pub fn is_not_found(&self) -> bool {
        !matches!(self, MockError::InvalidPosition { .. })
    }
}

/// Structural configuration failures. Cosmetic problems (unknown content
/// types, missing fixture files, malformed WSDL) never produce one of these.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Http method not recognized: {0}")]
    InvalidHttpMethod(String),

    #[error("Service type not recognized: {0}")]
    InvalidServiceType(String),

    #[error("Service at index {0} has no name")]
    MissingServiceName(usize),

    #[error("Service {0} is defined more than once")]
    DuplicateService(String),

    #[error("Invalid default response code {code} for operation {operation}")]
    InvalidResponseCode { operation: String, code: u16 },

    #[error("Invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

/// Failures while reading a WSDL document. Logged and downgraded to "no
/// operations" by the loader.
#[derive(Debug, Error)]
pub enum WsdlError {
    #[error("WSDL is not well-formed: {0}")]
    Xml(#[from] crate::xml::XmlError),

    #[error("root element <{0}> is not a WSDL definitions element")]
    NotWsdl(String),

    #[error("WSDL declares no bindings")]
    NoBindings,
}
