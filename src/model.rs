//! Configuration model.
//!
//! Built once by the [`ConfigurationLoader`](crate::loader::ConfigurationLoader)
//! and read-only afterwards. Runtime state (schedules, recorded requests) lives
//! in the [`MockEngine`](crate::engine::MockEngine), keyed by the names found here.

use crate::error::{ConfigError, MockError};
use crate::response::{
    BodyKind, MockResponse, ResponseBody, DEFAULT_CONTENT_TYPE, DEFAULT_RESPONSE_CODE,
};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Kind of mocked endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceKind {
    #[default]
    Soap,
    Rest,
}

impl FromStr for ServiceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SOAP" => Ok(ServiceKind::Soap),
            "REST" => Ok(ServiceKind::Rest),
            _ => Err(ConfigError::InvalidServiceType(s.to_string())),
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceKind::Soap => f.write_str("SOAP"),
            ServiceKind::Rest => f.write_str("REST"),
        }
    }
}

/// HTTP methods a REST operation may be named after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl FromStr for HttpMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            _ => Err(ConfigError::InvalidHttpMethod(s.to_string())),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the trailing part of a REST route is exposed to verification queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceMode {
    /// A single trailing path token.
    Id,
    /// The whole trailing path.
    Path,
}

impl ResourceMode {
    pub fn from_flag(enable_resource_paths: bool) -> Self {
        if enable_resource_paths {
            ResourceMode::Path
        } else {
            ResourceMode::Id
        }
    }
}

/// One mockable message or method within a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    name: String,
    body_kind: BodyKind,
    default_response: MockResponse,
    namespaces: BTreeMap<String, String>,
}

impl Operation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body_kind: BodyKind::Text,
            default_response: MockResponse::empty()
                .code(DEFAULT_RESPONSE_CODE)
                .content_type(DEFAULT_CONTENT_TYPE),
            namespaces: BTreeMap::new(),
        }
    }

    /// Mark the operation as emitting binary bodies. Must be decided before any
    /// default body is attached.
    pub fn binary(mut self, binary: bool) -> Self {
        self.body_kind = if binary { BodyKind::Binary } else { BodyKind::Text };
        let body = std::mem::take(&mut self.default_response.body);
        self.default_response.body = body.coerce(self.body_kind);
        self
    }

    pub fn default_body(mut self, body: ResponseBody) -> Self {
        self.default_response.body = body.coerce(self.body_kind);
        self
    }

    pub fn default_text(self, text: impl Into<String>) -> Self {
        self.default_body(ResponseBody::Text(text.into()))
    }

    /// A code of `0` keeps the 200 default.
    pub fn default_code(mut self, code: u16) -> Self {
        if code != 0 {
            self.default_response.code = code;
        }
        self
    }

    pub fn default_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.default_response.content_type = Some(content_type.into());
        self
    }

    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_response.headers.insert(name.into(), value.into());
        self
    }

    pub fn default_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.default_response.headers = headers;
        self
    }

    pub fn namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.insert(prefix.into(), uri.into());
        self
    }

    pub fn namespaces(mut self, namespaces: BTreeMap<String, String>) -> Self {
        self.namespaces = namespaces;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body_kind(&self) -> BodyKind {
        self.body_kind
    }

    pub fn is_binary(&self) -> bool {
        self.body_kind == BodyKind::Binary
    }

    pub fn default_response(&self) -> &MockResponse {
        &self.default_response
    }

    pub fn response_code(&self) -> u16 {
        self.default_response.code
    }

    pub fn response_content_type(&self) -> &str {
        self.default_response
            .content_type
            .as_deref()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
    }

    pub fn namespace_map(&self) -> &BTreeMap<String, String> {
        &self.namespaces
    }

    /// Whether an element in namespace `uri` may be routed to this operation.
    ///
    /// Operations without declared namespaces accept any namespace.
    pub fn accepts_namespace(&self, uri: Option<&str>) -> bool {
        if self.namespaces.is_empty() {
            return true;
        }
        uri.is_some_and(|uri| self.namespaces.values().any(|ns| ns == uri))
    }
}

/// One mocked SOAP or REST endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    name: String,
    kind: ServiceKind,
    endpoints: Vec<String>,
    wsdl: Option<String>,
    ignore_xml_declaration: bool,
    enable_resource_paths: bool,
    operations: BTreeMap<u32, Operation>,
}

impl Service {
    pub fn new(name: impl Into<String>, kind: ServiceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            endpoints: Vec::new(),
            wsdl: None,
            ignore_xml_declaration: true,
            enable_resource_paths: false,
            operations: BTreeMap::new(),
        }
    }

    pub fn with_wsdl(mut self, wsdl: impl Into<String>) -> Self {
        self.wsdl = Some(wsdl.into());
        self
    }

    pub fn with_endpoint(mut self, uri: impl Into<String>) -> Self {
        self.endpoints.push(uri.into());
        self
    }

    pub fn ignore_xml_declaration(mut self, ignore: bool) -> Self {
        self.ignore_xml_declaration = ignore;
        self
    }

    pub fn enable_resource_paths(mut self, enable: bool) -> Self {
        self.enable_resource_paths = enable;
        self
    }

    /// Put `operation` at `index`, replacing whatever was there.
    pub fn with_operation(mut self, index: u32, operation: Operation) -> Self {
        self.operations.insert(index, operation);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub fn wsdl(&self) -> Option<&str> {
        self.wsdl.as_deref()
    }

    pub fn ignores_xml_declaration(&self) -> bool {
        self.ignore_xml_declaration
    }

    pub fn resource_paths_enabled(&self) -> bool {
        self.enable_resource_paths
    }

    pub fn resource_mode(&self) -> ResourceMode {
        ResourceMode::from_flag(self.enable_resource_paths)
    }

    pub fn operation_at(&self, index: u32) -> Option<&Operation> {
        self.operations.get(&index)
    }

    /// Look an operation up by name. The lowest position wins on duplicates.
    pub fn operation(&self, name: &str) -> Option<&Operation> {
        self.operations.values().find(|op| !op.name.is_empty() && op.name == name)
    }

    /// Operations in position order, with their positions.
    pub fn operations(&self) -> impl Iterator<Item = (u32, &Operation)> {
        self.operations.iter().map(|(index, op)| (*index, op))
    }

    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }
}

/// All configured services, addressable by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockConfiguration {
    services: BTreeMap<String, Service>,
}

impl MockConfiguration {
    /// Build the model, rejecting duplicate service names.
    pub fn new(services: impl IntoIterator<Item = Service>) -> Result<Self, ConfigError> {
        let mut by_name = BTreeMap::new();
        for service in services {
            if by_name.contains_key(&service.name) {
                return Err(ConfigError::DuplicateService(service.name));
            }
            by_name.insert(service.name.clone(), service);
        }
        Ok(Self { services: by_name })
    }

    pub fn service(&self, name: &str) -> Result<&Service, MockError> {
        self.services.get(name).ok_or_else(|| MockError::ServiceNotFound {
            service: name.to_string(),
        })
    }

    pub fn operation(&self, service: &str, operation: &str) -> Result<&Operation, MockError> {
        self.service(service)?
            .operation(operation)
            .ok_or_else(|| MockError::OperationNotFound {
                service: service.to_string(),
                operation: operation.to_string(),
            })
    }

    /// Services sorted by name.
    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.services.values()
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    pub fn operation_count(&self) -> usize {
        self.services.values().map(Service::operation_count).sum()
    }
}
