//! Configuration definitions for the mock service.
//!
//! Services and their operations as written in the configuration file. The
//! [`ConfigurationLoader`](crate::loader::ConfigurationLoader) turns these into
//! the runtime [`MockConfiguration`](crate::model::MockConfiguration).

use crate::error::ConfigError;
use crate::model::{HttpMethod, ServiceKind};
use crate::response::ResponseBody;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// Main configuration: the list of mocked services.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MockServiceConfig {
    #[serde(default)]
    pub services: Vec<ServiceDefinition>,
}

impl MockServiceConfig {
    /// Load configuration from a file.
    ///
    /// `.properties` files use the flat indexed key format; anything else is
    /// read as YAML.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;
        let is_properties = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("properties"));
        let config = if is_properties {
            crate::properties::parse(&content)?
        } else {
            Self::from_yaml(&content)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut names = HashSet::new();
        for (i, service) in self.services.iter().enumerate() {
            service.validate(i)?;
            if !names.insert(service.name.as_str()) {
                return Err(ConfigError::DuplicateService(service.name.clone()).into());
            }
        }
        Ok(())
    }

    pub fn operation_count(&self) -> usize {
        self.services.iter().map(|s| s.operations.len()).sum()
    }
}

/// A single mocked service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServiceDefinition {
    #[serde(default)]
    pub name: String,

    /// `soap` or `rest`
    #[serde(rename = "type", default = "default_service_type")]
    pub service_type: String,

    /// Endpoint URIs the transport layer exposes this service under
    #[serde(default)]
    pub endpoints: Vec<String>,

    /// WSDL file, relative to the configuration file
    #[serde(default)]
    pub wsdl: Option<String>,

    #[serde(default = "default_true")]
    pub ignore_xml_declaration: bool,

    #[serde(default)]
    pub enable_resource_paths: bool,

    #[serde(default)]
    pub operations: Vec<OperationDefinition>,
}

fn default_service_type() -> String {
    "soap".to_string()
}

fn default_true() -> bool {
    true
}

impl ServiceDefinition {
    pub fn new(name: impl Into<String>, service_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service_type: service_type.into(),
            endpoints: Vec::new(),
            wsdl: None,
            ignore_xml_declaration: true,
            enable_resource_paths: false,
            operations: Vec::new(),
        }
    }

    pub fn kind(&self) -> Result<ServiceKind, ConfigError> {
        self.service_type.parse()
    }

    /// Validate the service definition; `position` is its place in the list.
    pub fn validate(&self, position: usize) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingServiceName(position));
        }
        self.kind()?;
        for operation in &self.operations {
            operation.validate()?;
        }
        Ok(())
    }
}

/// One operation of a service.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OperationDefinition {
    /// Position within the service; the list position when omitted
    #[serde(default)]
    pub index: Option<u32>,

    /// SOAP request element name
    #[serde(default)]
    pub input_message: Option<String>,

    /// REST method
    #[serde(default)]
    pub http_method: Option<String>,

    /// Default response body file, relative to the configuration file
    #[serde(default)]
    pub default_response: Option<String>,

    /// Inline default response body, used when no file is named
    #[serde(default)]
    pub body: Option<ResponseBodyDefinition>,

    #[serde(default)]
    pub default_response_code: Option<u16>,

    #[serde(default)]
    pub default_response_content_type: Option<String>,

    #[serde(default)]
    pub default_response_headers: HashMap<String, String>,

    #[serde(default)]
    pub binary: bool,

    /// Namespace prefix to URI; SOAP bodies must use one of the URIs
    #[serde(default)]
    pub namespaces: BTreeMap<String, String>,
}

impl OperationDefinition {
    /// Operation name: the HTTP method for REST operations, the input
    /// message otherwise.
    pub fn name(&self) -> Result<Option<String>, ConfigError> {
        if let Some(method) = &self.http_method {
            let method: HttpMethod = method.trim().parse()?;
            return Ok(Some(method.to_string()));
        }
        Ok(self.input_message.as_ref().map(|m| m.trim().to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = self.name()?;
        if let Some(code) = self.default_response_code {
            if code != 0 && !(100..=599).contains(&code) {
                return Err(ConfigError::InvalidResponseCode {
                    operation: name.unwrap_or_default(),
                    code,
                });
            }
        }
        if let Some(ResponseBodyDefinition::Base64 { content }) = &self.body {
            use base64::Engine;
            base64::engine::general_purpose::STANDARD
                .decode(content)
                .map_err(|e| ConfigError::InvalidValue {
                    key: "body".to_string(),
                    value: e.to_string(),
                })?;
        }
        Ok(())
    }
}

/// Inline response body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseBodyDefinition {
    Text { content: String },
    Json { content: serde_json::Value },
    /// Base64 encoded binary
    Base64 { content: String },
    /// Load from file, relative to the configuration file
    File { path: String },
}

impl ResponseBodyDefinition {
    /// The body, unless it refers to a file. Files are resolved by the loader.
    pub fn inline_body(&self) -> Option<ResponseBody> {
        match self {
            ResponseBodyDefinition::Text { content } => Some(ResponseBody::Text(content.clone())),
            ResponseBodyDefinition::Json { content } => {
                serde_json::to_string(content).ok().map(ResponseBody::Text)
            }
            ResponseBodyDefinition::Base64 { content } => {
                use base64::Engine;
                base64::engine::general_purpose::STANDARD
                    .decode(content)
                    .ok()
                    .map(ResponseBody::Binary)
            }
            ResponseBodyDefinition::File { .. } => None,
        }
    }
}
