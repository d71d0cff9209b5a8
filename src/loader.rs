//! Configuration loader.
//!
//! Builds the runtime [`MockConfiguration`] from [`MockServiceConfig`]
//! definitions: resolves referenced files through a [`ResourceLoader`], reads
//! WSDL operations and merges them with the configured ones.

use crate::config::{MockServiceConfig, OperationDefinition, ResponseBodyDefinition, ServiceDefinition};
use crate::error::ConfigError;
use crate::model::{MockConfiguration, Operation, Service, ServiceKind};
use crate::response::{is_valid_media_type, ResponseBody};
use crate::wsdl::{self, WsdlOperation};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Source of files referenced by the configuration.
pub trait ResourceLoader: Send + Sync {
    fn read_text(&self, name: &str) -> Option<String>;
    fn read_binary(&self, name: &str) -> Option<Vec<u8>>;
}

/// Resolves names relative to a directory.
#[derive(Debug, Clone)]
pub struct DirectoryLoader {
    root: PathBuf,
}

impl DirectoryLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Loader rooted at the directory holding `config_path`.
    pub fn for_config_file(config_path: &Path) -> Self {
        let root = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self::new(root)
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl ResourceLoader for DirectoryLoader {
    fn read_text(&self, name: &str) -> Option<String> {
        std::fs::read_to_string(self.path(name)).ok()
    }

    fn read_binary(&self, name: &str) -> Option<Vec<u8>> {
        std::fs::read(self.path(name)).ok()
    }
}

/// In-memory files, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.files.insert(name.into(), content.into());
        self
    }
}

impl ResourceLoader for MemoryLoader {
    fn read_text(&self, name: &str) -> Option<String> {
        self.files
            .get(name)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    fn read_binary(&self, name: &str) -> Option<Vec<u8>> {
        self.files.get(name).cloned()
    }
}

pub struct ConfigurationLoader<R> {
    resources: R,
}

impl<R: ResourceLoader> ConfigurationLoader<R> {
    pub fn new(resources: R) -> Self {
        Self { resources }
    }

    /// Build the configuration model.
    ///
    /// Structural problems fail the load. Missing files and unreadable WSDL
    /// documents are logged and leave the affected fields unset.
    pub fn load(&self, config: &MockServiceConfig) -> Result<MockConfiguration, ConfigError> {
        let mut services = Vec::with_capacity(config.services.len());
        for (position, definition) in config.services.iter().enumerate() {
            services.push(self.load_service(position, definition)?);
        }
        let configuration = MockConfiguration::new(services)?;
        info!(
            services = configuration.service_count(),
            operations = configuration.operation_count(),
            "Loaded mock configuration"
        );
        Ok(configuration)
    }

    fn load_service(&self, position: usize, definition: &ServiceDefinition) -> Result<Service, ConfigError> {
        if definition.name.trim().is_empty() {
            return Err(ConfigError::MissingServiceName(position));
        }
        let kind = definition.kind()?;
        let mut service = Service::new(definition.name.trim(), kind)
            .ignore_xml_declaration(definition.ignore_xml_declaration)
            .enable_resource_paths(definition.enable_resource_paths);
        for endpoint in &definition.endpoints {
            service = service.with_endpoint(endpoint.as_str());
        }

        let mut wsdl_operations = Vec::new();
        if let Some(wsdl_file) = &definition.wsdl {
            match self.resources.read_text(wsdl_file) {
                Some(text) => {
                    if kind == ServiceKind::Rest {
                        warn!(service = %definition.name, "WSDL configured for a REST service");
                    }
                    wsdl_operations = wsdl::read_operations(&text);
                    service = service.with_wsdl(text);
                }
                None => error!(service = %definition.name, file = %wsdl_file, "WSDL file not found"),
            }
        }

        let mut explicit = Vec::with_capacity(definition.operations.len());
        for (list_position, operation) in definition.operations.iter().enumerate() {
            operation.validate()?;
            let index = operation.index.unwrap_or(list_position as u32);
            let name = operation.name()?.unwrap_or_default();
            let inherited = wsdl_operations.iter().find(|w| w.name == name);
            explicit.push((index, self.build_operation(name.clone(), operation, inherited)));
        }

        // WSDL operations fill the lowest positions the configured ones leave free.
        let taken: BTreeSet<u32> = explicit.iter().map(|(index, _)| *index).collect();
        let mut free = (0u32..).filter(|index| !taken.contains(index));
        for discovered in &wsdl_operations {
            if explicit.iter().any(|(_, op)| op.name() == discovered.name) {
                continue;
            }
            if let Some(index) = free.next() {
                service = service.with_operation(index, wsdl_operation(discovered));
            }
        }
        for (index, operation) in explicit {
            service = service.with_operation(index, operation);
        }

        debug!(
            service = %service.name(),
            kind = %service.kind(),
            operations = service.operation_count(),
            "Loaded service"
        );
        Ok(service)
    }

    fn build_operation(
        &self,
        name: String,
        definition: &OperationDefinition,
        inherited: Option<&WsdlOperation>,
    ) -> Operation {
        let mut operation = Operation::new(name)
            .binary(definition.binary)
            .default_code(definition.default_response_code.unwrap_or(0))
            .default_headers(definition.default_response_headers.clone())
            .namespaces(definition.namespaces.clone());

        if let Some(content_type) = &definition.default_response_content_type {
            if is_valid_media_type(content_type) {
                operation = operation.default_content_type(content_type.as_str());
            } else {
                warn!(
                    operation = %operation.name(),
                    content_type = %content_type,
                    "Illegal content type, keeping the default"
                );
            }
        }

        // Body files are read once the binary flag is known.
        let body = match (&definition.default_response, &definition.body) {
            (Some(file), _) => self.read_body(file, definition.binary),
            (None, Some(ResponseBodyDefinition::File { path })) => self.read_body(path, definition.binary),
            (None, Some(inline)) => inline.inline_body(),
            (None, None) => inherited.map(|w| ResponseBody::Text(w.default_response.clone())),
        };
        if let Some(body) = body {
            operation = operation.default_body(body);
        }
        if let Some(discovered) = inherited {
            if operation.namespace_map().is_empty() {
                operation = operation.namespaces(discovered.namespaces.clone());
            }
        }
        operation
    }

    fn read_body(&self, file: &str, binary: bool) -> Option<ResponseBody> {
        let body = if binary {
            self.resources.read_binary(file).map(ResponseBody::Binary)
        } else {
            self.resources.read_text(file).map(ResponseBody::Text)
        };
        if body.is_none() {
            error!(file = %file, "Default response file not found");
        }
        body
    }
}

fn wsdl_operation(discovered: &WsdlOperation) -> Operation {
    Operation::new(discovered.name.as_str())
        .default_text(discovered.default_response.as_str())
        .namespaces(discovered.namespaces.clone())
}

/// Read, validate and build the configuration at `path`, resolving
/// referenced files relative to its directory.
pub fn load_file(path: &Path) -> anyhow::Result<MockConfiguration> {
    let config = MockServiceConfig::from_file(path)?;
    let loader = ConfigurationLoader::new(DirectoryLoader::for_config_file(path));
    Ok(loader.load(&config)?)
}
