//! Flat indexed property format.
//!
//! ```text
//! SERVICE[0].NAME=ticketing
//! SERVICE[0].WSDL=ticketing.wsdl
//! SERVICE[0].OPERATION[0].INPUT_MESSAGE=reserveRequest
//! SERVICE[0].OPERATION[0].DEFAULT_RESPONSE=reserve_response.xml
//!
//! SERVICE[1].NAME=orders
//! SERVICE[1].TYPE=REST
//! SERVICE[1].OPERATION[0].HTTP_METHOD=GET
//! ```
//!
//! Parsed into the same [`MockServiceConfig`] definitions as the YAML format.
//! Operation indexes are kept as explicit positions.

use crate::config::{MockServiceConfig, OperationDefinition, ServiceDefinition};
use crate::error::ConfigError;
use crate::model::{HttpMethod, ServiceKind};
use crate::response::{is_valid_media_type, parse_header_list, parse_namespace_list};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::warn;

const NAME: &str = "NAME";
const TYPE: &str = "TYPE";
const WSDL: &str = "WSDL";
const IGNORE_XML_DECLARATION: &str = "IGNORE_XML_DECLARATION";
const ENABLE_RESOURCE_PATHS: &str = "ENABLE_RESOURCE_PATHS";

const INPUT_MESSAGE: &str = "INPUT_MESSAGE";
const HTTP_METHOD: &str = "HTTP_METHOD";
const DEFAULT_RESPONSE: &str = "DEFAULT_RESPONSE";
const DEFAULT_RESPONSE_CODE: &str = "DEFAULT_RESPONSE_CODE";
const DEFAULT_RESPONSE_CONTENT_TYPE: &str = "DEFAULT_RESPONSE_CONTENT_TYPE";
const DEFAULT_RESPONSE_HEADERS: &str = "DEFAULT_RESPONSE_HEADERS";
const BINARY: &str = "BINARY";
const NAMESPACE: &str = "NAMESPACE";

fn service_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^SERVICE\[([0-9]+)\]$").expect("service pattern is valid"))
}

fn operation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^OPERATION\[([0-9]+)\]$").expect("operation pattern is valid"))
}

/// Index captured from `SERVICE[n]`, or `None` when the segment does not match.
pub fn service_index(segment: &str) -> Option<usize> {
    extract_index(service_pattern(), segment)
}

/// Index captured from `OPERATION[n]`, or `None` when the segment does not match.
pub fn operation_index(segment: &str) -> Option<u32> {
    extract_index(operation_pattern(), segment)
}

fn extract_index<T: std::str::FromStr>(pattern: &Regex, segment: &str) -> Option<T> {
    pattern
        .captures(segment)
        .and_then(|captures| captures.get(1))
        .and_then(|index| index.as_str().parse().ok())
}

#[derive(Default)]
struct ServiceEntry {
    definition: Option<ServiceDefinition>,
    operations: BTreeMap<u32, OperationDefinition>,
}

impl ServiceEntry {
    fn definition(&mut self) -> &mut ServiceDefinition {
        self.definition
            .get_or_insert_with(|| ServiceDefinition::new("", "soap"))
    }
}

/// Parse property text into service definitions.
pub fn parse(content: &str) -> Result<MockServiceConfig, ConfigError> {
    let mut services: BTreeMap<usize, ServiceEntry> = BTreeMap::new();

    for (key, value) in read_pairs(content) {
        let parts: Vec<&str> = key.split('.').collect();
        if parts.len() < 2 {
            continue;
        }
        let Some(service_index) = service_index(parts[0]) else {
            continue;
        };
        let entry = services.entry(service_index).or_default();

        match operation_index(parts[1]) {
            Some(operation_index) => {
                let Some(property) = parts.get(2) else {
                    warn!(key = %key, "Operation property has no name");
                    continue;
                };
                let operation = entry.operations.entry(operation_index).or_default();
                operation.index = Some(operation_index);
                set_operation_property(operation, property, &value)?;
            }
            None => set_service_property(entry.definition(), parts[1], &value)?,
        }
    }

    let mut config = MockServiceConfig::default();
    for (index, mut entry) in services {
        let mut definition = entry.definition().clone();
        if definition.name.is_empty() {
            return Err(ConfigError::MissingServiceName(index));
        }
        definition.operations = entry.operations.into_values().collect();
        config.services.push(definition);
    }
    Ok(config)
}

fn set_service_property(
    service: &mut ServiceDefinition,
    property: &str,
    value: &str,
) -> Result<(), ConfigError> {
    match property {
        NAME => service.name = value.to_string(),
        TYPE => {
            let kind: ServiceKind = value.parse()?;
            service.service_type = kind.to_string().to_ascii_lowercase();
        }
        WSDL => service.wsdl = Some(value.to_string()),
        IGNORE_XML_DECLARATION => service.ignore_xml_declaration = parse_bool(value),
        ENABLE_RESOURCE_PATHS => service.enable_resource_paths = parse_bool(value),
        _ => {}
    }
    Ok(())
}

fn set_operation_property(
    operation: &mut OperationDefinition,
    property: &str,
    value: &str,
) -> Result<(), ConfigError> {
    match property {
        INPUT_MESSAGE => operation.input_message = Some(value.to_string()),
        HTTP_METHOD => {
            let method: HttpMethod = value.parse()?;
            operation.http_method = Some(method.to_string());
        }
        DEFAULT_RESPONSE => operation.default_response = Some(value.to_string()),
        DEFAULT_RESPONSE_CODE => {
            let code = value.parse().map_err(|_| ConfigError::InvalidValue {
                key: DEFAULT_RESPONSE_CODE.to_string(),
                value: value.to_string(),
            })?;
            operation.default_response_code = Some(code);
        }
        DEFAULT_RESPONSE_CONTENT_TYPE => {
            if is_valid_media_type(value) {
                operation.default_response_content_type = Some(value.to_string());
            } else {
                warn!(content_type = %value, "Illegal content type, keeping the default");
            }
        }
        DEFAULT_RESPONSE_HEADERS => operation.default_response_headers = parse_header_list(value),
        BINARY => operation.binary = parse_bool(value),
        NAMESPACE => operation.namespaces.extend(parse_namespace_list(value)),
        _ => warn!(property = %property, "Unidentified operation property"),
    }
    Ok(())
}

/// Only a case-insensitive `true` is true.
fn parse_bool(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}

/// Split property text into trimmed key/value pairs, in file order.
///
/// Blank lines and `#`/`!` comments are skipped, a trailing backslash
/// continues the value on the next line, and the key ends at the first `=`,
/// `:` or whitespace.
fn read_pairs(content: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut logical = String::new();

    for line in content.lines() {
        let line = if logical.is_empty() { line.trim() } else { line.trim_start() };
        if logical.is_empty() && (line.is_empty() || line.starts_with('#') || line.starts_with('!')) {
            continue;
        }
        if let Some(continued) = line.strip_suffix('\\') {
            logical.push_str(continued);
            continue;
        }
        logical.push_str(line);
        pairs.push(split_pair(&logical));
        logical.clear();
    }
    if !logical.is_empty() {
        pairs.push(split_pair(&logical));
    }
    pairs
}

fn split_pair(line: &str) -> (String, String) {
    let end = line
        .find(|c: char| c == '=' || c == ':' || c.is_whitespace())
        .unwrap_or(line.len());
    let key = &line[..end];
    let rest = line[end..].trim_start();
    let value = rest
        .strip_prefix('=')
        .or_else(|| rest.strip_prefix(':'))
        .unwrap_or(rest);
    (key.to_string(), value.trim().to_string())
}
