//! Inbound and recorded requests.

use crate::model::ResourceMode;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Header multi-map. Names are stored lower-cased; a name may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RequestHeaders {
    entries: BTreeMap<String, Vec<String>>,
}

impl RequestHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value, keeping any values already present under `name`.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.entries
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    /// First value recorded under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: AsRef<str>, V: Into<String>> FromIterator<(N, V)> for RequestHeaders {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = RequestHeaders::new();
        for (name, value) in iter {
            headers.append(name.as_ref(), value);
        }
        headers
    }
}

/// Canonical request record supplied by the transport layer for each call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundRequest {
    pub body: Option<String>,
    pub query_string: Option<String>,
    /// Path segments beyond the operation route, e.g. `orders/17`.
    pub resource_path: Option<String>,
    pub headers: RequestHeaders,
}

impl InboundRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn query_string(mut self, query: impl Into<String>) -> Self {
        self.query_string = Some(query.into());
        self
    }

    pub fn resource_path(mut self, path: impl Into<String>) -> Self {
        self.resource_path = Some(path.into());
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }
}

/// Trailing resource reference, extracted once when the request is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceRef {
    Id(String),
    Path(String),
}

impl ResourceRef {
    /// Extract the reference from a raw trailing path.
    ///
    /// `Id` keeps the segment right after the route; `Path` keeps every
    /// segment. Surrounding slashes are dropped and an empty path yields `None`.
    pub fn extract(raw: &str, mode: ResourceMode) -> Option<Self> {
        let trimmed = raw.trim().trim_matches('/');
        if trimmed.is_empty() {
            return None;
        }
        match mode {
            ResourceMode::Id => trimmed
                .split('/')
                .find(|segment| !segment.is_empty())
                .map(|id| ResourceRef::Id(id.to_string())),
            ResourceMode::Path => Some(ResourceRef::Path(trimmed.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ResourceRef::Id(value) | ResourceRef::Path(value) => value,
        }
    }
}

/// Immutable snapshot of one inbound call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedRequest {
    pub body: String,
    pub query_string: Option<String>,
    pub resource: Option<ResourceRef>,
    pub headers: RequestHeaders,
    pub received_at: DateTime<Utc>,
}

impl RecordedRequest {
    /// Snapshot `request`, deriving the resource reference for `mode`.
    pub fn capture(request: InboundRequest, mode: ResourceMode, strip_declaration: bool) -> Self {
        let body = request.body.unwrap_or_default();
        let body = if strip_declaration {
            strip_xml_declaration(&body).to_string()
        } else {
            body
        };
        let resource = request
            .resource_path
            .as_deref()
            .and_then(|raw| ResourceRef::extract(raw, mode));
        Self {
            body,
            query_string: request.query_string,
            resource,
            headers: request.headers,
            received_at: Utc::now(),
        }
    }
}

/// Drop a leading `<?xml ...?>` declaration, if any.
pub fn strip_xml_declaration(body: &str) -> &str {
    let trimmed = body.trim_start();
    if trimmed.starts_with("<?xml") {
        if let Some(end) = trimmed.find("?>") {
            return trimmed[end + 2..].trim_start();
        }
    }
    body
}
