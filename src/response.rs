//! Mock responses.
//!
//! A [`MockResponse`] is what the test author schedules (or what an operation
//! falls back to). A [`ResponseEnvelope`] is what the engine hands back to the
//! transport layer once every unset field has been back-filled.

use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;
use std::time::Duration;

/// Content type used when neither the response nor the operation set one.
pub const DEFAULT_CONTENT_TYPE: &str = "text/xml";

/// Status code used when neither the response nor the operation set one.
pub const DEFAULT_RESPONSE_CODE: u16 = 200;

/// Which body field an operation populates on every response it emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyKind {
    #[default]
    Text,
    Binary,
}

/// Response payload: text or bytes, never both.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResponseBody {
    #[default]
    Empty,
    Text(String),
    Binary(Vec<u8>),
}

impl ResponseBody {
    pub fn is_empty(&self) -> bool {
        match self {
            ResponseBody::Empty => true,
            ResponseBody::Text(text) => text.is_empty(),
            ResponseBody::Binary(bytes) => bytes.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ResponseBody::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Convert the payload so it lives in the field selected by `kind`.
    ///
    /// Text becomes its UTF-8 bytes; bytes become lossily decoded text.
    pub fn coerce(self, kind: BodyKind) -> Self {
        match (self, kind) {
            (ResponseBody::Text(text), BodyKind::Binary) => ResponseBody::Binary(text.into_bytes()),
            (ResponseBody::Binary(bytes), BodyKind::Text) => {
                ResponseBody::Text(String::from_utf8_lossy(&bytes).into_owned())
            }
            (body, _) => body,
        }
    }
}

impl Serialize for ResponseBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use base64::Engine;
        match self {
            ResponseBody::Empty => serializer.serialize_none(),
            ResponseBody::Text(text) => serializer.serialize_str(text),
            ResponseBody::Binary(bytes) => serializer
                .serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes)),
        }
    }
}

/// A fully specified response, either scheduled for a call position or used
/// as an operation's default.
///
/// A `code` of `0` means "unset"; it is replaced by 200 when the response is
/// scheduled. An unset `content_type` is back-filled from the operation at
/// dispatch time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MockResponse {
    pub body: ResponseBody,
    pub code: u16,
    pub content_type: Option<String>,
    pub headers: HashMap<String, String>,
    #[serde(serialize_with = "delay_secs::serialize")]
    pub delay: Duration,
}

impl MockResponse {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: ResponseBody::Text(body.into()),
            ..Self::default()
        }
    }

    pub fn binary(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: ResponseBody::Binary(body.into()),
            ..Self::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn code(mut self, code: u16) -> Self {
        self.code = code;
        self
    }

    pub fn delay_secs(mut self, secs: u64) -> Self {
        self.delay = Duration::from_secs(secs);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Replace an unset (zero) code with `code`.
    pub fn fill_unset_code(&mut self, code: u16) {
        if self.code == 0 {
            self.code = code;
        }
    }
}

mod delay_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(delay: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(delay.as_secs())
    }
}

/// The response handed to the transport layer: every field resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseEnvelope {
    pub code: u16,
    pub content_type: String,
    pub headers: HashMap<String, String>,
    pub body: ResponseBody,
}

/// Parse a `name:value,name2:value2` header list.
///
/// Pairs without a `:` are skipped. Names and values are trimmed.
pub fn parse_header_list(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| pair.split_once(':'))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

/// Parse a `prefix=uri,prefix2=uri2` namespace list.
pub fn parse_namespace_list(raw: &str) -> BTreeMap<String, String> {
    raw.split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(prefix, uri)| (prefix.trim().to_string(), uri.trim().to_string()))
        .filter(|(_, uri)| !uri.is_empty())
        .collect()
}

/// Whether `value` looks like a `type/subtype[;params]` media type.
pub fn is_valid_media_type(value: &str) -> bool {
    static MEDIA_TYPE: OnceLock<regex::Regex> = OnceLock::new();
    MEDIA_TYPE
        .get_or_init(|| {
            regex::Regex::new(r"^[A-Za-z0-9!#$&^_.+-]+/[A-Za-z0-9!#$&^_.+*-]+\s*(;.*)?$")
                .expect("media type pattern is valid")
        })
        .is_match(value.trim())
}
