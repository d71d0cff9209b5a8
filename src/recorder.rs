//! Request recorder.
//!
//! Append-only log of [`RecordedRequest`]s for one operation, with the query
//! projections used by verification tooling. Like the schedule, the log is
//! guarded by its operation's lock inside the engine.

use crate::error::MockError;
use crate::model::{ResourceMode, Service};
use crate::request::{RecordedRequest, RequestHeaders, ResourceRef};

/// Which resource projection a verification query asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceQuery {
    Ids,
    Paths,
}

impl ResourceQuery {
    fn mode(self) -> ResourceMode {
        match self {
            ResourceQuery::Ids => ResourceMode::Id,
            ResourceQuery::Paths => ResourceMode::Path,
        }
    }

    fn label(self) -> &'static str {
        match self {
            ResourceQuery::Ids => "resource ids",
            ResourceQuery::Paths => "resource paths",
        }
    }

    /// Reject the query unless `service` records resources in the matching mode.
    pub fn check(self, service: &Service) -> Result<(), MockError> {
        let mode = service.resource_mode();
        if mode == self.mode() {
            return Ok(());
        }
        Err(MockError::UnsupportedQuery {
            service: service.name().to_string(),
            query: self.label(),
            mode: match mode {
                ResourceMode::Path => "enabled",
                ResourceMode::Id => "disabled",
            },
        })
    }
}

/// Append-only log of the requests one operation received since its last reset.
#[derive(Debug, Clone, Default)]
pub struct RequestLog {
    requests: Vec<RecordedRequest>,
}

impl RequestLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request; the log keeps arrival order.
    pub fn record(&mut self, request: RecordedRequest) {
        self.requests.push(request);
    }

    /// Drop every recorded request.
    pub fn clear(&mut self) {
        self.requests.clear();
    }

    /// Number of recorded requests.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Request bodies, oldest first.
    pub fn bodies(&self) -> Vec<String> {
        self.requests.iter().map(|r| r.body.clone()).collect()
    }

    /// Query strings, `None` where a request had none.
    pub fn query_strings(&self) -> Vec<Option<String>> {
        self.requests.iter().map(|r| r.query_string.clone()).collect()
    }

    /// Stored resource references, as captured at record time.
    pub fn resources(&self) -> Vec<Option<String>> {
        self.requests
            .iter()
            .map(|r| r.resource.as_ref().map(|res| ResourceRef::as_str(res).to_string()))
            .collect()
    }

    /// Header multimaps, one per request.
    pub fn headers(&self) -> Vec<RequestHeaders> {
        self.requests.iter().map(|r| r.headers.clone()).collect()
    }

    /// Copies of the complete recorded requests.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.clone()
    }
}
