//! Dispatch engine.
//!
//! The per-request entry point for the transport layer, plus the setup and
//! verification surfaces used by tests. Each operation owns its schedule and
//! request log behind a single lock, so recording a call and selecting its
//! response happen together, and resetting an operation never interleaves
//! with a dispatch to it. Injected delays run after the lock is released.

use crate::error::MockError;
use crate::model::{MockConfiguration, Operation, Service, ServiceKind};
use crate::recorder::{RequestLog, ResourceQuery};
use crate::request::{InboundRequest, RecordedRequest, RequestHeaders};
use crate::response::{MockResponse, ResponseEnvelope};
use crate::schedule::{ResponseSchedule, ResponseSource};
use crate::xml::Element;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Applies the latency a response asks for.
#[async_trait]
pub trait Delayer: Send + Sync {
    async fn delay(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelayer;

#[async_trait]
impl Delayer for TokioDelayer {
    async fn delay(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

#[derive(Debug)]
struct OperationState {
    schedule: ResponseSchedule,
    log: RequestLog,
}

type OperationKey = (String, String);

/// Dispatches requests against a loaded configuration and keeps per-operation
/// schedules and request logs.
pub struct MockEngine {
    configuration: MockConfiguration,
    operations: HashMap<OperationKey, Arc<RwLock<OperationState>>>,
    delayer: Arc<dyn Delayer>,
    requests_total: AtomicU64,
}

impl MockEngine {
    /// Create an engine with an empty schedule and log for every operation.
    pub fn new(configuration: MockConfiguration) -> Self {
        let mut operations = HashMap::new();
        for service in configuration.services() {
            for (_, operation) in service.operations() {
                operations
                    .entry((service.name().to_string(), operation.name().to_string()))
                    .or_insert_with(|| {
                        Arc::new(RwLock::new(OperationState {
                            schedule: ResponseSchedule::new(operation.body_kind()),
                            log: RequestLog::new(),
                        }))
                    });
            }
        }

        info!(
            services = configuration.service_count(),
            operations = operations.len(),
            "Mock engine initialized"
        );

        Self {
            configuration,
            operations,
            delayer: Arc::new(TokioDelayer),
            requests_total: AtomicU64::new(0),
        }
    }

    /// Load the configuration file at `path` and build an engine for it.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        Ok(Self::new(crate::loader::load_file(path)?))
    }

    /// Replace the tokio timer used for response delays.
    pub fn with_delayer(mut self, delayer: Arc<dyn Delayer>) -> Self {
        self.delayer = delayer;
        self
    }

    /// The loaded configuration model.
    pub fn configuration(&self) -> &MockConfiguration {
        &self.configuration
    }

    /// Total dispatches handled since startup.
    pub fn total_requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    fn lookup(
        &self,
        service: &str,
        operation: &str,
    ) -> Result<(&Service, &Operation, &Arc<RwLock<OperationState>>), MockError> {
        let service_def = self.configuration.service(service)?;
        let not_found = || MockError::OperationNotFound {
            service: service.to_string(),
            operation: operation.to_string(),
        };
        let operation_def = service_def.operation(operation).ok_or_else(not_found)?;
        let state = self
            .operations
            .get(&(service.to_string(), operation.to_string()))
            .ok_or_else(not_found)?;
        Ok((service_def, operation_def, state))
    }

    /// Handle one call to `operation` of `service`.
    ///
    /// Records the request, selects the response for this call number, waits
    /// out its delay and returns it with unset fields filled from the
    /// operation defaults.
    pub async fn dispatch(
        &self,
        service: &str,
        operation: &str,
        request: InboundRequest,
    ) -> Result<ResponseEnvelope, MockError> {
        let (service_def, operation_def, state) = self.lookup(service, operation)?;
        let strip_declaration =
            service_def.kind() == ServiceKind::Soap && service_def.ignores_xml_declaration();
        let recorded = RecordedRequest::capture(request, service_def.resource_mode(), strip_declaration);

        let selection = {
            let mut state = state.write().await;
            state.log.record(recorded);
            state.schedule.next_response(operation_def)
        };
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        debug!(
            service = %service,
            operation = %operation,
            position = selection.position,
            scheduled = selection.source == ResponseSource::Scheduled,
            "Dispatched request"
        );

        let response = selection.response;
        if !response.delay.is_zero() {
            debug!(
                operation = %operation,
                delay_secs = response.delay.as_secs(),
                "Delaying response"
            );
            self.delayer.delay(response.delay).await;
        }

        Ok(envelope(operation_def, response))
    }

    /// Handle a SOAP call, routing it by the elements of its body.
    pub async fn dispatch_soap(
        &self,
        service: &str,
        request: InboundRequest,
    ) -> Result<ResponseEnvelope, MockError> {
        let body = request.body.as_deref().unwrap_or_default();
        let operation = self.resolve_soap_operation(service, body)?;
        self.dispatch(service, &operation, request).await
    }

    /// Name of the operation a SOAP body is addressed to.
    ///
    /// Elements are visited in document order; the first whose local name is
    /// an operation name, in a namespace that operation accepts, wins. Only the
    /// `Body` of a SOAP envelope is searched, never its `Header`.
    pub fn resolve_soap_operation(&self, service: &str, body: &str) -> Result<String, MockError> {
        let service_def = self.configuration.service(service)?;
        let not_matched = || MockError::OperationNotMatched {
            service: service.to_string(),
        };
        let root = Element::parse(body).map_err(|e| {
            debug!(service = %service, error = %e, "SOAP body is not well-formed");
            not_matched()
        })?;

        let payload = match root.child("Body") {
            Some(body) if root.local_name == "Envelope" => body,
            _ => &root,
        };
        payload
            .walk()
            .into_iter()
            .find_map(|element| {
                service_def
                    .operations()
                    .map(|(_, op)| op)
                    .find(|op| {
                        op.name() == element.local_name
                            && op.accepts_namespace(element.namespace.as_deref())
                    })
                    .map(|op| op.name().to_string())
            })
            .ok_or_else(not_matched)
    }

    /// The WSDL document configured for `service`.
    pub fn wsdl(&self, service: &str) -> Result<&str, MockError> {
        self.configuration
            .service(service)?
            .wsdl()
            .ok_or_else(|| MockError::WsdlNotConfigured {
                service: service.to_string(),
            })
    }

    /// Clear the schedule, call counter and recorded requests of an operation.
    pub async fn init_mock(&self, service: &str, operation: &str) -> Result<(), MockError> {
        let (_, _, state) = self.lookup(service, operation)?;
        let mut state = state.write().await;
        state.schedule.reset();
        state.log.clear();
        info!(service = %service, operation = %operation, "Mock initialized");
        Ok(())
    }

    /// Schedule `response` at the lowest unconfigured position; returns it.
    pub async fn add_custom_response(
        &self,
        service: &str,
        operation: &str,
        response: MockResponse,
    ) -> Result<u32, MockError> {
        let (_, _, state) = self.lookup(service, operation)?;
        let position = state.write().await.schedule.schedule_next(response);
        info!(service = %service, operation = %operation, position, "Custom response added");
        Ok(position)
    }

    /// Schedule `response` for call number `position` (1-based).
    pub async fn set_custom_response(
        &self,
        service: &str,
        operation: &str,
        position: u32,
        response: MockResponse,
    ) -> Result<(), MockError> {
        let (_, _, state) = self.lookup(service, operation)?;
        state.write().await.schedule.schedule_at(position, response)?;
        info!(service = %service, operation = %operation, position, "Custom response set");
        Ok(())
    }

    /// Calls answered since the last reset.
    pub async fn calls(&self, service: &str, operation: &str) -> Result<u32, MockError> {
        let (_, _, state) = self.lookup(service, operation)?;
        let calls = state.read().await.schedule.calls();
        Ok(calls)
    }

    // Verification queries read the log under the same lock dispatch records into.
    async fn with_log<T>(
        &self,
        service: &str,
        operation: &str,
        query: Option<ResourceQuery>,
        project: impl FnOnce(&RequestLog) -> T,
    ) -> Result<T, MockError> {
        let (service_def, _, state) = self.lookup(service, operation)?;
        if let Some(query) = query {
            query.check(service_def)?;
        }
        let state = state.read().await;
        Ok(project(&state.log))
    }

    /// Recorded request bodies, oldest first.
    pub async fn recorded_bodies(&self, service: &str, operation: &str) -> Result<Vec<String>, MockError> {
        self.with_log(service, operation, None, RequestLog::bodies).await
    }

    /// Recorded query strings, `None` where a request had none.
    pub async fn recorded_query_strings(
        &self,
        service: &str,
        operation: &str,
    ) -> Result<Vec<Option<String>>, MockError> {
        self.with_log(service, operation, None, RequestLog::query_strings).await
    }

    /// Single trailing tokens; only for services without resource paths.
    pub async fn recorded_resource_ids(
        &self,
        service: &str,
        operation: &str,
    ) -> Result<Vec<Option<String>>, MockError> {
        self.with_log(service, operation, Some(ResourceQuery::Ids), RequestLog::resources)
            .await
    }

    /// Whole trailing paths; only for services with resource paths enabled.
    pub async fn recorded_resource_paths(
        &self,
        service: &str,
        operation: &str,
    ) -> Result<Vec<Option<String>>, MockError> {
        self.with_log(service, operation, Some(ResourceQuery::Paths), RequestLog::resources)
            .await
    }

    /// Recorded request headers, one multimap per request.
    pub async fn recorded_headers(
        &self,
        service: &str,
        operation: &str,
    ) -> Result<Vec<RequestHeaders>, MockError> {
        self.with_log(service, operation, None, RequestLog::headers).await
    }

    /// Complete recorded requests with their timestamps.
    pub async fn recorded_requests(
        &self,
        service: &str,
        operation: &str,
    ) -> Result<Vec<RecordedRequest>, MockError> {
        self.with_log(service, operation, None, RequestLog::requests).await
    }
}

fn envelope(operation: &Operation, response: MockResponse) -> ResponseEnvelope {
    let code = if response.code == 0 {
        operation.response_code()
    } else {
        response.code
    };
    let content_type = response
        .content_type
        .unwrap_or_else(|| operation.response_content_type().to_string());
    ResponseEnvelope {
        code,
        content_type,
        headers: response.headers,
        body: response.body,
    }
}
