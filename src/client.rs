//! IPQS API client.
//!
//! Wraps the four IPQS endpoints (proxy/VPN detection, email validation,
//! phone validation, bulk CSV validation) behind async methods that return
//! the parsed JSON response or an [`IpqsError`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::bulk::{
    BulkItem, BulkJob, BulkListType, BulkOutcome, BulkUploadRequest, PollSchedule, StatusSource,
    csv_rows, poll_until_finished,
};
use crate::config::{BulkConfig, ConfigError, EndpointDefaults, IpqsConfig};
use crate::events::{
    BulkSubmittedEvent, ErrorEvent, EventDispatcher, EventHandler, IpqsEvent, LoggingHandler,
    RequestEvent, ResponseEvent, mask_secret, masked_url,
};
use crate::options::RequestOptions;
use crate::response::ApiResponse;
use crate::transport::{
    IpqsTransport, ReqwestTransport, TransportError, TransportRequest, TransportResponse,
};

/// Result alias used across the client.
pub type IpqsResult<T> = Result<T, IpqsError>;

/// Error surfaced by every client operation.
#[derive(Debug, Error)]
pub enum IpqsError {
    #[error("HTTP request to IPQS failed: {0}")]
    Transport(String),
    #[error("Failed to parse JSON response from IPQS: {0}")]
    InvalidJson(String),
    #[error("{0}")]
    Api(String),
    #[error("{0}")]
    Bulk(String),
    #[error("invalid IPQS url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("invalid IPQS configuration: {0}")]
    Config(#[from] ConfigError),
}

impl IpqsError {
    /// Human-readable message without the category prefix.
    pub fn message(&self) -> String {
        match self {
            IpqsError::Transport(message)
            | IpqsError::InvalidJson(message)
            | IpqsError::Api(message)
            | IpqsError::Bulk(message) => message.clone(),
            IpqsError::InvalidUrl(err) => err.to_string(),
            IpqsError::Config(err) => err.to_string(),
        }
    }
}

impl From<TransportError> for IpqsError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Transport(message) => IpqsError::Transport(message),
            other => IpqsError::Transport(other.to_string()),
        }
    }
}

/// Fluent builder for [`IpqsClient`].
pub struct IpqsClientBuilder {
    config: IpqsConfig,
    transport: Option<Arc<dyn IpqsTransport>>,
    handlers: Vec<Arc<dyn EventHandler>>,
    enable_logging: bool,
}

impl IpqsClientBuilder {
    pub fn new(config: IpqsConfig) -> Self {
        Self {
            config,
            transport: None,
            handlers: Vec::new(),
            enable_logging: true,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> IpqsResult<Self> {
        self.config = self.config.with_base_url(base_url)?;
        Ok(self)
    }

    /// Request timeout applied to the default transport.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn with_defaults(mut self, defaults: EndpointDefaults) -> Self {
        self.config.defaults = defaults;
        self
    }

    pub fn with_bulk_config(mut self, bulk: BulkConfig) -> Self {
        self.config.bulk = bulk;
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn IpqsTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn disable_logging(mut self) -> Self {
        self.enable_logging = false;
        self
    }

    pub fn build(self) -> IpqsResult<IpqsClient> {
        let transport: Arc<dyn IpqsTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(self.config.timeout)?),
        };

        let mut events = EventDispatcher::new();
        if self.enable_logging {
            events.register_handler(Arc::new(LoggingHandler));
        }
        for handler in self.handlers {
            events.register_handler(handler);
        }

        Ok(IpqsClient {
            config: self.config,
            transport,
            events,
        })
    }
}

/// Client for the IPQS JSON API.
pub struct IpqsClient {
    config: IpqsConfig,
    transport: Arc<dyn IpqsTransport>,
    events: EventDispatcher,
}

impl IpqsClient {
    /// Client with default configuration for `api_key`.
    pub fn new(api_key: impl Into<String>) -> IpqsResult<Self> {
        Self::with_config(IpqsConfig::new(api_key)?)
    }

    /// Client configured from `IPQS_*` environment variables.
    pub fn from_env() -> IpqsResult<Self> {
        Self::with_config(IpqsConfig::from_env()?)
    }

    pub fn with_config(config: IpqsConfig) -> IpqsResult<Self> {
        IpqsClientBuilder::new(config).build()
    }

    pub fn builder(config: IpqsConfig) -> IpqsClientBuilder {
        IpqsClientBuilder::new(config)
    }

    pub fn config(&self) -> &IpqsConfig {
        &self.config
    }

    /// Proxy & VPN detection.
    ///
    /// Missing `user_agent`/`user_language` are sent as empty strings and a
    /// missing `strictness` falls back to the configured IP default, then 0.
    /// Public access points and lighter penalties are always enabled.
    pub async fn check_ip(
        &self,
        ip: &str,
        user_agent: Option<&str>,
        user_language: Option<&str>,
        strictness: Option<u32>,
    ) -> IpqsResult<ApiResponse> {
        let mut params = self.config.defaults.ip.clone();
        params.insert("user_agent", user_agent.unwrap_or_default());
        params.insert("user_language", user_language.unwrap_or_default());
        match strictness {
            Some(level) => params.insert("strictness", level),
            None => params.insert_default("strictness", 0),
        }
        params.insert("allow_public_access_points", true);
        params.insert("lighter_penalties", true);

        self.lookup("ip", ip, params).await
    }

    /// Email validation. `options` (e.g. `timeout`, `fast`) override the
    /// configured email defaults.
    pub async fn verify_email(
        &self,
        email: &str,
        options: &RequestOptions,
    ) -> IpqsResult<ApiResponse> {
        let params = options.merged_over(&self.config.defaults.email);
        self.lookup("email", email, params).await
    }

    /// Phone number validation. `options` (e.g. `country_code`) override the
    /// configured phone defaults.
    pub async fn validate_phone(
        &self,
        phone: &str,
        options: &RequestOptions,
    ) -> IpqsResult<ApiResponse> {
        let params = options.merged_over(&self.config.defaults.phone);
        self.lookup("phone", phone, params).await
    }

    /// Runs the whole bulk workflow: submit, poll, download.
    ///
    /// Returns [`BulkOutcome::Pending`] with the last status response when the
    /// job is still running after the configured number of retries.
    pub async fn bulk_validate_csv<I>(
        &self,
        list_type: BulkListType,
        list: I,
    ) -> IpqsResult<BulkOutcome>
    where
        I: IntoIterator,
        I::Item: BulkItem,
    {
        let rows = csv_rows(list);
        let result = self.run_bulk(list_type, rows).await;
        self.report("csv", result)
    }

    /// Submits a bulk list and returns the job handle without polling.
    pub async fn submit_bulk_job<I>(&self, list_type: BulkListType, list: I) -> IpqsResult<BulkJob>
    where
        I: IntoIterator,
        I::Item: BulkItem,
    {
        let rows = csv_rows(list);
        let result = self.submit_rows(list_type, rows).await;
        self.report("csv/upload", result)
    }

    /// Polls `job` with the configured schedule and returns the last status.
    pub async fn poll_bulk_job(&self, job: &mut BulkJob) -> IpqsResult<ApiResponse> {
        let result = poll_until_finished(self, job, self.schedule(), &self.events).await;
        self.report("status", result)
    }

    /// Single status check for a bulk job.
    pub async fn check_status(&self, status_url: &str) -> IpqsResult<ApiResponse> {
        let result = self.status_once(status_url).await;
        self.report("status", result)
    }

    /// Downloads and parses a bulk result file.
    pub async fn download_results(&self, download_url: &str) -> IpqsResult<Value> {
        let result = self.fetch_results(download_url).await;
        self.report("download", result)
    }

    async fn lookup(
        &self,
        kind: &str,
        subject: &str,
        params: RequestOptions,
    ) -> IpqsResult<ApiResponse> {
        let result = match self.endpoint_url(&[kind, self.config.api_key.as_str(), subject]) {
            Ok(url) => self.request(url, params).await,
            Err(err) => Err(err),
        };
        self.report(kind, result)
    }

    async fn run_bulk(
        &self,
        list_type: BulkListType,
        rows: Vec<Vec<String>>,
    ) -> IpqsResult<BulkOutcome> {
        let mut job = self.submit_rows(list_type, rows).await?;
        let last = poll_until_finished(self, &mut job, self.schedule(), &self.events).await?;
        if !last.is_finished() {
            return Ok(BulkOutcome::Pending(last));
        }

        let download_url = job.download_url().ok_or_else(|| {
            IpqsError::Bulk("IPQS Bulk API did not return a download URL.".into())
        })?;
        let results = self.fetch_results(download_url).await?;
        Ok(BulkOutcome::Finished(results))
    }

    fn schedule(&self) -> PollSchedule {
        self.config.bulk.into()
    }

    async fn submit_rows(
        &self,
        list_type: BulkListType,
        rows: Vec<Vec<String>>,
    ) -> IpqsResult<BulkJob> {
        let row_count = rows.len();
        let body = BulkUploadRequest::new(list_type, &self.config.api_key, rows);
        let payload = serde_json::to_vec(&body)
            .map_err(|err| IpqsError::InvalidJson(err.to_string()))?;

        let url = self.resolve("csv/upload")?;
        let response = self.send(TransportRequest::post_json(url, payload)).await?;
        let data = parse_object(&response)?;

        let errors = data.errors();
        if !errors.is_empty() {
            return Err(IpqsError::Bulk(format!(
                "IPQS Bulk API Error: {}",
                errors.join(", ")
            )));
        }

        if !data.success() {
            return Err(IpqsError::Api(data.failure_message()));
        }

        let status_url = data.status_url().ok_or_else(|| {
            IpqsError::Bulk("IPQS Bulk API did not return a status URL.".into())
        })?;

        self.events.dispatch(IpqsEvent::BulkSubmitted(BulkSubmittedEvent {
            list_type: list_type.to_string(),
            rows: row_count,
            status_url: status_url.to_string(),
            timestamp: Utc::now(),
        }));

        Ok(BulkJob::new(list_type, status_url))
    }

    async fn status_once(&self, status_url: &str) -> IpqsResult<ApiResponse> {
        let url = self.resolve(status_url)?;
        self.request(url, RequestOptions::new()).await
    }

    async fn fetch_results(&self, download_url: &str) -> IpqsResult<Value> {
        let url = self.resolve(download_url)?;
        let response = self.send(TransportRequest::get(url)).await?;

        if response.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Array(Vec::new()));
        }

        let parsed: Value = serde_json::from_slice(&response.body).map_err(|err| {
            IpqsError::InvalidJson(format!("bulk results (HTTP {}): {err}", response.status))
        })?;

        Ok(match parsed {
            Value::Null => Value::Array(Vec::new()),
            other => other,
        })
    }

    /// Issues a GET against `url` and validates the IPQS envelope.
    ///
    /// With no params the key travels in a `key` header and no query string
    /// is sent (status checks). Otherwise the key joins the query string.
    async fn request(&self, url: Url, params: RequestOptions) -> IpqsResult<ApiResponse> {
        let request = if params.is_empty() {
            TransportRequest::get(url).with_header("key", &self.config.api_key)?
        } else {
            let mut params = params;
            params.insert("key", self.config.api_key.as_str());
            TransportRequest::get(url).with_query(params.to_query_pairs())
        };

        let response = self.send(request).await?;
        let data = parse_object(&response)?;

        if !data.success() {
            return Err(IpqsError::Api(data.failure_message()));
        }

        Ok(data)
    }

    async fn send(&self, request: TransportRequest) -> IpqsResult<TransportResponse> {
        let method = request.method.clone();
        let url = masked_url(&request.url, &self.config.api_key);

        self.events.dispatch(IpqsEvent::Request(RequestEvent {
            method: method.clone(),
            url: url.clone(),
            key_in_header: request.headers.contains_key("key"),
            timestamp: Utc::now(),
        }));

        let started = Instant::now();
        let response = self.transport.send(request).await?;
        let latency = started.elapsed();

        self.events.dispatch(IpqsEvent::Response(ResponseEvent {
            method,
            url,
            status: response.status,
            latency,
            timestamp: Utc::now(),
        }));

        Ok(response)
    }

    /// Appends percent-encoded path segments to the base URL.
    fn endpoint_url(&self, segments: &[&str]) -> IpqsResult<Url> {
        let mut endpoint = self.config.base_url.clone();
        endpoint
            .path_segments_mut()
            .map_err(|_| IpqsError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(endpoint)
    }

    /// Absolute URLs are used as-is; anything else is joined to the base URL.
    fn resolve(&self, endpoint: &str) -> IpqsResult<Url> {
        match Url::parse(endpoint) {
            Ok(url) if url.has_host() => Ok(url),
            _ => Ok(self.config.base_url.join(endpoint.trim_start_matches('/'))?),
        }
    }

    fn report<T>(&self, endpoint: &str, result: IpqsResult<T>) -> IpqsResult<T> {
        if let Err(ref err) = result {
            self.events.dispatch(IpqsEvent::Error(ErrorEvent {
                endpoint: endpoint.to_string(),
                error: mask_secret(&err.to_string(), &self.config.api_key),
                timestamp: Utc::now(),
            }));
        }
        result
    }
}

#[async_trait]
impl StatusSource for IpqsClient {
    async fn check_status(&self, status_url: &str) -> IpqsResult<ApiResponse> {
        self.status_once(status_url).await
    }
}

fn parse_object(response: &TransportResponse) -> IpqsResult<ApiResponse> {
    ApiResponse::from_slice(&response.body)
        .map_err(|err| IpqsError::InvalidJson(format!("HTTP {}: {err}", response.status)))
}
