//! Event hooks around client activity.
//!
//! Every outgoing request, response, bulk submission, poll retry, and
//! surfaced error is broadcast to registered handlers. The default
//! [`LoggingHandler`] forwards them to the `log` facade.

use chrono::{DateTime, Utc};
use http::Method;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Structured pre-request event.
#[derive(Debug, Clone)]
pub struct RequestEvent {
    pub method: Method,
    pub url: Url,
    pub key_in_header: bool,
    pub timestamp: DateTime<Utc>,
}

/// Structured post-response event.
#[derive(Debug, Clone)]
pub struct ResponseEvent {
    pub method: Method,
    pub url: Url,
    pub status: u16,
    pub latency: Duration,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BulkSubmittedEvent {
    pub list_type: String,
    pub rows: usize,
    pub status_url: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PollRetryEvent {
    pub status_url: String,
    pub attempt: u32,
    pub max_retries: u32,
    pub last_status: Option<String>,
    pub scheduled_after: Duration,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ErrorEvent {
    pub endpoint: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum IpqsEvent {
    Request(RequestEvent),
    Response(ResponseEvent),
    BulkSubmitted(BulkSubmittedEvent),
    PollRetry(PollRetryEvent),
    Error(ErrorEvent),
}

/// Trait implemented by event handlers.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &IpqsEvent);
}

/// Dispatcher that broadcasts events to registered handlers.
#[derive(Default, Clone)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self { handlers: Vec::new() }
    }

    pub fn register_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn dispatch(&self, event: IpqsEvent) {
        for handler in &self.handlers {
            handler.handle(&event);
        }
    }
}

/// Logs events using the `log` crate.
#[derive(Debug)]
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn handle(&self, event: &IpqsEvent) {
        match event {
            IpqsEvent::Request(req) => {
                log::debug!(
                    "-> {} {} (key via {})",
                    req.method,
                    req.url,
                    if req.key_in_header { "header" } else { "query" }
                );
            }
            IpqsEvent::Response(resp) => {
                log::debug!(
                    "<- {} {} -> {} ({:.2}s)",
                    resp.method,
                    resp.url,
                    resp.status,
                    resp.latency.as_secs_f64()
                );
            }
            IpqsEvent::BulkSubmitted(bulk) => {
                log::info!(
                    "bulk {} job submitted with {} rows, status at {}",
                    bulk.list_type,
                    bulk.rows,
                    bulk.status_url
                );
            }
            IpqsEvent::PollRetry(retry) => {
                log::info!(
                    "bulk job {} status {} retry {}/{} after {:.2}s",
                    retry.status_url,
                    retry.last_status.as_deref().unwrap_or("<missing>"),
                    retry.attempt,
                    retry.max_retries,
                    retry.scheduled_after.as_secs_f64()
                );
            }
            IpqsEvent::Error(error) => {
                log::warn!("ipqs {} -> {}", error.endpoint, error.error);
            }
        }
    }
}

/// Replaces every occurrence of `secret` in `text` with a mask.
pub(crate) fn mask_secret(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        return text.to_string();
    }
    text.replace(secret, "****")
}

/// Copy of `url` with the API key masked in its path and query.
pub(crate) fn masked_url(url: &Url, secret: &str) -> Url {
    Url::parse(&mask_secret(url.as_str(), secret)).unwrap_or_else(|_| url.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingHandler(std::sync::Mutex<usize>);

    impl EventHandler for CountingHandler {
        fn handle(&self, _event: &IpqsEvent) {
            *self.0.lock().unwrap() += 1;
        }
    }

    #[test]
    fn dispatches_to_handlers() {
        let mut dispatcher = EventDispatcher::new();
        let counter = Arc::new(CountingHandler(std::sync::Mutex::new(0)));
        dispatcher.register_handler(counter.clone());
        dispatcher.register_handler(Arc::new(LoggingHandler));
        dispatcher.dispatch(IpqsEvent::Error(ErrorEvent {
            endpoint: "email".into(),
            error: "timeout".into(),
            timestamp: Utc::now(),
        }));
        assert_eq!(*counter.0.lock().unwrap(), 1);
    }

    #[test]
    fn masks_key_in_url() {
        let url = Url::parse("https://www.ipqualityscore.com/api/json/ip/secret123/8.8.8.8?key=secret123")
            .unwrap();
        let masked = masked_url(&url, "secret123");
        assert!(!masked.as_str().contains("secret123"));
        assert!(masked.as_str().contains("/ip/****/8.8.8.8"));
    }
}
