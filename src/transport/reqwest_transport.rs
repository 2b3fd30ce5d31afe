//! Reqwest-based implementation of the `IpqsTransport` trait.
//!
//! reqwest 0.12 is built on `http` 1.x, so methods and header maps pass
//! through without conversion.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{IpqsTransport, TransportError, TransportRequest, TransportResponse};

/// Reqwest-backed transport used by default.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Creates a transport whose requests abort after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ipqs-rs/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| TransportError::Transport(err.to_string()))?;

        Ok(Self { client })
    }

    /// Wrap an existing reqwest client. Its timeout settings are used as-is.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IpqsTransport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let TransportRequest {
            method,
            url,
            query,
            headers,
            body,
        } = request;

        let mut builder = self.client.request(method, url).headers(headers);
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| TransportError::Transport(err.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|err| TransportError::Transport(err.to_string()))?;

        Ok(TransportResponse::new(status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn forwards_query_headers_and_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/json/csv/upload"))
            .and(query_param("strictness", "1"))
            .and(header("key", "test-key"))
            .and(header("content-type", "application/json"))
            .and(body_string("{\"type\":\"email\"}"))
            .respond_with(ResponseTemplate::new(202).set_body_string("{\"success\":true}"))
            .expect(1)
            .mount(&server)
            .await;

        let url = url::Url::parse(&format!("{}/api/json/csv/upload", server.uri())).unwrap();
        let request = TransportRequest::post_json(url, b"{\"type\":\"email\"}".to_vec())
            .with_query(vec![("strictness".into(), "1".into())])
            .with_header("key", "test-key")
            .unwrap();

        let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
        let response = transport.send(request).await.unwrap();

        assert_eq!(response.status, 202);
        assert_eq!(&response.body[..], b"{\"success\":true}");
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let transport = ReqwestTransport::new(Duration::from_secs(2)).unwrap();
        let request = TransportRequest::get(url::Url::parse("http://127.0.0.1:9/").unwrap());

        let err = transport.send(request).await.unwrap_err();

        assert!(matches!(err, TransportError::Transport(_)));
    }
}
