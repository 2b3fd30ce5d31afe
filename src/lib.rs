//! # ipqs-rs
//!
//! An async client for the IPQualityScore (IPQS) fraud-detection API.
//!
//! ## Features
//!
//! - Proxy & VPN detection for IP addresses
//! - Email and phone number validation
//! - Bulk CSV validation with bounded status polling
//! - Per-endpoint default options, loadable from env or JSON
//! - Pluggable HTTP transport and event hooks
//!
//! ## Example
//!
//! ```no_run
//! use ipqs_rs::{BulkListType, BulkOutcome, IpqsClient, RequestOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = IpqsClient::from_env()?;
//!
//!     let ip = client.check_ip("8.8.8.8", Some("Mozilla/5.0"), Some("en-US"), Some(1)).await?;
//!     println!("fraud score: {:?}", ip.get("fraud_score"));
//!
//!     let phone = client
//!         .validate_phone("+15551234567", &RequestOptions::new().with("country_code", "US"))
//!         .await?;
//!     println!("valid phone: {:?}", phone.get("valid"));
//!
//!     match client
//!         .bulk_validate_csv(BulkListType::Email, ["a@example.com", "b@example.com"])
//!         .await?
//!     {
//!         BulkOutcome::Finished(results) => println!("{results}"),
//!         BulkOutcome::Pending(status) => println!("still running: {:?}", status.status()),
//!     }
//!     Ok(())
//! }
//! ```

mod client;

pub mod bulk;
pub mod config;
pub mod events;
pub mod options;
pub mod response;
pub mod transport;

pub use crate::client::{IpqsClient, IpqsClientBuilder, IpqsError, IpqsResult};

pub use crate::bulk::{
    BulkItem,
    BulkJob,
    BulkListType,
    BulkOutcome,
    BulkUploadRequest,
    PollSchedule,
    StatusSource,
    UnknownListType,
    csv_rows,
    poll_until_finished,
};

pub use crate::config::{BulkConfig, ConfigError, DEFAULT_BASE_URL, EndpointDefaults, IpqsConfig};

pub use crate::events::{
    BulkSubmittedEvent,
    ErrorEvent,
    EventDispatcher,
    EventHandler,
    IpqsEvent,
    LoggingHandler,
    PollRetryEvent,
    RequestEvent,
    ResponseEvent,
};

pub use crate::options::{OptionValue, RequestOptions};

pub use crate::response::{ApiResponse, STATUS_FINISHED, UNKNOWN_API_ERROR};

pub use crate::transport::{
    IpqsTransport,
    ReqwestTransport,
    TransportError,
    TransportRequest,
    TransportResponse,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
