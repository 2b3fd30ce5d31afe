//! Bulk CSV validation jobs.
//!
//! A bulk job is submitted once, then its status URL is polled until the
//! server reports `FINISHED` or the retry ceiling is reached. The types here
//! carry the per-invocation job state; the loop itself lives in [`poller`].

pub mod poller;

pub use poller::{PollSchedule, StatusSource, poll_until_finished};

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::response::{ApiResponse, is_falsy_text};

/// Kind of entries submitted in a bulk list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BulkListType {
    Email,
    Proxy,
    Phone,
    Url,
}

impl BulkListType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkListType::Email => "email",
            BulkListType::Proxy => "proxy",
            BulkListType::Phone => "phone",
            BulkListType::Url => "url",
        }
    }

    /// Name of the CSV file the server stores the list under.
    pub fn file_name(&self) -> String {
        format!("{}.csv", self.as_str())
    }
}

impl fmt::Display for BulkListType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when parsing an unknown bulk list type name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown bulk list type '{0}' (expected email, proxy, phone or url)")]
pub struct UnknownListType(pub String);

impl FromStr for BulkListType {
    type Err = UnknownListType;

    /// Accepts the wire names `email`, `proxy`, `phone` and `url`,
    /// case-insensitively.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(BulkListType::Email),
            "proxy" => Ok(BulkListType::Proxy),
            "phone" => Ok(BulkListType::Phone),
            "url" => Ok(BulkListType::Url),
            other => Err(UnknownListType(other.to_string())),
        }
    }
}

/// Entry accepted in a bulk list. Missing or falsy entries are skipped.
pub trait BulkItem {
    fn entry(&self) -> Option<&str>;
}

impl BulkItem for str {
    fn entry(&self) -> Option<&str> {
        Some(self)
    }
}

impl BulkItem for String {
    fn entry(&self) -> Option<&str> {
        Some(self.as_str())
    }
}

impl<T: BulkItem + ?Sized> BulkItem for &T {
    fn entry(&self) -> Option<&str> {
        (**self).entry()
    }
}

impl<T: BulkItem> BulkItem for Option<T> {
    fn entry(&self) -> Option<&str> {
        self.as_ref().and_then(BulkItem::entry)
    }
}

/// Drops falsy entries (`None`, `""`, `"0"`) and wraps each survivor as a
/// single-column CSV row. Other entries are forwarded verbatim.
pub fn csv_rows<I>(list: I) -> Vec<Vec<String>>
where
    I: IntoIterator,
    I::Item: BulkItem,
{
    list.into_iter()
        .filter_map(|item| {
            item.entry()
                .filter(|entry| !is_falsy_text(entry))
                .map(|entry| vec![entry.to_string()])
        })
        .collect()
}

/// JSON body posted to `csv/upload`.
#[derive(Debug, Clone, Serialize)]
pub struct BulkUploadRequest<'a> {
    #[serde(rename = "type")]
    pub list_type: &'static str,
    pub file_name: String,
    pub key: &'a str,
    pub input: Vec<Vec<String>>,
}

impl<'a> BulkUploadRequest<'a> {
    pub fn new(list_type: BulkListType, key: &'a str, input: Vec<Vec<String>>) -> Self {
        Self {
            list_type: list_type.as_str(),
            file_name: list_type.file_name(),
            key,
            input,
        }
    }
}

/// State of one bulk validation run.
///
/// Each submission creates a fresh job, so the retry counter never carries
/// over between runs.
#[derive(Debug, Clone)]
pub struct BulkJob {
    list_type: BulkListType,
    status_url: String,
    retries: u32,
    last_status: Option<ApiResponse>,
}

impl BulkJob {
    pub fn new(list_type: BulkListType, status_url: impl Into<String>) -> Self {
        Self {
            list_type,
            status_url: status_url.into(),
            retries: 0,
            last_status: None,
        }
    }

    pub fn list_type(&self) -> BulkListType {
        self.list_type
    }

    pub fn status_url(&self) -> &str {
        &self.status_url
    }

    /// Retries performed so far (the first status check is not a retry).
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn last_status(&self) -> Option<&ApiResponse> {
        self.last_status.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.last_status.as_ref().is_some_and(ApiResponse::is_finished)
    }

    /// `downloads.all` of the last status, once the job has finished.
    pub fn download_url(&self) -> Option<&str> {
        self.last_status
            .as_ref()
            .filter(|status| status.is_finished())
            .and_then(ApiResponse::download_url)
    }

    pub(crate) fn record_status(&mut self, status: ApiResponse) {
        self.last_status = Some(status);
    }

    pub(crate) fn record_retry(&mut self) {
        self.retries += 1;
    }
}

/// Final result of a bulk validation call.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOutcome {
    /// Parsed contents of the job's result file.
    Finished(Value),
    /// Retry ceiling reached before completion; carries the last status seen.
    Pending(ApiResponse),
}

impl BulkOutcome {
    pub fn is_finished(&self) -> bool {
        matches!(self, BulkOutcome::Finished(_))
    }

    pub fn results(&self) -> Option<&Value> {
        match self {
            BulkOutcome::Finished(value) => Some(value),
            BulkOutcome::Pending(_) => None,
        }
    }

    pub fn into_results(self) -> Option<Value> {
        match self {
            BulkOutcome::Finished(value) => Some(value),
            BulkOutcome::Pending(_) => None,
        }
    }
}
