//! JSON response wrapper shared by every IPQS endpoint.

use std::ops::Deref;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status string reported by a completed bulk job.
pub const STATUS_FINISHED: &str = "FINISHED";

/// Fallback message used when IPQS reports a failure without one.
pub const UNKNOWN_API_ERROR: &str = "Unknown IPQS API error.";

/// Parsed JSON object returned by the IPQS API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiResponse {
    data: Map<String, Value>,
}

impl ApiResponse {
    pub fn new(data: Map<String, Value>) -> Self {
        Self { data }
    }

    /// Parses a response body. Anything other than a JSON object is rejected.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Whether the `success` flag is present and truthy.
    pub fn success(&self) -> bool {
        self.data.get("success").is_some_and(is_truthy)
    }

    /// API-supplied failure message, if any.
    pub fn message(&self) -> Option<&str> {
        self.data.get("message").and_then(Value::as_str)
    }

    /// Message to surface when the response is a failure.
    pub fn failure_message(&self) -> String {
        self.message()
            .filter(|message| !message.is_empty())
            .unwrap_or(UNKNOWN_API_ERROR)
            .to_string()
    }

    /// Bulk job status (`FINISHED` or anything pending).
    pub fn status(&self) -> Option<&str> {
        self.data.get("status").and_then(Value::as_str)
    }

    pub fn is_finished(&self) -> bool {
        self.status() == Some(STATUS_FINISHED)
    }

    /// Status URL returned by the bulk upload endpoint.
    pub fn status_url(&self) -> Option<&str> {
        self.data
            .get("status_url")
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
    }

    /// `downloads.all` URL of a finished bulk job.
    pub fn download_url(&self) -> Option<&str> {
        self.data
            .get("downloads")
            .and_then(|downloads| downloads.get("all"))
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
    }

    /// Non-empty `errors` entries rendered as strings.
    pub fn errors(&self) -> Vec<String> {
        match self.data.get("errors") {
            Some(value) if !is_truthy(value) => Vec::new(),
            Some(Value::Array(items)) => items.iter().map(render_error).collect(),
            Some(Value::Object(items)) => items.values().map(render_error).collect(),
            Some(other) => vec![render_error(other)],
            None => Vec::new(),
        }
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.data
    }
}

impl Deref for ApiResponse {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl From<ApiResponse> for Value {
    fn from(response: ApiResponse) -> Self {
        Value::Object(response.data)
    }
}

fn render_error(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Empty strings and `"0"` count as false, for `success` flags and bulk
/// list entries alike.
pub(crate) fn is_falsy_text(text: &str) -> bool {
    text.is_empty() || text == "0"
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !is_falsy_text(text),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(value: Value) -> ApiResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn success_requires_truthy_flag() {
        assert!(response(json!({"success": true})).success());
        assert!(response(json!({"success": 1})).success());
        assert!(!response(json!({"success": false})).success());
        assert!(!response(json!({"success": "0"})).success());
        assert!(!response(json!({"proxy": false})).success());
    }

    #[test]
    fn failure_message_falls_back_to_generic_text() {
        let with_message = response(json!({"success": false, "message": "Invalid key."}));
        let without = response(json!({"success": false}));

        assert_eq!(with_message.failure_message(), "Invalid key.");
        assert_eq!(without.failure_message(), UNKNOWN_API_ERROR);
    }

    #[test]
    fn reads_bulk_fields() {
        let finished = response(json!({
            "success": true,
            "status": "FINISHED",
            "downloads": {"all": "https://files.example/all.json"}
        }));

        assert!(finished.is_finished());
        assert_eq!(finished.download_url(), Some("https://files.example/all.json"));
        assert!(!response(json!({"status": "PENDING"})).is_finished());
        assert!(!response(json!({})).is_finished());
    }

    #[test]
    fn collects_errors_from_list() {
        let failed = response(json!({"errors": ["bad type", "empty input"]}));
        assert_eq!(failed.errors(), vec!["bad type", "empty input"]);
        assert!(response(json!({"errors": []})).errors().is_empty());
        assert!(response(json!({"errors": ""})).errors().is_empty());
        assert!(response(json!({"errors": 0})).errors().is_empty());
        assert!(response(json!({"errors": null})).errors().is_empty());
        assert_eq!(
            response(json!({"errors": "quota exceeded"})).errors(),
            vec!["quota exceeded"]
        );
    }

    #[test]
    fn rejects_non_object_bodies() {
        assert!(ApiResponse::from_slice(b"[1,2,3]").is_err());
        assert!(ApiResponse::from_slice(b"<html>").is_err());
    }
}
