//! Bounded status polling for bulk jobs.
//!
//! Polling uses a fixed interval and a retry ceiling. The counter lives on
//! the [`BulkJob`] passed in, so two jobs never share progress.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::sleep;

use crate::client::IpqsResult;
use crate::config::BulkConfig;
use crate::events::{EventDispatcher, IpqsEvent, PollRetryEvent};
use crate::response::ApiResponse;

use super::BulkJob;

/// Anything able to perform a single status check for a bulk job.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn check_status(&self, status_url: &str) -> IpqsResult<ApiResponse>;
}

/// Fixed-interval schedule with a retry ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    interval: Duration,
    max_retries: u32,
}

impl PollSchedule {
    pub fn new(interval: Duration, max_retries: u32) -> Self {
        Self {
            interval,
            max_retries,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Whether a job that has already retried `retries` times may poll again.
    pub fn allows_retry(&self, retries: u32) -> bool {
        retries < self.max_retries
    }
}

impl Default for PollSchedule {
    fn default() -> Self {
        BulkConfig::default().into()
    }
}

impl From<BulkConfig> for PollSchedule {
    fn from(config: BulkConfig) -> Self {
        Self::new(config.poll_interval, config.max_retries)
    }
}

/// Polls `job` until it reports `FINISHED` or the schedule runs out of retries.
///
/// Reaching the ceiling is not an error: the last status seen is returned and
/// also kept on the job. Status check failures abort immediately.
pub async fn poll_until_finished<S>(
    source: &S,
    job: &mut BulkJob,
    schedule: PollSchedule,
    events: &EventDispatcher,
) -> IpqsResult<ApiResponse>
where
    S: StatusSource + ?Sized,
{
    loop {
        let status = source.check_status(job.status_url()).await?;
        job.record_status(status.clone());

        if status.is_finished() || !schedule.allows_retry(job.retries()) {
            return Ok(status);
        }

        job.record_retry();
        events.dispatch(IpqsEvent::PollRetry(PollRetryEvent {
            status_url: job.status_url().to_string(),
            attempt: job.retries(),
            max_retries: schedule.max_retries(),
            last_status: status.status().map(str::to_string),
            scheduled_after: schedule.interval(),
            timestamp: Utc::now(),
        }));

        if schedule.interval() > Duration::from_millis(0) {
            sleep(schedule.interval()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bulk::BulkListType;
    use crate::client::IpqsError;
    use serde_json::json;
    use std::sync::Mutex;

    struct ScriptedStatus {
        statuses: Mutex<Vec<&'static str>>,
        calls: Mutex<usize>,
    }

    impl ScriptedStatus {
        fn new(statuses: Vec<&'static str>) -> Self {
            Self {
                statuses: Mutex::new(statuses.into_iter().rev().collect()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl StatusSource for ScriptedStatus {
        async fn check_status(&self, _status_url: &str) -> IpqsResult<ApiResponse> {
            *self.calls.lock().unwrap() += 1;
            let mut statuses = self.statuses.lock().unwrap();
            let status = if statuses.len() > 1 {
                statuses.pop().unwrap()
            } else {
                statuses[0]
            };
            if status == "ERROR" {
                return Err(IpqsError::Api("status lookup failed".into()));
            }
            Ok(serde_json::from_value(json!({"success": true, "status": status})).unwrap())
        }
    }

    fn schedule() -> PollSchedule {
        PollSchedule::new(Duration::ZERO, 6)
    }

    #[tokio::test]
    async fn stops_after_six_retries_when_never_finished() {
        let source = ScriptedStatus::new(vec!["PENDING"]);
        let mut job = BulkJob::new(BulkListType::Email, "https://example.com/status");

        let last = poll_until_finished(&source, &mut job, schedule(), &EventDispatcher::new())
            .await
            .unwrap();

        assert_eq!(job.retries(), 6);
        assert_eq!(source.calls(), 7);
        assert_eq!(last.status(), Some("PENDING"));
        assert!(!job.is_finished());
    }

    #[tokio::test]
    async fn returns_immediately_when_finished() {
        let source = ScriptedStatus::new(vec!["FINISHED"]);
        let mut job = BulkJob::new(BulkListType::Email, "https://example.com/status");

        let last = poll_until_finished(&source, &mut job, schedule(), &EventDispatcher::new())
            .await
            .unwrap();

        assert_eq!(job.retries(), 0);
        assert_eq!(source.calls(), 1);
        assert!(last.is_finished());
    }

    #[tokio::test]
    async fn finishes_part_way_through() {
        let source = ScriptedStatus::new(vec!["PENDING", "RUNNING", "FINISHED"]);
        let mut job = BulkJob::new(BulkListType::Proxy, "https://example.com/status");

        poll_until_finished(&source, &mut job, schedule(), &EventDispatcher::new())
            .await
            .unwrap();

        assert_eq!(job.retries(), 2);
        assert!(job.is_finished());
    }

    #[tokio::test]
    async fn status_errors_are_not_retried() {
        let source = ScriptedStatus::new(vec!["PENDING", "ERROR"]);
        let mut job = BulkJob::new(BulkListType::Url, "https://example.com/status");

        let result =
            poll_until_finished(&source, &mut job, schedule(), &EventDispatcher::new()).await;

        assert!(matches!(result, Err(IpqsError::Api(_))));
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn zero_ceiling_checks_once() {
        let source = ScriptedStatus::new(vec!["PENDING"]);
        let mut job = BulkJob::new(BulkListType::Email, "https://example.com/status");

        poll_until_finished(
            &source,
            &mut job,
            PollSchedule::new(Duration::ZERO, 0),
            &EventDispatcher::new(),
        )
        .await
        .unwrap();

        assert_eq!(source.calls(), 1);
        assert_eq!(job.retries(), 0);
    }
}
