// src/monitor.rs
// =============================================================================
// The API the command line (or any other front end) talks to.
//
// LinkMonitor owns the store and the checker and adds the input checks
// that belong at the boundary:
// - a batch holds 1..=10 URLs
// - a recent-checks limit is 1..=1000
// - a date range must not end before it starts
//
// Bad input is a MonitorError::Validation and never touches the network or
// the store.
// =============================================================================

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::checker::Checker;
use crate::config::{Settings, MAX_RECENT_LIMIT, MAX_URLS_PER_REQUEST};
use crate::error::MonitorError;
use crate::model::{BatchResult, BatchSummary, CheckOutcome, Observation, RequestMetadata, Statistics};
use crate::store::ObservationStore;
use crate::sweeper::RetentionSweeper;

pub struct LinkMonitor<S> {
    store: Arc<S>,
    checker: Checker<S>,
    sweeper: Option<RetentionSweeper>,
}

impl<S: ObservationStore + 'static> LinkMonitor<S> {
    pub fn new(store: Arc<S>) -> Result<Self, MonitorError> {
        let checker = Checker::new(store.clone())?;
        Ok(LinkMonitor {
            store,
            checker,
            sweeper: None,
        })
    }

    pub async fn check_single(
        &self,
        url: &str,
        metadata: Option<&RequestMetadata>,
    ) -> Result<CheckOutcome, MonitorError> {
        Ok(self.checker.check(url, metadata).await?)
    }

    pub async fn check_batch(
        &self,
        urls: &[String],
        metadata: Option<&RequestMetadata>,
    ) -> Result<BatchResult, MonitorError> {
        if urls.is_empty() {
            return Err(MonitorError::Validation(
                "At least one URL is required".to_string(),
            ));
        }
        if urls.len() > MAX_URLS_PER_REQUEST {
            return Err(MonitorError::Validation(format!(
                "Maximum {} URLs allowed per request",
                MAX_URLS_PER_REQUEST
            )));
        }

        let results = self.checker.check_all(urls, metadata).await?;
        let summary = BatchSummary::tally(&results);
        Ok(BatchResult { results, summary })
    }

    pub async fn statistics(&self) -> Result<Statistics, MonitorError> {
        Ok(self.store.statistics().await?)
    }

    pub async fn recent(&self, limit: usize) -> Result<Vec<Observation>, MonitorError> {
        if limit == 0 || limit > MAX_RECENT_LIMIT {
            return Err(MonitorError::Validation(format!(
                "Limit must be between 1 and {}",
                MAX_RECENT_LIMIT
            )));
        }
        Ok(self.store.recent(limit).await?)
    }

    pub async fn by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Observation>, MonitorError> {
        if start > end {
            return Err(MonitorError::Validation(format!(
                "Start date {} is after end date {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(self.store.by_date_range(start, end).await?)
    }

    // Starts the background sweeper. Starting twice keeps the first one.
    pub fn start_retention_sweeper(&mut self, settings: &Settings) {
        if self.sweeper.is_some() {
            return;
        }
        self.sweeper = Some(RetentionSweeper::start(
            self.store.clone(),
            settings.sweep_interval,
            settings.retention,
        ));
    }

    pub async fn stop_retention_sweeper(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.stop().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JsonStore;
    use chrono::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn monitor() -> (LinkMonitor<JsonStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(JsonStore::open(dir.path()).await.unwrap());
        (LinkMonitor::new(store).unwrap(), dir)
    }

    #[tokio::test]
    async fn test_batch_size_bounds() {
        let (monitor, _dir) = monitor().await;

        let err = monitor.check_batch(&[], None).await.unwrap_err();
        assert!(err.is_validation());

        let too_many: Vec<String> = (0..=MAX_URLS_PER_REQUEST)
            .map(|i| format!("bad-{}", i))
            .collect();
        let err = monitor.check_batch(&too_many, None).await.unwrap_err();
        assert!(err.is_validation());

        // Nothing was recorded for rejected batches
        assert_eq!(monitor.statistics().await.unwrap().total_checks, 0);
    }

    #[tokio::test]
    async fn test_recent_limit_bounds() {
        let (monitor, _dir) = monitor().await;

        assert!(monitor.recent(0).await.unwrap_err().is_validation());
        assert!(monitor
            .recent(MAX_RECENT_LIMIT + 1)
            .await
            .unwrap_err()
            .is_validation());
        assert!(monitor.recent(MAX_RECENT_LIMIT).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reversed_date_range_is_rejected() {
        let (monitor, _dir) = monitor().await;
        let now = Utc::now();

        let err = monitor
            .by_date_range(now, now - Duration::hours(1))
            .await
            .unwrap_err();
        assert!(err.is_validation());

        // A zero-width range is fine
        assert!(monitor.by_date_range(now, now).await.is_ok());
    }

    #[tokio::test]
    async fn test_checks_feed_statistics_and_queries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let (monitor, _dir) = monitor().await;
        let metadata = RequestMetadata {
            origin: Some("test".to_string()),
            ..Default::default()
        };
        let started = Utc::now();

        monitor
            .check_single(&format!("{}/", server.uri()), Some(&metadata))
            .await
            .unwrap();
        let batch = monitor
            .check_batch(
                &[
                    format!("{}/", server.uri()),
                    format!("{}/missing", server.uri()),
                    "not-a-url".to_string(),
                ],
                Some(&metadata),
            )
            .await
            .unwrap();

        assert_eq!(batch.summary, BatchSummary { total: 3, broken: 2, working: 1 });

        let stats = monitor.statistics().await.unwrap();
        assert_eq!(stats.total_urls, 4);
        assert_eq!(stats.broken_urls, 2);
        assert_eq!(stats.working_urls, 2);
        assert_eq!(stats.total_checks, 5);
        assert_eq!(stats.checks_this_week, 4);
        assert!(stats.last_check.is_some());

        let recent = monitor.recent(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].timestamp >= recent[1].timestamp);
        assert_eq!(
            recent[0].metadata.as_ref().and_then(|m| m.origin.as_deref()),
            Some("test")
        );

        let in_range = monitor.by_date_range(started, Utc::now()).await.unwrap();
        assert_eq!(in_range.len(), 4);
    }

    #[tokio::test]
    async fn test_sweeper_start_and_stop() {
        let (mut monitor, _dir) = monitor().await;
        let settings = Settings::new(24);

        monitor.start_retention_sweeper(&settings);
        monitor.start_retention_sweeper(&settings);
        monitor.stop_retention_sweeper().await;
        // Stopping twice is a no-op
        monitor.stop_retention_sweeper().await;
    }
}
