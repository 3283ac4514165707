// src/checker/http.rs
// =============================================================================
// This module checks if URLs are alive by making HTTP requests.
//
// Key functionality:
// - Validates the URL first; invalid input never reaches the network
// - Makes one GET request (redirects followed up to a fixed limit)
// - Measures how long the request took
// - Classifies the result: status < 400 is working, anything else is broken
// - Records every check in the observation store, success or not
// - Runs batches concurrently with a bounded number of requests in flight,
//   returning results in the same order the URLs were given
// =============================================================================

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt}; // StreamExt gives us .buffered()
use log::{debug, info};
use reqwest::{Client, StatusCode};

use super::validate::is_valid_url;
use crate::config::{
    user_agent, FAILED_REQUEST, HTTP_TIMEOUT, MAX_CONCURRENT_CHECKS, MAX_REDIRECTS,
};
use crate::error::StorageError;
use crate::model::{BatchRecord, CheckOutcome, Observation, RequestMetadata};
use crate::store::ObservationStore;

// Checks URLs and records what it found
//
// One client is reused for every request (connection pooling). The store is
// handed in by whoever owns the process, so tests can pass their own.
pub struct Checker<S> {
    client: Client,
    store: Arc<S>,
    max_concurrency: usize,
}

impl<S: ObservationStore> Checker<S> {
    pub fn new(store: Arc<S>) -> Result<Self, reqwest::Error> {
        Ok(Checker {
            client: build_client(HTTP_TIMEOUT)?,
            store,
            max_concurrency: MAX_CONCURRENT_CHECKS,
        })
    }

    // Checks a single URL and appends exactly one observation
    //
    // A broken URL is a normal outcome. The only error is the store failing
    // to record the check.
    pub async fn check(
        &self,
        url: &str,
        metadata: Option<&RequestMetadata>,
    ) -> Result<CheckOutcome, StorageError> {
        let outcome = self.probe(url).await;
        debug!(
            "Checked {}: broken={} status={:?} time={:?}ms",
            outcome.url, outcome.is_broken, outcome.status_code, outcome.response_time_ms
        );

        let observation = Observation::record(outcome.clone(), metadata.cloned());
        self.store.append_observation(observation).await?;
        Ok(outcome)
    }

    // Checks every URL and appends one batch record
    //
    // Results line up with `urls` index for index. Every check runs to its
    // own completion even if another one fails to be stored; the first
    // storage error (in input order) is then returned and no batch record is
    // written.
    pub async fn check_all(
        &self,
        urls: &[String],
        metadata: Option<&RequestMetadata>,
    ) -> Result<Vec<CheckOutcome>, StorageError> {
        // .buffered(n) runs up to n checks at once but yields them in input
        // order, unlike .buffer_unordered(n)
        let results: Vec<Result<CheckOutcome, StorageError>> =
            stream::iter(urls.iter().map(|url| self.check(url, metadata)))
                .buffered(self.max_concurrency)
                .collect()
                .await;

        let outcomes = results.into_iter().collect::<Result<Vec<_>, _>>()?;

        let record = BatchRecord::new(urls.to_vec(), &outcomes, metadata.cloned());
        let summary = record.summary;
        self.store.append_batch(record).await?;

        info!(
            "Batch of {} checked: {} working, {} broken",
            summary.total, summary.working, summary.broken
        );
        Ok(outcomes)
    }

    // Does the actual HTTP request and categorizes the result.
    // Never touches the store.
    async fn probe(&self, url: &str) -> CheckOutcome {
        if !is_valid_url(url) {
            return CheckOutcome::invalid(url);
        }

        let started = Instant::now();
        match self.client.get(url.trim()).send().await {
            Ok(response) => analyze_response(url, response.status(), elapsed_ms(started)),
            Err(e) => categorize_error(url, &e, elapsed_ms(started)),
        }
    }
}

#[cfg(test)]
impl<S: ObservationStore> Checker<S> {
    fn with_timeout(store: Arc<S>, timeout: Duration) -> Self {
        Checker {
            client: build_client(timeout).expect("client builds"),
            store,
            max_concurrency: MAX_CONCURRENT_CHECKS,
        }
    }

    fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }
}

fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .user_agent(user_agent())
        .build()
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

// Redirects have already been followed, so this is the final status.
//
// HTTP status codes:
// - 100-399: working (success, or a redirect we were not allowed to follow)
// - 400-599: broken
fn analyze_response(url: &str, status: StatusCode, response_time_ms: u64) -> CheckOutcome {
    let code = status.as_u16();

    if code < 400 {
        CheckOutcome::working(url, code, response_time_ms)
    } else {
        CheckOutcome::broken(
            url,
            Some(code),
            format!("Request failed with status code {}", code),
            response_time_ms,
        )
    }
}

// Categorizes transport-level errors from reqwest
//
// reqwest errors can happen for many reasons:
// - Network timeout
// - DNS resolution failure
// - SSL certificate issues
// - Too many redirects
fn categorize_error(url: &str, error: &reqwest::Error, response_time_ms: u64) -> CheckOutcome {
    // The interesting part ("dns error", "certificate") is deep in the source
    // chain. The top-level message is skipped because it embeds the URL.
    let chain = error
        .source()
        .map(error_chain)
        .unwrap_or_default()
        .to_lowercase();

    let message = if error.is_timeout() {
        "Request timed out".to_string()
    } else if error.is_redirect() {
        "Too many redirects".to_string()
    } else if chain.contains("certificate") || chain.contains("tls") || chain.contains("ssl") {
        "SSL certificate error".to_string()
    } else if error.is_connect() {
        if chain.contains("dns") {
            "Could not resolve hostname".to_string()
        } else {
            "Connection failed".to_string()
        }
    } else {
        let text = error.to_string();
        if text.is_empty() {
            FAILED_REQUEST.to_string()
        } else {
            text
        }
    };

    CheckOutcome::broken(
        url,
        error.status().map(|s| s.as_u16()),
        message,
        response_time_ms,
    )
}

fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why .buffered() and not .buffer_unordered()?
//    - Both run up to N futures at once
//    - buffer_unordered yields results as they finish (any order)
//    - buffered yields them in the order the futures were created
//    - Batch results must line up with the input URLs, so we need buffered
//
// 2. Why is a broken URL not an Err?
//    - "The URL is broken" is a successful answer to "is this URL broken?"
//    - Err is reserved for the system itself failing (here: the store)
//
// 3. Why measure time even on failure?
//    - A timeout after 10s and a refused connection after 2ms are both
//      broken, but the latency tells them apart in the statistics
// -----------------------------------------------------------------------------
