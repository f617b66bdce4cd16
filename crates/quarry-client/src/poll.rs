//! Consistency polling over eventually consistent indexes.
//!
//! Search and audit search read an index that trails the authoritative store,
//! so a caller that has just mutated something waits for the index to catch
//! up before asserting on results. [`Poller::poll`] is the one loop behind
//! every such wait: fetch, stop if the predicate holds, otherwise sleep
//! according to the backoff policy and fetch again, never more often than the
//! retry budget allows.
//!
//! Running out of budget is not an error. The last response comes back with
//! `satisfied == false`, and [`PollOutcome::ensure_satisfied`] turns that into
//! an error naming what was observed and what was expected.
//!
//! ```rust,no_run
//! # async fn run(client: &quarry_client::CatalogClient<quarry_client::MemoryCatalog>) -> quarry_core::Result<()> {
//! use quarry_client::poll::SearchExpectation;
//! use quarry_core::search::{Filter, SearchRequest};
//!
//! let request = SearchRequest::new().with_filter(Filter::TypeName("Table".into()));
//! let response = client
//!     .wait_for_search(&request, SearchExpectation::at_least(2))
//!     .await?
//!     .ensure_satisfied()?;
//! assert!(response.approximate_count >= 2);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, warn};

use quarry_core::observability::poll_span;
use quarry_core::{
    AuditSearchResponse, BackoffPolicy, Error, Result, RetryBudget, RetryConfig, SearchResponse,
};

use crate::metrics::{record_poll_attempt, record_poll_exhausted};

/// The last response of a poll and whether the expectation held.
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome<T> {
    /// The last response fetched.
    pub response: T,
    /// Number of fetches made.
    pub attempts: u32,
    /// Whether the predicate held for `response`.
    pub satisfied: bool,
    observed: String,
    expected: String,
}

impl<T> PollOutcome<T> {
    /// What the last response showed, as reported by the expectation.
    #[must_use]
    pub fn observed(&self) -> &str {
        &self.observed
    }

    /// What the expectation required.
    #[must_use]
    pub fn expected(&self) -> &str {
        &self.expected
    }

    /// Returns the response if the expectation held.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] describing the observed and expected
    /// state if the poll overran its retry limit.
    pub fn ensure_satisfied(self) -> Result<T> {
        if self.satisfied {
            Ok(self.response)
        } else {
            Err(Error::Internal {
                message: format!(
                    "overran retry limit ({} attempts): observed {}, expected {}",
                    self.attempts, self.observed, self.expected
                ),
            })
        }
    }
}

/// A predicate over poll responses that can describe itself.
pub trait Expectation<T>: fmt::Display {
    /// Returns true if `response` shows the expected state.
    fn is_met(&self, response: &T) -> bool;

    /// Short description of what `response` shows.
    fn observe(&self, response: &T) -> String;

    /// Count the poll is waiting for; used for span fields.
    fn target(&self) -> u64;
}

/// Expectation over asset search responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchExpectation {
    /// Minimum `approximate_count`.
    pub min_count: u64,
    /// Also require that no match is `ACTIVE` (delete verification).
    pub no_active_matches: bool,
}

impl SearchExpectation {
    /// At least `count` matches.
    #[must_use]
    pub const fn at_least(count: u64) -> Self {
        Self {
            min_count: count,
            no_active_matches: false,
        }
    }

    /// At least `count` matches, none of them active.
    #[must_use]
    pub const fn all_deleted(count: u64) -> Self {
        Self {
            min_count: count,
            no_active_matches: true,
        }
    }

    /// No active asset among the matches.
    #[must_use]
    pub const fn none_active() -> Self {
        Self::all_deleted(0)
    }
}

impl fmt::Display for SearchExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.no_active_matches {
            write!(f, "count >= {} with 0 active", self.min_count)
        } else {
            write!(f, "count >= {}", self.min_count)
        }
    }
}

impl Expectation<SearchResponse> for SearchExpectation {
    fn is_met(&self, response: &SearchResponse) -> bool {
        response.approximate_count >= self.min_count
            && (!self.no_active_matches || response.active_count == 0)
    }

    fn observe(&self, response: &SearchResponse) -> String {
        if self.no_active_matches {
            format!(
                "count {} with {} active",
                response.approximate_count, response.active_count
            )
        } else {
            format!("count {}", response.approximate_count)
        }
    }

    fn target(&self) -> u64 {
        self.min_count
    }
}

/// Expectation over audit search responses: at least this many entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditExpectation(pub u64);

impl fmt::Display for AuditExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "total >= {}", self.0)
    }
}

impl Expectation<AuditSearchResponse> for AuditExpectation {
    fn is_met(&self, response: &AuditSearchResponse) -> bool {
        response.total_count >= self.0
    }

    fn observe(&self, response: &AuditSearchResponse) -> String {
        format!("total {}", response.total_count)
    }

    fn target(&self) -> u64 {
        self.0
    }
}

/// Bounded, cancellable polling loop.
#[derive(Debug, Clone)]
pub struct Poller {
    budget: RetryBudget,
    backoff: BackoffPolicy,
    cancel: CancellationToken,
}

impl Poller {
    /// Creates a poller.
    #[must_use]
    pub fn new(budget: RetryBudget, backoff: BackoffPolicy, cancel: CancellationToken) -> Self {
        Self {
            budget,
            backoff,
            cancel,
        }
    }

    /// Creates a poller from client retry settings.
    #[must_use]
    pub fn from_config(config: &RetryConfig, cancel: CancellationToken) -> Self {
        Self::new(config.budget, config.backoff, cancel)
    }

    /// Retry budget of this poller.
    #[must_use]
    pub fn budget(&self) -> RetryBudget {
        self.budget
    }

    /// Fetches until `expectation` holds or the budget is spent.
    ///
    /// `kind` labels logs and metrics (`search`, `audit`).
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `fetch`, and returns
    /// [`Error::Cancelled`] if the token fires while waiting.
    pub async fn poll<T, E, F, Fut>(
        &self,
        kind: &'static str,
        expectation: &E,
        mut fetch: F,
    ) -> Result<PollOutcome<T>>
    where
        E: Expectation<T> + ?Sized,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let span = poll_span(kind, expectation.target(), self.budget.max_attempts());
        self.run(kind, expectation, &mut fetch).instrument(span).await
    }

    async fn run<T, E, F, Fut>(
        &self,
        kind: &'static str,
        expectation: &E,
        fetch: &mut F,
    ) -> Result<PollOutcome<T>>
    where
        E: Expectation<T> + ?Sized,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.budget.max_attempts();
        let mut attempts = 0;
        loop {
            attempts += 1;
            record_poll_attempt(kind);
            let response = fetch().await?;

            if expectation.is_met(&response) {
                tracing::Span::current().record("attempts", attempts);
                debug!(attempts, "index caught up");
                return Ok(outcome(response, attempts, true, expectation));
            }

            if attempts >= max_attempts {
                tracing::Span::current().record("attempts", attempts);
                let observed = expectation.observe(&response);
                warn!(
                    attempts,
                    observed = %observed,
                    expected = %expectation,
                    "index did not reach expected state within the retry budget"
                );
                record_poll_exhausted(kind);
                return Ok(outcome(response, attempts, false, expectation));
            }

            let delay = self.backoff.delay_for(attempts);
            debug!(
                attempt = attempts,
                observed = %expectation.observe(&response),
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "index behind; retrying"
            );

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(Error::Cancelled { attempts }),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

fn outcome<T, E>(response: T, attempts: u32, satisfied: bool, expectation: &E) -> PollOutcome<T>
where
    E: Expectation<T> + ?Sized,
{
    PollOutcome {
        observed: expectation.observe(&response),
        expected: expectation.to_string(),
        response,
        attempts,
        satisfied,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn poller(attempts: u32) -> Poller {
        Poller::new(
            RetryBudget::new(attempts),
            BackoffPolicy::new(Duration::from_millis(10), Duration::from_millis(40)),
            CancellationToken::new(),
        )
    }

    fn response_with(count: u64) -> SearchResponse {
        SearchResponse {
            approximate_count: count,
            ..SearchResponse::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_the_first_satisfying_fetch() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let outcome = poller(10)
            .poll("search", &SearchExpectation::at_least(2), || {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(response_with(u64::from(call))) }
            })
            .await
            .unwrap();

        assert!(outcome.satisfied);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // two sleeps: 10ms then 20ms
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(30));
        assert!(waited < Duration::from_millis(40));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_exactly_the_budget() {
        let calls = AtomicU32::new(0);
        let outcome = poller(4)
            .poll("search", &SearchExpectation::at_least(1), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(response_with(0)) }
            })
            .await
            .unwrap();

        assert!(!outcome.satisfied);
        assert_eq!(outcome.attempts, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        let err = outcome.ensure_satisfied().unwrap_err().to_string();
        assert!(err.contains("overran retry limit"));
        assert!(err.contains("observed count 0"));
        assert!(err.contains("expected count >= 1"));
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_errors_propagate() {
        let result = poller(5)
            .poll("audit", &AuditExpectation(1), || async {
                Err::<AuditSearchResponse, _>(Error::transport("connection reset"))
            })
            .await;
        assert!(matches!(result, Err(Error::Transport { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_ends_the_wait() {
        let cancel = CancellationToken::new();
        let poller = Poller::new(
            RetryBudget::new(100),
            BackoffPolicy::new(Duration::from_secs(60), Duration::from_secs(60)),
            cancel.clone(),
        );

        let trigger = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancel.cancel();
        });

        let result = poller
            .poll("search", &SearchExpectation::at_least(1), || async {
                Ok(response_with(0))
            })
            .await;
        trigger.await.unwrap();

        assert!(matches!(result, Err(Error::Cancelled { attempts: 1 })));
    }

    #[test]
    fn delete_verification_requires_no_active_matches() {
        let expectation = SearchExpectation::none_active();
        let mut response = SearchResponse {
            approximate_count: 2,
            active_count: 1,
            ..SearchResponse::default()
        };
        assert!(!expectation.is_met(&response));
        assert_eq!(expectation.observe(&response), "count 2 with 1 active");

        response.active_count = 0;
        assert!(expectation.is_met(&response));
    }
}
