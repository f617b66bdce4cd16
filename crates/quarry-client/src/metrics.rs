//! Client metrics.
//!
//! Counters for poll attempts and transient-auth retries. They complement the
//! tracing events emitted at the same points; without an installed recorder
//! they are no-ops.

use metrics::{counter, describe_counter};

/// Fetches issued by the consistency poller.
pub const POLL_ATTEMPTS: &str = "quarry_poll_attempts_total";

/// Polls that ran out of budget before the expectation held.
pub const POLL_EXHAUSTED: &str = "quarry_poll_exhausted_total";

/// Creates retried after a transient authorization failure.
pub const TRANSIENT_AUTH_RETRIES: &str = "quarry_transient_auth_retries_total";

/// Registers metric descriptions.
///
/// Call once after installing a metrics recorder.
pub fn register_metrics() {
    describe_counter!(POLL_ATTEMPTS, "Total fetches issued by the consistency poller");
    describe_counter!(
        POLL_EXHAUSTED,
        "Total polls that exhausted their retry budget unsatisfied"
    );
    describe_counter!(
        TRANSIENT_AUTH_RETRIES,
        "Total create retries after a transient authorization failure"
    );
}

/// Records one poll fetch.
pub fn record_poll_attempt(kind: &'static str) {
    counter!(POLL_ATTEMPTS, "kind" => kind).increment(1);
}

/// Records a poll that ended unsatisfied.
pub fn record_poll_exhausted(kind: &'static str) {
    counter!(POLL_EXHAUSTED, "kind" => kind).increment(1);
}

/// Records one transient-auth retry.
pub fn record_transient_auth_retry(code: &str) {
    counter!(TRANSIENT_AUTH_RETRIES, "code" => code.to_string()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_a_recorder_is_a_no_op() {
        register_metrics();
        record_poll_attempt("search");
        record_poll_exhausted("audit");
        record_transient_auth_retry("ATLAS-403-00-001");
    }
}
