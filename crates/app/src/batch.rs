//! Batch Outcomes
//!
//! Batch jobs walk their candidates one at a time. A failing candidate is
//! recorded here and the loop moves on, so a run only fails as a whole when
//! its request is invalid.

use std::error::Error as StdError;

use jiff::{Timestamp, civil::Date, tz::TimeZone};
use serde::Serialize;

/// Success and failure counts of one batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    /// The request was valid and the batch ran.
    pub successful: bool,

    pub succeeded: usize,
    pub failed: usize,

    /// One message per failed candidate.
    pub errors: Vec<String>,
}

impl BatchOutcome {
    #[must_use]
    pub fn new() -> Self {
        Self {
            successful: true,
            succeeded: 0,
            failed: 0,
            errors: Vec::new(),
        }
    }

    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    /// Count a failed candidate and keep its full error chain.
    pub fn record_failure(&mut self, error: &(dyn StdError + 'static)) {
        self.failed += 1;
        self.errors.push(report(error));
    }

    /// Fold another run's counts into this one.
    pub fn absorb(&mut self, other: Self) {
        self.successful &= other.successful;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.errors.extend(other.errors);
    }
}

impl Default for BatchOutcome {
    fn default() -> Self {
        Self::new()
    }
}

/// Render an error followed by its sources.
pub fn report(error: &(dyn StdError + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();

    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    message
}

/// The instant a batch runs at, and the billing day it falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsOf {
    pub now: Timestamp,
    pub today: Date,
}

impl AsOf {
    #[must_use]
    pub fn new(now: Timestamp, today: Date) -> Self {
        Self { now, today }
    }

    /// `now` on the calendar of `time_zone`.
    #[must_use]
    pub fn in_zone(now: Timestamp, time_zone: &TimeZone) -> Self {
        Self::new(now, now.to_zoned(time_zone.clone()).date())
    }
}

#[cfg(test)]
mod tests {
    use thiserror::Error;

    use super::*;

    #[derive(Debug, Error)]
    #[error("outer")]
    struct Outer(#[source] Inner);

    #[derive(Debug, Error)]
    #[error("inner")]
    struct Inner;

    #[test]
    fn failures_keep_the_error_chain() {
        let mut outcome = BatchOutcome::new();

        outcome.record_success();
        outcome.record_failure(&Outer(Inner));

        assert!(outcome.successful);
        assert_eq!(outcome.succeeded, 1);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.errors, vec!["outer: inner".to_string()]);
    }

    #[test]
    fn absorbing_adds_counts() {
        let mut total = BatchOutcome::new();
        let mut other = BatchOutcome::new();

        other.record_success();
        other.record_failure(&Inner);

        total.absorb(other.clone());
        total.absorb(other);

        assert_eq!((total.succeeded, total.failed, total.errors.len()), (2, 2, 2));
    }

    #[test]
    fn billing_day_follows_the_time_zone() -> testresult::TestResult {
        let now: Timestamp = "2024-03-31T20:00:00Z".parse()?;

        let tokyo = AsOf::in_zone(now, &TimeZone::fixed(jiff::tz::offset(9)));
        let utc = AsOf::in_zone(now, &TimeZone::UTC);

        assert_eq!(tokyo.today, jiff::civil::date(2024, 4, 1));
        assert_eq!(utc.today, jiff::civil::date(2024, 3, 31));

        Ok(())
    }
}
