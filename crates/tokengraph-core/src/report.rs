//! Completeness reports for best-effort fetch phases.
//!
//! A fetch phase never fails as a whole because one unit failed. Instead it
//! returns what it got together with a [`FetchReport`] listing the units that
//! were lost, so callers can decide whether a partial result is acceptable.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A unit of work that failed and contributed nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedUnit<K> {
    pub unit: K,
    pub reason: String,
}

/// Success/failure tally of one fetch phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchReport<K> {
    /// Phase name for logs (`"logs"`, `"blocks"`, `"tokens"`).
    pub phase: String,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: Vec<FailedUnit<K>>,
}

impl<K> FetchReport<K> {
    pub fn new(phase: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            attempted: 0,
            succeeded: 0,
            failed: Vec::new(),
        }
    }

    pub fn record_success(&mut self) {
        self.attempted += 1;
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, unit: K, reason: impl fmt::Display) {
        self.attempted += 1;
        self.failed.push(FailedUnit {
            unit,
            reason: reason.to_string(),
        });
    }

    /// Returns `true` if no unit failed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    /// Failed units, in the order they were recorded.
    pub fn failed_units(&self) -> impl Iterator<Item = &K> {
        self.failed.iter().map(|f| &f.unit)
    }
}

impl<K> fmt::Display for FetchReport<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}/{} succeeded, {} failed",
            self.phase,
            self.succeeded,
            self.attempted,
            self.failed.len()
        )
    }
}

/// A best-effort result plus its completeness report.
#[derive(Debug, Clone)]
pub struct FetchOutcome<T, K> {
    pub value: T,
    pub report: FetchReport<K>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tallies() {
        let mut r: FetchReport<u64> = FetchReport::new("blocks");
        r.record_success();
        r.record_failure(7, "timeout");
        r.record_success();
        assert_eq!(r.attempted, 3);
        assert_eq!(r.succeeded, 2);
        assert!(!r.is_complete());
        assert_eq!(r.failed_units().copied().collect::<Vec<_>>(), vec![7]);
        assert_eq!(r.to_string(), "blocks: 2/3 succeeded, 1 failed");
    }
}
