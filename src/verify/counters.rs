//! Run-wide counters and the outcome bitmask derived from them

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Result of one path that was verified to completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathOutcome {
    pub corrupted: bool,
    pub trusted: bool,
}

/// Counters shared by every task of a run
#[derive(Debug, Default)]
pub struct AggregateCounters {
    completed: AtomicUsize,
    corrupted: AtomicUsize,
    untrusted: AtomicUsize,
    failed: AtomicUsize,
}

impl AggregateCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a completed path into the counters
    pub fn record(&self, outcome: PathOutcome) {
        if outcome.corrupted {
            self.corrupted.fetch_add(1, Ordering::Relaxed);
        }
        if !outcome.trusted {
            self.untrusted.fetch_add(1, Ordering::Relaxed);
        }
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            completed: self.completed.load(Ordering::Relaxed),
            corrupted: self.corrupted.load(Ordering::Relaxed),
            untrusted: self.untrusted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub completed: usize,
    pub corrupted: usize,
    pub untrusted: usize,
    pub failed: usize,
}

impl CounterSnapshot {
    /// Paths that finished, either way
    pub fn finished(&self) -> usize {
        self.completed + self.failed
    }

    /// Status shown while the run is in progress
    pub fn status_line(&self, total: usize) -> String {
        format!("[{}/{} checked{}]", self.completed, total, self.problem_clauses())
    }

    /// Summary printed once the run is over
    pub fn summary_line(&self, total: usize) -> String {
        format!("checked {} paths{}", total, self.problem_clauses())
    }

    fn problem_clauses(&self) -> String {
        let mut s = String::new();
        if self.corrupted > 0 {
            s.push_str(&format!(", {} corrupted", self.corrupted));
        }
        if self.untrusted > 0 {
            s.push_str(&format!(", {} untrusted", self.untrusted));
        }
        if self.failed > 0 {
            s.push_str(&format!(", {} failed", self.failed));
        }
        s
    }

    pub fn outcome(&self) -> VerifyOutcome {
        let mut bits = 0;
        if self.corrupted > 0 {
            bits |= VerifyOutcome::CORRUPTED;
        }
        if self.untrusted > 0 {
            bits |= VerifyOutcome::UNTRUSTED;
        }
        if self.failed > 0 {
            bits |= VerifyOutcome::FAILED;
        }
        VerifyOutcome(bits)
    }
}

/// Terminal status of a run: 0 on success, otherwise a mix of the bits below
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VerifyOutcome(u8);

impl VerifyOutcome {
    pub const CORRUPTED: u8 = 1;
    pub const UNTRUSTED: u8 = 2;
    pub const FAILED: u8 = 4;

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn is_success(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, bit: u8) -> bool {
        self.0 & bit != 0
    }

    /// Process exit code, always within 0-7
    pub fn exit_code(&self) -> i32 {
        i32::from(self.0)
    }
}

impl fmt::Display for VerifyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
