//! Progress and diagnostic reporting seam.
//!
//! Verification tasks never print directly; every status update and every
//! per-path diagnostic goes through a [`ProgressSink`] shared by the run.

use std::fmt;

use super::counters::CounterSnapshot;
use crate::types::{Hash, StorePath};

/// Something worth telling the user about while a run is in progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    Modified {
        path: StorePath,
        expected: Hash,
        actual: Hash,
    },
    Untrusted {
        path: StorePath,
    },
    /// A substituter could not be queried; the path's trust check continued
    SubstituterFailed {
        substituter: String,
        kind: &'static str,
        message: String,
    },
    /// Verification of a path could not be carried out
    Failed {
        path: StorePath,
        message: String,
    },
}

impl Diagnostic {
    /// Whether this is an error, as opposed to a verification finding
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Diagnostic::SubstituterFailed { .. } | Diagnostic::Failed { .. }
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Modified {
                path,
                expected,
                actual,
            } => write!(
                f,
                "path '{}' was modified! expected hash '{}', got '{}'",
                path, expected, actual
            ),
            Diagnostic::Untrusted { path } => write!(f, "path '{}' is untrusted", path),
            Diagnostic::SubstituterFailed {
                substituter,
                message,
                ..
            } => write!(f, "error: substituter '{}': {}", substituter, message),
            Diagnostic::Failed { path, message } => {
                write!(f, "error: checking path '{}': {}", path, message)
            }
        }
    }
}

pub trait ProgressSink: Send + Sync {
    /// Publish the running status
    fn update_status(&self, snapshot: &CounterSnapshot, total: usize);

    /// Report a diagnostic at the moment it is detected
    fn report(&self, diagnostic: &Diagnostic);

    /// Publish the final summary once every task has finished
    fn finish(&self, snapshot: &CounterSnapshot, total: usize);
}

/// Sends everything to the log instead of the terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn update_status(&self, snapshot: &CounterSnapshot, total: usize) {
        tracing::trace!(status = %snapshot.status_line(total));
    }

    fn report(&self, diagnostic: &Diagnostic) {
        if diagnostic.is_error() {
            tracing::error!("{}", diagnostic);
        } else {
            tracing::warn!("{}", diagnostic);
        }
    }

    fn finish(&self, snapshot: &CounterSnapshot, total: usize) {
        tracing::info!("{}", snapshot.summary_line(total));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HashAlgorithm;

    const PATH: &str = "/nix/store/0c6kzph7l0dcbfmjap64f0czdafn3b7x-hello";

    #[test]
    fn test_diagnostic_messages() {
        let path = StorePath::parse(PATH).unwrap();
        let expected = Hash::compute(HashAlgorithm::Sha256, b"a");
        let actual = Hash::compute(HashAlgorithm::Sha256, b"b");

        let modified = Diagnostic::Modified {
            path: path.clone(),
            expected: expected.clone(),
            actual: actual.clone(),
        };
        assert_eq!(
            modified.to_string(),
            format!(
                "path '{}' was modified! expected hash '{}', got '{}'",
                PATH, expected, actual
            )
        );
        assert!(!modified.is_error());

        let untrusted = Diagnostic::Untrusted { path: path.clone() };
        assert_eq!(untrusted.to_string(), format!("path '{}' is untrusted", PATH));

        let failed = Diagnostic::Failed {
            path,
            message: "boom".to_string(),
        };
        assert!(failed.to_string().starts_with("error: "));
        assert!(failed.is_error());
    }
}
