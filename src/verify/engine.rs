//! Parallel verification runs

use serde::Serialize;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::content::{verify_contents, ContentCheck};
use super::counters::{AggregateCounters, CounterSnapshot, PathOutcome, VerifyOutcome};
use super::progress::{Diagnostic, ProgressSink};
use super::trust::TrustVerifier;
use super::VerificationConfig;
use crate::crypto::SignatureChecker;
use crate::error::{VouchError, VouchResult};
use crate::store::Store;
use crate::types::StorePath;
use crate::utils::parallel::build_pool;

/// Cooperative stop request shared between a run and whoever may cancel it
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Final result of a run that was not cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VerifySummary {
    pub total: usize,
    pub counters: CounterSnapshot,
    pub outcome: VerifyOutcome,
}

pub struct Verifier<'a> {
    store: &'a dyn Store,
    checker: &'a dyn SignatureChecker,
    config: &'a VerificationConfig,
    progress: &'a dyn ProgressSink,
    cancel: CancellationToken,
    threads: usize,
}

impl<'a> Verifier<'a> {
    pub fn new(
        store: &'a dyn Store,
        checker: &'a dyn SignatureChecker,
        config: &'a VerificationConfig,
        progress: &'a dyn ProgressSink,
    ) -> Self {
        Self {
            store,
            checker,
            config,
            progress,
            cancel: CancellationToken::new(),
            threads: 0,
        }
    }

    /// Worker pool size (0 = all available cores)
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Verify every valid path of the primary store
    pub fn verify_store(&self) -> VouchResult<VerifySummary> {
        let paths = self.store.query_all_valid_paths()?;
        tracing::info!(store = %self.store.uri(), paths = paths.len(), "verifying all store paths");
        self.verify_paths(&paths)
    }

    /// Verify `paths`, one pool task per path.
    ///
    /// Per-path problems end up in the summary; only cancellation and pool
    /// setup failures are returned as errors.
    pub fn verify_paths(&self, paths: &[StorePath]) -> VouchResult<VerifySummary> {
        let total = paths.len();
        let counters = AggregateCounters::new();
        let trust = TrustVerifier::new(
            self.checker,
            self.config.sigs_needed,
            &self.config.substituters,
        );
        let pool = build_pool(self.threads)?;

        tracing::debug!(
            total,
            threads = pool.current_num_threads(),
            substituters = self.config.substituters.len(),
            "starting verification"
        );
        self.progress.update_status(&counters.snapshot(), total);

        pool.scope_fifo(|scope| {
            for path in paths {
                if self.cancel.is_cancelled() {
                    break;
                }
                let counters = &counters;
                let trust = &trust;
                scope.spawn_fifo(move |_| self.run_task(path, trust, counters, total));
            }
        });

        let snapshot = counters.snapshot();
        if self.cancel.is_cancelled() {
            tracing::warn!(
                status = %snapshot.status_line(total),
                "verification cancelled"
            );
            return Err(VouchError::Cancelled);
        }

        self.progress.finish(&snapshot, total);
        Ok(VerifySummary {
            total,
            counters: snapshot,
            outcome: snapshot.outcome(),
        })
    }

    fn run_task(
        &self,
        path: &StorePath,
        trust: &TrustVerifier<'_>,
        counters: &AggregateCounters,
        total: usize,
    ) {
        if self.cancel.is_cancelled() {
            return;
        }

        let message = match catch_unwind(AssertUnwindSafe(|| self.verify_path(path, trust))) {
            Ok(Ok(outcome)) => {
                counters.record(outcome);
                None
            }
            Ok(Err(e)) => Some(e.to_string()),
            Err(panic) => Some(format!("verification panicked: {}", panic_message(&*panic))),
        };

        if let Some(message) = message {
            tracing::debug!(%path, error = %message, "path verification failed");
            counters.record_failure();
            self.progress.report(&Diagnostic::Failed {
                path: path.clone(),
                message,
            });
        }

        self.progress.update_status(&counters.snapshot(), total);
    }

    fn verify_path(&self, path: &StorePath, trust: &TrustVerifier<'_>) -> VouchResult<PathOutcome> {
        tracing::debug!("checking '{}'", path);

        let info = self.store.query_path_info(path)?;
        let mut outcome = PathOutcome {
            corrupted: false,
            trusted: true,
        };

        if self.config.check_contents {
            if let ContentCheck::Modified { actual } = verify_contents(self.store, &info)? {
                outcome.corrupted = true;
                self.progress.report(&Diagnostic::Modified {
                    path: path.clone(),
                    expected: info.nar_hash.clone(),
                    actual,
                });
            }
        }

        if self.config.check_trust {
            let decision = trust.check(&info, self.progress);
            tracing::trace!(
                %path,
                valid = decision.valid_signatures,
                required = decision.required,
                queried = decision.substituters_queried,
                "trust decision"
            );
            if !decision.trusted {
                outcome.trusted = false;
                self.progress.report(&Diagnostic::Untrusted { path: path.clone() });
            }
        }

        Ok(outcome)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PublicKeySet;
    use crate::store::MemoryStore;
    use crate::verify::SilentProgress;

    #[test]
    fn test_empty_run_is_success() {
        let store = MemoryStore::new("primary");
        let config = VerificationConfig::default();
        let keys = PublicKeySet::new();

        let summary = Verifier::new(&store, &keys, &config, &SilentProgress)
            .with_threads(2)
            .verify_paths(&[])
            .unwrap();
        assert_eq!(summary.total, 0);
        assert!(summary.outcome.is_success());
    }

    #[test]
    fn test_cancelled_before_start() {
        let store = MemoryStore::new("primary");
        let info = store.add("hello", b"contents").unwrap();
        let config = VerificationConfig::default();
        let keys = PublicKeySet::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = Verifier::new(&store, &keys, &config, &SilentProgress)
            .with_cancellation(cancel)
            .verify_paths(&[info.path]);
        assert!(matches!(result, Err(VouchError::Cancelled)));
        assert_eq!(store.query_count(), 0);
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(&*boxed), "static");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*boxed), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(&*boxed), "unknown panic");
    }
}
