//! Signature threshold checks.
//!
//! A path is trusted when enough distinct valid signatures over its
//! fingerprint are found, first among its own signatures and then from the
//! substituters in configured order. A path marked ultimate needs none unless
//! a threshold was set explicitly.

use std::collections::HashSet;

use super::progress::{Diagnostic, ProgressSink};
use super::Substituter;
use crate::crypto::SignatureChecker;
use crate::store::StoreResult;
use crate::types::PathInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustDecision {
    pub trusted: bool,
    pub valid_signatures: usize,
    /// Signatures that were needed; 0 when trust came from the ultimate flag
    pub required: usize,
    pub substituters_queried: usize,
}

/// Distinct signatures seen for one path and how many of them verified
struct SignatureTally<'a> {
    checker: &'a dyn SignatureChecker,
    fingerprint: String,
    seen: HashSet<String>,
    valid: usize,
}

impl<'a> SignatureTally<'a> {
    fn new(checker: &'a dyn SignatureChecker, info: &PathInfo) -> Self {
        Self {
            checker,
            fingerprint: info.fingerprint(),
            seen: HashSet::new(),
            valid: 0,
        }
    }

    fn add<'s>(&mut self, sigs: impl IntoIterator<Item = &'s String>) {
        for sig in sigs {
            if !self.seen.insert(sig.clone()) {
                continue;
            }
            if self.checker.verify(&self.fingerprint, sig) {
                self.valid += 1;
            }
        }
    }
}

pub struct TrustVerifier<'a> {
    checker: &'a dyn SignatureChecker,
    sigs_needed: usize,
    substituters: &'a [Substituter],
}

impl<'a> TrustVerifier<'a> {
    pub fn new(
        checker: &'a dyn SignatureChecker,
        sigs_needed: usize,
        substituters: &'a [Substituter],
    ) -> Self {
        Self {
            checker,
            sigs_needed,
            substituters,
        }
    }

    /// Decide trust for `info`, the metadata recorded by the primary store.
    ///
    /// Substituter signatures are checked against the same fingerprint.
    /// Substituter errors are reported through `progress` and skipped.
    pub fn check(&self, info: &PathInfo, progress: &dyn ProgressSink) -> TrustDecision {
        if info.ultimate && self.sigs_needed == 0 {
            return TrustDecision {
                trusted: true,
                valid_signatures: 0,
                required: 0,
                substituters_queried: 0,
            };
        }

        let required = self.sigs_needed.max(1);
        let mut tally = SignatureTally::new(self.checker, info);
        tally.add(&info.sigs);

        let mut queried = 0;
        for substituter in self.substituters {
            if tally.valid >= required {
                break;
            }
            queried += 1;

            match remote_info(substituter, info) {
                Ok(Some(remote)) => tally.add(&remote.sigs),
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(
                        path = %info.path,
                        substituter = %substituter.uri(),
                        kind = e.kind(),
                        error = %e,
                        "substituter query failed"
                    );
                    progress.report(&Diagnostic::SubstituterFailed {
                        substituter: substituter.uri(),
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                }
            }
        }

        TrustDecision {
            trusted: tally.valid >= required,
            valid_signatures: tally.valid,
            required,
            substituters_queried: queried,
        }
    }
}

/// The substituter's metadata for the path, or `None` if it does not have it
fn remote_info(substituter: &Substituter, info: &PathInfo) -> StoreResult<Option<PathInfo>> {
    substituter.with_access(|store| {
        if !store.is_valid_path(&info.path)? {
            return Ok(None);
        }
        store.query_path_info(&info.path).map(Some)
    })
}
