//! Content hash verification

use crate::store::{Store, StoreResult};
use crate::types::{Hash, HashSink, PathInfo};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentCheck {
    Intact,
    Modified { actual: Hash },
}

impl ContentCheck {
    pub fn is_intact(&self) -> bool {
        matches!(self, ContentCheck::Intact)
    }
}

/// Stream the path's NAR through the algorithm of its recorded hash and
/// compare the result.
///
/// Read errors are returned as errors and are never reported as a mismatch.
pub fn verify_contents(store: &dyn Store, info: &PathInfo) -> StoreResult<ContentCheck> {
    let mut sink = HashSink::new(info.nar_hash.algorithm());
    store.nar_from_path(&info.path, &mut sink)?;
    let (actual, size) = sink.finish();

    tracing::trace!(path = %info.path, size, "hashed contents");

    if actual == info.nar_hash {
        Ok(ContentCheck::Intact)
    } else {
        Ok(ContentCheck::Modified { actual })
    }
}
