//! Parallel processing utilities

/// Number of worker threads for a requested count (0 = all available)
pub fn resolve_threads(threads: usize) -> usize {
    if threads == 0 {
        num_cpus::get()
    } else {
        threads
    }
}

/// Build a dedicated pool for one verification run.
///
/// The global rayon pool is left alone so that embedding applications keep
/// control over it.
pub fn build_pool(threads: usize) -> Result<rayon::ThreadPool, rayon::ThreadPoolBuildError> {
    let threads = resolve_threads(threads);

    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("vouch-verify-{}", i))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_threads() {
        assert_eq!(resolve_threads(3), 3);
        assert_eq!(resolve_threads(0), num_cpus::get());
    }

    #[test]
    fn test_build_pool_size() {
        let pool = build_pool(2).unwrap();
        assert_eq!(pool.current_num_threads(), 2);
    }
}
