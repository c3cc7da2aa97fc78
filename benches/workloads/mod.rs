pub mod lifecycle;
pub mod sampling;

use idcompact::{IdType, ParallelConfig, ParallelContext};

/// Worker pool for the suite, sized by `IDCOMPACT_THREADS` when set.
pub fn context() -> ParallelContext {
    let config = ParallelConfig::default()
        .with_env_overrides()
        .expect("invalid IDCOMPACT_* override");
    ParallelContext::new(&config).expect("failed to start worker pool")
}

/// Deterministic sparse ids with heavy repetition, like a sampled frontier.
pub fn frontier(len: usize, universe: usize, distinct: usize) -> Vec<IdType> {
    let stride = universe / distinct.max(1);
    let mut state = 0x9E37_79B9_7F4A_7C15u64;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            ((state as usize % distinct) * stride) as IdType
        })
        .collect()
}
