//! Parallel-execution configuration.
//!
//! The worker count is an explicit value handed to each table through a
//! [`ParallelContext`], never a process-wide global. A configuration can be
//! built in code, read from JSON, and adjusted from the environment:
//!
//! - `IDCOMPACT_THREADS`: worker count (`0` means one per core)
//! - `IDCOMPACT_MIN_CHUNK`: minimum number of elements per parallel task

use core::fmt;
use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CompactError;

/// Environment variable overriding [`ParallelConfig::threads`].
pub const THREADS_ENV: &str = "IDCOMPACT_THREADS";
/// Environment variable overriding [`ParallelConfig::min_chunk_len`].
pub const MIN_CHUNK_ENV: &str = "IDCOMPACT_MIN_CHUNK";

/// Settings for the worker pool that runs every table operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    /// Number of worker threads. `0` lets the pool pick one per core.
    pub threads: usize,
    /// Lower bound on elements handled by one task, limits splitting overhead
    /// on small batches.
    pub min_chunk_len: usize,
    /// Prefix for worker thread names.
    pub thread_name: String,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            min_chunk_len: 1024,
            thread_name: String::from("idcompact"),
        }
    }
}

impl ParallelConfig {
    /// A default configuration with a fixed worker count.
    pub fn with_threads(threads: usize) -> Self {
        Self {
            threads,
            ..Self::default()
        }
    }

    /// Parses a configuration from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    /// Returns `ConfigError::Json` if the document is malformed.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(ConfigError::Json)
    }

    /// Applies overrides from the process environment.
    ///
    /// # Errors
    /// Returns `ConfigError::Env` if a variable is set but not a valid count.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary key lookup.
    ///
    /// # Errors
    /// Returns `ConfigError::Env` if a value is present but not a valid count.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(threads) = parse_count(&lookup, THREADS_ENV)? {
            self.threads = threads;
        }
        if let Some(min_chunk_len) = parse_count(&lookup, MIN_CHUNK_ENV)? {
            self.min_chunk_len = min_chunk_len;
        }
        Ok(self)
    }
}

fn parse_count(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<usize>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env { key, value }),
    }
}

/// Errors produced while loading a [`ParallelConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// The JSON document could not be parsed.
    Json(serde_json::Error),
    /// An override held a value that is not a non-negative integer.
    Env {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Json(err) => write!(f, "malformed configuration: {err}"),
            ConfigError::Env { key, value } => write!(f, "{key}={value:?} is not a valid count"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Json(err) => Some(err),
            ConfigError::Env { .. } => None,
        }
    }
}

/// A started worker pool plus the task granularity to use with it.
///
/// Cloning is cheap; clones share the same pool, so several tables can run on
/// one set of workers.
#[derive(Clone)]
pub struct ParallelContext {
    pool: Arc<ThreadPool>,
    min_chunk_len: usize,
}

impl ParallelContext {
    /// Starts a worker pool described by `config`.
    ///
    /// # Errors
    /// Returns `CompactError::ThreadPool` if the threads cannot be spawned.
    pub fn new(config: &ParallelConfig) -> Result<Self, CompactError> {
        let prefix = config.thread_name.clone();
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(move |i| format!("{prefix}-{i}"))
            .build()?;
        debug!(threads = pool.current_num_threads(), min_chunk_len = config.min_chunk_len, "worker pool started");
        Ok(Self {
            pool: Arc::new(pool),
            min_chunk_len: config.min_chunk_len.max(1),
        })
    }

    /// Starts a pool with `threads` workers and default settings otherwise.
    ///
    /// # Errors
    /// Returns `CompactError::ThreadPool` if the threads cannot be spawned.
    pub fn with_threads(threads: usize) -> Result<Self, CompactError> {
        Self::new(&ParallelConfig::with_threads(threads))
    }

    /// Number of workers in the pool.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Minimum number of elements per task.
    pub fn min_chunk_len(&self) -> usize {
        self.min_chunk_len
    }

    /// Runs `op` inside the pool and blocks until it and every task it spawned
    /// have finished.
    #[inline]
    pub(crate) fn install<R, F>(&self, op: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        self.pool.install(op)
    }
}

impl fmt::Debug for ParallelContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelContext")
            .field("threads", &self.threads())
            .field("min_chunk_len", &self.min_chunk_len)
            .finish()
    }
}
