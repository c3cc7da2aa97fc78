//! Error types for compaction tables.

use core::fmt;

use crate::alloc::AllocError;
use crate::config::ConfigError;
use crate::table::IdType;

/// Errors reported by compaction tables and their construction.
///
/// Construction failures (`Alloc`, `CapacityTooLarge`, `ThreadPool`, `Config`)
/// are always returned. Contract violations (`IdOutOfRange`,
/// `OutputExceedsItems`, `LengthMismatch`) are fatal in the plain operations and
/// are only returned by their `try_*` counterparts.
#[derive(Debug)]
pub enum CompactError {
    /// A backing array could not be allocated.
    Alloc(AllocError),
    /// The requested capacity cannot be represented by the slot encoding.
    CapacityTooLarge {
        /// Requested capacity.
        capacity: usize,
        /// Largest supported capacity.
        max: usize,
    },
    /// The worker pool could not be started.
    ThreadPool(rayon::ThreadPoolBuildError),
    /// The parallel configuration is invalid.
    Config(ConfigError),
    /// A global id lies outside the table's universe.
    IdOutOfRange {
        /// Offending id.
        id: IdType,
        /// Table capacity.
        capacity: usize,
    },
    /// More nodes were requested than the table holds.
    OutputExceedsItems {
        /// Requested output length.
        requested: usize,
        /// Current item count.
        available: usize,
    },
    /// Position-aligned input and output arrays differ in length.
    LengthMismatch {
        /// Expected length.
        expected: usize,
        /// Length actually supplied.
        found: usize,
    },
}

impl fmt::Display for CompactError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompactError::Alloc(err) => write!(f, "table allocation failed: {err}"),
            CompactError::CapacityTooLarge { capacity, max } => {
                write!(f, "capacity {capacity} exceeds the maximum of {max}")
            }
            CompactError::ThreadPool(err) => write!(f, "failed to build worker pool: {err}"),
            CompactError::Config(err) => write!(f, "invalid parallel configuration: {err}"),
            CompactError::IdOutOfRange { id, capacity } => {
                write!(f, "id {id} out of range (capacity {capacity})")
            }
            CompactError::OutputExceedsItems { requested, available } => {
                write!(f, "requested {requested} nodes but only {available} are mapped")
            }
            CompactError::LengthMismatch { expected, found } => {
                write!(f, "array length {found} does not match {expected}")
            }
        }
    }
}

impl std::error::Error for CompactError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompactError::Alloc(err) => Some(err),
            CompactError::ThreadPool(err) => Some(err),
            CompactError::Config(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AllocError> for CompactError {
    fn from(err: AllocError) -> Self {
        CompactError::Alloc(err)
    }
}

impl From<rayon::ThreadPoolBuildError> for CompactError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        CompactError::ThreadPool(err)
    }
}

impl From<ConfigError> for CompactError {
    fn from(err: ConfigError) -> Self {
        CompactError::Config(err)
    }
}

/// Aborts the current operation on a violated contract.
///
/// Contract violations are caller bugs, never runtime conditions. With the
/// release profile's `panic = "abort"` this terminates the process.
#[cold]
#[inline(never)]
#[track_caller]
pub(crate) fn fatal(err: CompactError) -> ! {
    tracing::error!(%err, "compaction table contract violated");
    panic!("{err}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::Device;

    #[test]
    fn test_display_names_offending_value() {
        let err = CompactError::IdOutOfRange { id: 10, capacity: 10 };
        assert_eq!(err.to_string(), "id 10 out of range (capacity 10)");

        let err = CompactError::OutputExceedsItems { requested: 4, available: 3 };
        assert_eq!(err.to_string(), "requested 4 nodes but only 3 are mapped");
    }

    #[test]
    fn test_alloc_error_source() {
        use std::error::Error;
        let err: CompactError = AllocError::new(Device::Cpu, 64).into();
        assert!(err.source().is_some());
        assert!(err.to_string().contains("64 bytes on cpu"));
    }

    #[test]
    #[should_panic(expected = "id 5 out of range (capacity 5)")]
    fn test_fatal_panics_with_diagnostic() {
        fatal(CompactError::IdOutOfRange { id: 5, capacity: 5 });
    }
}
