//! Allocation accounting, heap configuration, and the fatal heap error taxonomy.
//!
//! Every byte the heap hands out is charged here, per arena. The accountant is the
//! only place that decides a collection is due: collectable-arena growth consults
//! the threshold (or the stress switch), immortal-arena growth never does.

use std::fmt;

use crate::{gc::GcReason, heap::ArenaKind};

/// Collection threshold used until the first collection has run (1 MiB).
pub const DEFAULT_INITIAL_THRESHOLD: usize = 1024 * 1024;

/// Multiplier applied to the live collectable bytes after each collection.
pub const DEFAULT_GROWTH_FACTOR: usize = 2;

/// Unrecoverable heap failure.
///
/// Nothing above the heap may continue after receiving one of these: the heap
/// guarantees it left no partial allocation behind, but the operation that asked
/// for memory did not happen. The top-level boundary (the `kiln` binary) reports the
/// error and terminates the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeapError {
    /// The configured memory ceiling would be exceeded, even after collecting.
    OutOfMemory {
        /// Bytes the failed request asked for.
        requested: usize,
        /// Bytes live in both arenas when the request was made.
        used: usize,
        /// The configured ceiling.
        limit: usize,
    },
    /// An array capacity, string length or constant table grew past its fixed maximum.
    CapacityOverflow { requested: u64, max: u64 },
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory { requested, used, limit } => {
                write!(
                    f,
                    "memory reallocation failed: {requested} more bytes with {used} in use exceeds {limit} bytes"
                )
            }
            Self::CapacityOverflow { requested, max } => {
                write!(f, "size overflow: {requested} > {max}")
            }
        }
    }
}

impl std::error::Error for HeapError {}

/// Result type of every fallible heap operation.
pub type HeapResult<T> = Result<T, HeapError>;

/// Tuning knobs for a [`Heap`](crate::Heap).
///
/// Use `HeapConfig::default()` for the standard settings, or build custom ones with
/// the builder methods.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HeapConfig {
    /// Collectable bytes that trigger the first collection, and the floor for every
    /// recomputed threshold afterwards.
    pub initial_threshold: usize,
    /// The next threshold is the live collectable size times this factor.
    pub growth_factor: usize,
    /// Collect before every growth of the collectable arena.
    pub stress_gc: bool,
    /// Ceiling on the bytes live across both arenas.
    pub max_memory: Option<usize>,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            initial_threshold: DEFAULT_INITIAL_THRESHOLD,
            growth_factor: DEFAULT_GROWTH_FACTOR,
            stress_gc: false,
            max_memory: None,
        }
    }
}

impl HeapConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the threshold for the first collection.
    #[must_use]
    pub fn initial_threshold(mut self, bytes: usize) -> Self {
        self.initial_threshold = bytes;
        self
    }

    /// Sets the threshold growth factor. Values below 1 are treated as 1.
    #[must_use]
    pub fn growth_factor(mut self, factor: usize) -> Self {
        self.growth_factor = factor.max(1);
        self
    }

    /// Enables or disables collecting on every collectable growth.
    #[must_use]
    pub fn stress_gc(mut self, enabled: bool) -> Self {
        self.stress_gc = enabled;
        self
    }

    /// Sets the memory ceiling in bytes.
    #[must_use]
    pub fn max_memory(mut self, limit: usize) -> Self {
        self.max_memory = Some(limit);
        self
    }
}

/// Running byte totals for both arenas plus the collection threshold.
#[derive(Debug)]
pub(crate) struct Accountant {
    config: HeapConfig,
    collectable_bytes: usize,
    immortal_bytes: usize,
    next_gc: usize,
}

impl Accountant {
    pub fn new(config: HeapConfig) -> Self {
        let next_gc = config.initial_threshold;
        Self {
            config,
            collectable_bytes: 0,
            immortal_bytes: 0,
            next_gc,
        }
    }

    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    pub fn bytes(&self, arena: ArenaKind) -> usize {
        match arena {
            ArenaKind::Collectable => self.collectable_bytes,
            ArenaKind::Immortal => self.immortal_bytes,
        }
    }

    pub fn total_bytes(&self) -> usize {
        self.collectable_bytes + self.immortal_bytes
    }

    pub fn next_gc(&self) -> usize {
        self.next_gc
    }

    /// Returns why growing the collectable arena by `growth` bytes must collect first,
    /// or `None` when it may proceed straight away.
    pub fn collection_due(&self, growth: usize) -> Option<GcReason> {
        if self.config.stress_gc {
            Some(GcReason::Stress)
        } else if self.collectable_bytes.saturating_add(growth) > self.next_gc {
            Some(GcReason::Threshold)
        } else {
            None
        }
    }

    /// Checks `growth` more bytes against the memory ceiling.
    pub fn check_limit(&self, growth: usize) -> HeapResult<()> {
        if let Some(limit) = self.config.max_memory {
            let used = self.total_bytes();
            if used.saturating_add(growth) > limit {
                return Err(HeapError::OutOfMemory {
                    requested: growth,
                    used,
                    limit,
                });
            }
        }
        Ok(())
    }

    /// Applies a `new_size - old_size` delta to the arena's running total.
    ///
    /// `new_size == 0` is a release. Callers check limits and run collections before
    /// calling this; it never fails.
    pub fn resize(&mut self, arena: ArenaKind, old_size: usize, new_size: usize) {
        let total = match arena {
            ArenaKind::Collectable => &mut self.collectable_bytes,
            ArenaKind::Immortal => &mut self.immortal_bytes,
        };
        debug_assert!(*total >= old_size, "Accountant::resize: {arena:?} releases {old_size} of {total} bytes");
        *total = total.saturating_sub(old_size) + new_size;
    }

    /// Recomputes the threshold from the live collectable size after a collection.
    pub fn reset_threshold(&mut self) {
        self.next_gc = self
            .collectable_bytes
            .saturating_mul(self.config.growth_factor)
            .max(self.config.initial_threshold);
    }
}
