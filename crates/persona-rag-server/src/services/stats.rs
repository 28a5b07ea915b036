use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Kind of external capability call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Embedding,
    Generation,
}

/// Process-wide external call counters. Cheap to clone; clones share counters.
#[derive(Clone, Default)]
pub struct StatsTracker {
    inner: Arc<StatsInner>,
}

#[derive(Default)]
struct StatsInner {
    embedding: CallCounters,
    generation: CallCounters,
}

#[derive(Default)]
struct CallCounters {
    successes: AtomicU64,
    failures: AtomicU64,
}

impl CallCounters {
    fn snapshot(&self) -> CallStats {
        let successes = self.successes.load(Ordering::Acquire);
        let failures = self.failures.load(Ordering::Acquire);
        CallStats {
            attempts: successes + failures,
            successes,
            failures,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CallStats {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub embedding: CallStats,
    pub generation: CallStats,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished call. The only mutator.
    pub fn record(&self, kind: CallKind, success: bool) {
        let counters = match kind {
            CallKind::Embedding => &self.inner.embedding,
            CallKind::Generation => &self.inner.generation,
        };

        // attempts are derived, so every call lands in exactly one counter
        if success {
            counters.successes.fetch_add(1, Ordering::AcqRel);
        } else {
            counters.failures.fetch_add(1, Ordering::AcqRel);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            embedding: self.inner.embedding.snapshot(),
            generation: self.inner.generation.snapshot(),
        }
    }
}
