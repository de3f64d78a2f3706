//! Per-process invocation state handed to each job.
//!
//! The only shared state is the cold-start flag: `true` for the first job a
//! process runs, `false` afterwards. It is reported alongside job results for
//! external latency accounting and has no effect on pipeline behaviour. The
//! flag is owned by whoever creates the [`InvocationContext`], never a global.

use std::sync::atomic::{AtomicBool, Ordering};

/// Shared, thread-safe invocation context.
#[derive(Debug)]
pub struct InvocationContext {
    cold: AtomicBool,
}

impl InvocationContext {
    pub fn new() -> Self {
        Self {
            cold: AtomicBool::new(true),
        }
    }

    /// Returns whether this is the first invocation, clearing the flag.
    ///
    /// Exactly one caller observes `true`, even under concurrent jobs.
    pub fn take_cold_start(&self) -> bool {
        self.cold.swap(false, Ordering::AcqRel)
    }

    /// Peek at the flag without clearing it.
    pub fn is_cold(&self) -> bool {
        self.cold.load(Ordering::Acquire)
    }

    /// Mark the next invocation as cold again.
    pub fn reset(&self) {
        self.cold.store(true, Ordering::Release);
    }
}

impl Default for InvocationContext {
    fn default() -> Self {
        Self::new()
    }
}
