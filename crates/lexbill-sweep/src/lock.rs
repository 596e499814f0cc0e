// SPDX-FileCopyrightText: 2026 Lexbill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Named run-once locks for the sweeps.
//!
//! A lock is held for the duration of one sweep invocation. A second
//! invocation under the same name fails immediately with
//! [`LexbillError::SweepLock`]; it never waits. The lock set lives in process
//! memory only, so two processes sharing a database are not excluded from
//! each other.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};

use lexbill_core::LexbillError;
use tracing::debug;

/// Lock name of the date-based sweep.
pub const DATE_SWEEP_LOCK: &str = "billing-date-sweep";

/// Lock name of the AI-assisted sweep.
pub const AI_SWEEP_LOCK: &str = "billing-ai-sweep";

static GLOBAL: LazyLock<SweepLocks> = LazyLock::new(SweepLocks::new);

/// A set of held lock names. Clones share the same set.
#[derive(Debug, Clone, Default)]
pub struct SweepLocks {
    held: Arc<Mutex<HashSet<String>>>,
}

impl SweepLocks {
    /// An empty, independent lock set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide lock set used by default.
    pub fn global() -> &'static SweepLocks {
        &GLOBAL
    }

    fn held(&self) -> MutexGuard<'_, HashSet<String>> {
        // The set is only mutated by insert/remove, so a poisoned guard is still consistent.
        self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether `name` is currently held.
    pub fn is_held(&self, name: &str) -> bool {
        self.held().contains(name)
    }

    /// Acquire `name`, failing fast if it is already held.
    pub fn try_acquire(&self, name: &str) -> Result<SweepLockGuard, LexbillError> {
        if !self.held().insert(name.to_string()) {
            return Err(LexbillError::SweepLock {
                name: name.to_string(),
            });
        }
        debug!(lock = name, "sweep lock acquired");
        Ok(SweepLockGuard {
            locks: self.clone(),
            name: name.to_string(),
        })
    }

    /// Run `f` while holding `name`.
    ///
    /// The lock is released when `f` completes, fails, panics, or is dropped
    /// mid-flight.
    pub async fn with_lock<T, F, Fut>(&self, name: &str, f: F) -> Result<T, LexbillError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, LexbillError>>,
    {
        let _guard = self.try_acquire(name)?;
        f().await
    }
}

/// Releases its lock name on drop.
#[must_use = "lock is released when SweepLockGuard is dropped"]
#[derive(Debug)]
pub struct SweepLockGuard {
    locks: SweepLocks,
    name: String,
}

impl Drop for SweepLockGuard {
    fn drop(&mut self) {
        self.locks.held().remove(&self.name);
        debug!(lock = %self.name, "sweep lock released");
    }
}
