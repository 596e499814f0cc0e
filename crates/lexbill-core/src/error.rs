// SPDX-FileCopyrightText: 2026 Lexbill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Lexbill billing tracker.

use thiserror::Error;

/// The primary error type used across all Lexbill crates.
#[derive(Debug, Error)]
pub enum LexbillError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches),
    /// including requests an upstream API rejects outright, which retrying cannot fix.
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// AI classifier errors (transport failure, provider rejection, unreadable body).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Another invocation of the named sweep is still running.
    #[error("sweep `{name}` is already running")]
    SweepLock { name: String },

    /// The referenced trigger-queue entry does not exist.
    #[error("Trigger not found")]
    TriggerNotFound { id: i64 },

    /// The referenced trigger-queue entry has already been decided.
    #[error("Trigger is not pending")]
    TriggerNotPending { id: i64, status: String },

    /// The staff member named as assignee does not exist.
    #[error("invalid assignee: staff {staff_id} does not exist")]
    InvalidAssignee { staff_id: i64 },

    /// A supplied due date could not be parsed as `YYYY-MM-DD`.
    #[error("invalid due date `{value}`")]
    InvalidDueDate { value: String },

    /// Input failed a domain validation rule.
    #[error("validation error: {0}")]
    Validation(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LexbillError {
    /// Returns true for the concurrency conflict raised by the sweep lock.
    ///
    /// Callers map this to an "already running" response instead of a
    /// generic failure.
    pub fn is_conflict(&self) -> bool {
        matches!(self, LexbillError::SweepLock { .. })
    }

    /// Returns true for errors caused by the caller's input rather than the system.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            LexbillError::TriggerNotFound { .. }
                | LexbillError::TriggerNotPending { .. }
                | LexbillError::InvalidAssignee { .. }
                | LexbillError::InvalidDueDate { .. }
                | LexbillError::Validation(_)
        )
    }
}
