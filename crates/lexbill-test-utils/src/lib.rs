// SPDX-FileCopyrightText: 2026 Lexbill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Lexbill integration tests.
//!
//! Provides a temp-file database with fixture builders and fake classifiers
//! for fast, deterministic tests without network access.
//!
//! # Components
//!
//! - [`TestDb`] - Migrated SQLite database in a temp directory
//! - [`ScriptedClassifier`] - Classifier replaying queued replies
//! - [`GatedClassifier`] - Classifier that blocks until released

pub mod harness;
pub mod mock_classifier;

pub use harness::TestDb;
pub use mock_classifier::{GatedClassifier, ScriptedClassifier, overloaded, verdicts};
