// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Tandem write-then-read coordinator.
//!
//! This crate provides the error taxonomy and the small set of shared types
//! used by the configuration and storage crates. Everything that crosses a
//! crate boundary in the workspace is defined here.

pub mod error;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{ResultCode, StoreError};
pub use types::{Outcome, WriterKind};
