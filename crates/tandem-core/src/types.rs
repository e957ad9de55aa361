// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared across the Tandem workspace.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::StoreError;

/// The single success-or-failure result of a write-then-read request.
pub type Outcome<U> = Result<U, StoreError>;

/// Database access strategy used to serialize writes.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WriterKind {
    /// One connection, one background thread; reads share the write path.
    #[default]
    Serial,
    /// One write connection plus a pool of read-only connections.
    Pooled,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn writer_kind_display_and_parse() {
        for kind in [WriterKind::Serial, WriterKind::Pooled] {
            let parsed = WriterKind::from_str(&kind.to_string()).expect("should parse back");
            assert_eq!(kind, parsed);
        }
        assert_eq!(WriterKind::Pooled.to_string(), "pooled");
        assert!(WriterKind::from_str("sharded").is_err());
    }

    #[test]
    fn writer_kind_serialization() {
        let json = serde_json::to_string(&WriterKind::Pooled).expect("should serialize");
        assert_eq!(json, "\"pooled\"");
        let parsed: WriterKind = serde_json::from_str(&json).expect("should deserialize");
        assert_eq!(parsed, WriterKind::Pooled);
    }

    #[test]
    fn writer_kind_defaults_to_serial() {
        assert_eq!(WriterKind::default(), WriterKind::Serial);
    }
}
