//! # Transaction Identifiers
//!
//! Human-decodable, sortable ids printed on receipts.
//!
//! ## Format
//! ```text
//! TX-20261018143005-9F3A1C
//! ── ────────────── ──────
//!  │        │          └── 6 hex chars of randomness
//!  │        └───────────── UTC timestamp, second resolution
//!  └────────────────────── fixed prefix
//! ```
//!
//! Two sales in the same second collide only if their suffixes match (1 in
//! 16.7M). The storage layer enforces uniqueness; the sale engine draws a
//! fresh suffix a bounded number of times when the constraint fires.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ValidationError;

const PREFIX: &str = "TX-";
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
const SUFFIX_LEN: usize = 6;

// =============================================================================
// TransactionId
// =============================================================================

/// A validated `TX-<YYYYMMDDHHMMSS>-<6 hex>` identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionId(String);

impl TransactionId {
    /// Builds an id from a timestamp and three random bytes.
    pub fn from_parts(at: DateTime<Utc>, suffix: [u8; 3]) -> Self {
        TransactionId(format!(
            "{}{}-{:02X}{:02X}{:02X}",
            PREFIX,
            at.format(TIMESTAMP_FORMAT),
            suffix[0],
            suffix[1],
            suffix[2]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Timestamp component, decoded back to UTC.
    pub fn timestamp(&self) -> DateTime<Utc> {
        // Format was validated on construction.
        NaiveDateTime::parse_from_str(&self.0[PREFIX.len()..PREFIX.len() + 14], TIMESTAMP_FORMAT)
            .map(|naive| naive.and_utc())
            .unwrap_or_default()
    }

    /// Random suffix component.
    pub fn suffix(&self) -> &str {
        &self.0[self.0.len() - SUFFIX_LEN..]
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TransactionId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "transaction_id".to_string(),
            reason: reason.to_string(),
        };

        let rest = s
            .strip_prefix(PREFIX)
            .ok_or_else(|| invalid("must start with TX-"))?;
        let (stamp, suffix) = rest
            .split_once('-')
            .ok_or_else(|| invalid("missing random suffix"))?;

        if stamp.len() != 14 || !stamp.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("timestamp must be 14 digits"));
        }
        NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
            .map_err(|_| invalid("timestamp is not a valid date/time"))?;

        if suffix.len() != SUFFIX_LEN || !suffix.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid("suffix must be 6 hex characters"));
        }

        Ok(TransactionId(format!("{}{}-{}", PREFIX, stamp, suffix.to_ascii_uppercase())))
    }
}

impl TryFrom<String> for TransactionId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TransactionId> for String {
    fn from(id: TransactionId) -> Self {
        id.0
    }
}

// =============================================================================
// Id Sources
// =============================================================================

/// Supplies fresh transaction ids to the sale engine.
///
/// Injected so tests can force collisions.
pub trait TransactionIdSource: Send + Sync {
    fn next_id(&self, now: DateTime<Utc>) -> TransactionId;
}

/// Production source: timestamp plus three bytes of a v4 UUID.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTransactionIds;

impl TransactionIdSource for RandomTransactionIds {
    fn next_id(&self, now: DateTime<Utc>) -> TransactionId {
        let bytes = Uuid::new_v4().into_bytes();
        TransactionId::from_parts(now, [bytes[0], bytes[1], bytes[2]])
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
