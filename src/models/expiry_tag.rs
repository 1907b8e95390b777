//! Heap entries tracked by the expiry engine.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// Pairs an object id with the instant it should be reaped.
///
/// Ordering is by expiry first, with the id as a tie-breaker so equal
/// expiries still order consistently.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpiryTag {
    pub id: String,
    pub expiry: DateTime<Utc>,
}

impl ExpiryTag {
    pub fn new(id: impl Into<String>, expiry: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            expiry,
        }
    }

    pub fn has_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry < now
    }
}

impl Ord for ExpiryTag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.expiry
            .cmp(&other.expiry)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for ExpiryTag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
