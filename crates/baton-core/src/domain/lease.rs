//! Lease record: one worker's claim on one task.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{OwnerId, TaskKey};

/// TTL used when the caller does not pick one.
pub const DEFAULT_TTL_SECS: u64 = 300;

/// A time-bounded exclusive claim on a task.
///
/// Design:
/// - Every field is fixed when the lease is created; there is no renew.
/// - `expires_at` is derived, never stored.
/// - A lease is expired iff `now > expires_at` (the boundary instant is still live).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub task_id: TaskKey,
    pub owner_id: OwnerId,
    pub claimed_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

impl Lease {
    pub fn new(task_id: TaskKey, owner_id: OwnerId, claimed_at: DateTime<Utc>, ttl_seconds: u64) -> Self {
        Self {
            task_id,
            owner_id,
            claimed_at,
            ttl_seconds,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        // ttl is u64 but chrono wants i64; anything past i64::MAX seconds never expires in practice
        let ttl = i64::try_from(self.ttl_seconds).unwrap_or(i64::MAX);
        let ttl = Duration::try_seconds(ttl).unwrap_or(Duration::MAX);
        self.claimed_at
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at()
    }

    /// Time left before expiry, clamped at zero.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at() - now).max(Duration::zero())
    }

    pub fn is_owned_by(&self, owner: &OwnerId) -> bool {
        &self.owner_id == owner
    }
}
