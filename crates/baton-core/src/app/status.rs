//! Status - 読み取り専用の集計
//!
//! claim store と agent index を読むだけで、何も変更しません。

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ClaimError, Lease, OwnerId, TaskKey};
use crate::ports::{AgentIndex, ClaimStore};

use super::board::ClaimBoard;

/// Aggregate view for humans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub generated_at: DateTime<Utc>,
    /// Leases that have not expired yet.
    pub live_leases: usize,
    /// Leases past their TTL that no sweep has removed yet.
    pub expired_leases: usize,
    /// Owners with at least one agent index entry.
    pub owners: usize,
    pub recent_window_secs: i64,
    /// Claims made within the trailing window, newest first.
    pub recent: Vec<RecentClaim>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentClaim {
    pub task_id: TaskKey,
    pub owner_id: OwnerId,
    pub claimed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// One lease as shown by `leases`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseView {
    #[serde(flatten)]
    pub lease: Lease,
    pub expires_at: DateTime<Utc>,
    pub expired: bool,
    pub remaining_secs: i64,
}

impl ClaimBoard {
    pub fn status(&self) -> Result<StatusReport, ClaimError> {
        let now = self.clock.now();
        let leases = self.store.leases()?;
        let owners = self.store.owners()?.len();

        let expired_leases = leases.iter().filter(|l| l.is_expired(now)).count();
        let window_start = now
            .checked_sub_signed(self.recent_window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut recent: Vec<RecentClaim> = leases
            .iter()
            .filter(|l| l.claimed_at >= window_start)
            .map(|l| RecentClaim {
                task_id: l.task_id.clone(),
                owner_id: l.owner_id.clone(),
                claimed_at: l.claimed_at,
                expires_at: l.expires_at(),
            })
            .collect();
        recent.sort_by(|a, b| b.claimed_at.cmp(&a.claimed_at));

        Ok(StatusReport {
            generated_at: now,
            live_leases: leases.len() - expired_leases,
            expired_leases,
            owners,
            recent_window_secs: self.recent_window.num_seconds(),
            recent,
        })
    }

    /// Every stored lease with its expiry relative to now.
    pub fn leases(&self) -> Result<Vec<LeaseView>, ClaimError> {
        let now = self.clock.now();
        Ok(self
            .store
            .leases()?
            .into_iter()
            .map(|lease| LeaseView {
                expires_at: lease.expires_at(),
                expired: lease.is_expired(now),
                remaining_secs: lease.remaining(now).num_seconds(),
                lease,
            })
            .collect())
    }

    /// Live lease count per owner.
    pub fn leases_by_owner(&self) -> Result<HashMap<OwnerId, usize>, ClaimError> {
        let now = self.clock.now();
        let mut counts = HashMap::new();
        for lease in self.store.leases()? {
            if !lease.is_expired(now) {
                *counts.entry(lease.owner_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::impls::MemoryClaimStore;
    use crate::ports::FixedClock;

    #[test]
    fn status_counts_live_expired_owners_and_recent() {
        let store = Arc::new(MemoryClaimStore::new());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        ));
        let board = ClaimBoard::new(store, clock.clone());
        let a = OwnerId::new("agent-A").unwrap();
        let b = OwnerId::new("agent-B").unwrap();

        board.claim_with_ttl(&TaskKey::new("old").unwrap(), &a, 60).unwrap();
        clock.advance(Duration::minutes(10));
        board.claim(&TaskKey::new("new-1").unwrap(), &a).unwrap();
        clock.advance(Duration::minutes(1));
        board.claim(&TaskKey::new("new-2").unwrap(), &b).unwrap();

        let report = board.status().unwrap();
        assert_eq!(report.live_leases, 2);
        assert_eq!(report.expired_leases, 1);
        assert_eq!(report.owners, 2);
        assert_eq!(report.recent_window_secs, 300);
        let recent: Vec<&str> = report.recent.iter().map(|r| r.task_id.as_str()).collect();
        assert_eq!(recent, vec!["new-2", "new-1"]);

        let by_owner = board.leases_by_owner().unwrap();
        assert_eq!(by_owner.get(&a), Some(&1));
        assert_eq!(by_owner.get(&b), Some(&1));
    }

    #[test]
    fn status_does_not_mutate() {
        let store = Arc::new(MemoryClaimStore::new());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        ));
        let board = ClaimBoard::new(store, clock.clone());
        board
            .claim_with_ttl(&TaskKey::new("t").unwrap(), &OwnerId::new("o").unwrap(), 1)
            .unwrap();
        clock.advance(Duration::seconds(5));

        board.status().unwrap();
        let views = board.leases().unwrap();
        assert_eq!(views.len(), 1);
        assert!(views[0].expired);
        assert_eq!(views[0].remaining_secs, 0);
    }

    #[test]
    fn extreme_window_and_ttl_do_not_overflow() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
        let board = crate::app::BoardBuilder::new()
            .store(MemoryClaimStore::new())
            .clock(clock)
            .recent_window_secs(u64::MAX)
            .build()
            .unwrap();
        board
            .claim_with_ttl(&TaskKey::new("forever").unwrap(), &OwnerId::new("o").unwrap(), u64::MAX)
            .unwrap();

        let report = board.status().unwrap();
        assert_eq!(report.live_leases, 1);
        assert_eq!(report.recent.len(), 1);
        assert_eq!(report.recent[0].expires_at, DateTime::<Utc>::MAX_UTC);

        let views = board.leases().unwrap();
        assert!(!views[0].expired);
        assert!(views[0].remaining_secs > 0);
    }

    #[test]
    fn lease_view_flattens_the_record() {
        let lease = Lease::new(
            TaskKey::new("t").unwrap(),
            OwnerId::new("o").unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            300,
        );
        let view = LeaseView {
            expires_at: lease.expires_at(),
            expired: false,
            remaining_secs: 300,
            lease,
        };
        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["task_id"], "t");
        assert_eq!(value["expires_at"], "2024-01-01T12:05:00Z");
    }
}
