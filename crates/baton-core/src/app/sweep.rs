//! Expire-sweep: reclaim every lease past its TTL, regardless of owner.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{ClaimError, Lease};
use crate::ports::ClaimStore;

use super::board::ClaimBoard;

/// Leases removed by one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub reclaimed: Vec<Lease>,
}

impl SweepReport {
    pub fn count(&self) -> usize {
        self.reclaimed.len()
    }
}

impl ClaimBoard {
    /// Deletes every lease with `claimed_at + ttl < now` and prunes it from its owner's index.
    ///
    /// Safe to race with claim / release: a record that changed or vanished
    /// since the scan is left alone and not counted.
    pub fn sweep(&self) -> Result<SweepReport, ClaimError> {
        let now = self.clock.now();
        let mut report = SweepReport::default();

        for lease in self.store.leases()? {
            if !lease.is_expired(now) {
                continue;
            }
            match self.reclaim_stale(&lease, now)? {
                Some(removed) => report.reclaimed.push(removed),
                None => debug!(task = %lease.task_id, "lease changed during sweep, skipped"),
            }
        }

        if report.count() > 0 {
            info!(reclaimed = report.count(), "swept expired leases");
        } else {
            debug!("sweep found nothing to reclaim");
        }
        Ok(report)
    }
}
