//! ClaimBoard - lease 操作の表面
//!
//! # フロー
//! 1. ワーカーは作業前に claim(task, owner) を呼ぶ
//! 2. 成功したら release するか TTL が切れるまでその task を保持する
//! 3. sweep が期限切れの lease を回収する（タイマーは持たない。呼ぶのは外側）
//!
//! どの操作も 1 回の同期呼び出しで終わり、他のワーカーを待ちません。

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info};

use crate::domain::{
    ClaimError, DEFAULT_TTL_SECS, Lease, ListedTask, OwnerId, TaskKey, TaskStatus,
};
use crate::ports::{AgentIndex, ClaimStore, Clock, CreateOutcome, DeleteOutcome, LeaseStore};

use super::builder::BoardBuilder;

/// Default trailing window for the status "recent activity" view.
pub const DEFAULT_RECENT_WINDOW_SECS: u64 = 300;

/// Lease operations over a shared store.
pub struct ClaimBoard {
    pub(crate) store: Arc<dyn LeaseStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) default_ttl_secs: u64,
    pub(crate) recent_window: Duration,
}

impl ClaimBoard {
    pub fn new(store: Arc<dyn LeaseStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            default_ttl_secs: DEFAULT_TTL_SECS,
            recent_window: Duration::seconds(DEFAULT_RECENT_WINDOW_SECS as i64),
        }
    }

    pub fn builder() -> BoardBuilder {
        BoardBuilder::new()
    }

    pub fn default_ttl_secs(&self) -> u64 {
        self.default_ttl_secs
    }

    /// Claims `task` for `owner` with the board's default TTL.
    pub fn claim(&self, task: &TaskKey, owner: &OwnerId) -> Result<Lease, ClaimError> {
        self.claim_with_ttl(task, owner, self.default_ttl_secs)
    }

    /// Claims `task` for `owner`; the TTL is fixed for the lifetime of the lease.
    ///
    /// A stored record that is already expired does not block the claim: it is
    /// removed (only if it is still that exact record) and the create is tried
    /// once more. A live record always yields `AlreadyClaimed`.
    pub fn claim_with_ttl(
        &self,
        task: &TaskKey,
        owner: &OwnerId,
        ttl_secs: u64,
    ) -> Result<Lease, ClaimError> {
        let now = self.clock.now();
        let lease = Lease::new(task.clone(), owner.clone(), now, ttl_secs);

        let holder = match self.store.create_if_absent(&lease)? {
            CreateOutcome::Created => return self.record_claim(lease),
            CreateOutcome::Exists(holder) => holder,
        };

        if let Some(existing) = &holder
            && !existing.is_expired(now)
        {
            debug!(task = %task, owner = %owner, holder = %existing.owner_id, "task already claimed");
            return Err(ClaimError::AlreadyClaimed {
                task: task.clone(),
                holder,
            });
        }

        if let Some(stale) = holder {
            self.reclaim_stale(&stale, now)?;
        }

        match self.store.create_if_absent(&lease)? {
            CreateOutcome::Created => self.record_claim(lease),
            CreateOutcome::Exists(holder) => {
                debug!(task = %task, owner = %owner, "lost the race for a reclaimed task");
                Err(ClaimError::AlreadyClaimed {
                    task: task.clone(),
                    holder,
                })
            }
        }
    }

    fn record_claim(&self, lease: Lease) -> Result<Lease, ClaimError> {
        self.store.append(&lease.owner_id, &lease.task_id)?;
        debug!(
            task = %lease.task_id,
            owner = %lease.owner_id,
            ttl_secs = lease.ttl_seconds,
            "claimed"
        );
        Ok(lease)
    }

    /// Deletes `stale` if it is still the stored record and expired at `now`.
    pub(crate) fn reclaim_stale(
        &self,
        stale: &Lease,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Option<Lease>, ClaimError> {
        let outcome = self
            .store
            .delete_if(&stale.task_id, &|current| current == stale && current.is_expired(now))?;
        match outcome {
            DeleteOutcome::Deleted(removed) => {
                self.store.prune(&removed.owner_id, &removed.task_id)?;
                Ok(Some(removed))
            }
            DeleteOutcome::Kept(_) | DeleteOutcome::Absent => Ok(None),
        }
    }

    /// Releases `task` if `owner` holds it.
    ///
    /// The owner check is advisory: identities are caller-asserted.
    pub fn release(&self, task: &TaskKey, owner: &OwnerId) -> Result<Lease, ClaimError> {
        match self.store.delete_if(task, &|lease| lease.is_owned_by(owner))? {
            DeleteOutcome::Deleted(lease) => {
                self.store.prune(owner, task)?;
                info!(task = %task, owner = %owner, "released");
                Ok(lease)
            }
            DeleteOutcome::Kept(lease) => Err(ClaimError::NotOwner {
                task: task.clone(),
                owner: lease.owner_id,
                caller: owner.clone(),
            }),
            DeleteOutcome::Absent => Err(ClaimError::NotFound(task.clone())),
        }
    }

    /// Current lease for `task`, expired or not.
    pub fn lease(&self, task: &TaskKey) -> Result<Option<Lease>, ClaimError> {
        Ok(self.store.get(task)?)
    }

    /// Snapshot of `owner`'s agent index, resolved lazily against the claim store.
    pub fn list_tasks(&self, owner: &OwnerId) -> Result<TaskList<'_>, ClaimError> {
        let mut seen = HashSet::new();
        let entries = self
            .store
            .entries(owner)?
            .into_iter()
            .filter(|task| seen.insert(task.clone()))
            .collect();
        Ok(TaskList {
            store: self.store.as_ref(),
            owner: owner.clone(),
            entries,
        })
    }
}

/// Finite, restartable listing of one owner's index.
///
/// The entries are fixed when the list is created; each pass looks the leases up again.
pub struct TaskList<'a> {
    store: &'a dyn LeaseStore,
    owner: OwnerId,
    entries: Vec<TaskKey>,
}

impl<'a> TaskList<'a> {
    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<ListedTask, ClaimError>> + '_ {
        self.entries.iter().map(move |task| {
            let status = match self.store.get(task)? {
                Some(lease) if lease.is_owned_by(&self.owner) => TaskStatus::Claimed {
                    claimed_at: lease.claimed_at,
                },
                // a lease held by someone else does not back this entry
                Some(_) | None => TaskStatus::Orphaned,
            };
            Ok(ListedTask {
                task_id: task.clone(),
                status,
            })
        })
    }

    /// Runs one pass and collects it.
    pub fn to_vec(&self) -> Result<Vec<ListedTask>, ClaimError> {
        self.iter().collect()
    }
}
