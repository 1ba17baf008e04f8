//! MemoryClaimStore - 単一プロセス用の共有ストア
//!
//! # 実装詳細
//! - 1 つの Mutex で leases と index をまとめて保護する
//! - create_if_absent / delete_if はロック内で判定と更新を行うのでアトミック
//! - 複数スレッドのワーカーで共有するときは Arc で包む

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::domain::{Lease, OwnerId, StoreError, TaskKey};
use crate::ports::{AgentIndex, ClaimStore, CreateOutcome, DeleteOutcome};

#[derive(Default)]
struct MemoryState {
    leases: HashMap<TaskKey, Lease>,
    index: HashMap<OwnerId, Vec<TaskKey>>,
}

/// In-memory claim store.
#[derive(Default)]
pub struct MemoryClaimStore {
    state: Mutex<MemoryState>,
}

impl MemoryClaimStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|e| StoreError::Lock(format!("memory store poisoned: {e}")))
    }
}

impl ClaimStore for MemoryClaimStore {
    fn create_if_absent(&self, lease: &Lease) -> Result<CreateOutcome, StoreError> {
        let mut state = self.lock()?;
        if let Some(existing) = state.leases.get(&lease.task_id) {
            return Ok(CreateOutcome::Exists(Some(existing.clone())));
        }
        state.leases.insert(lease.task_id.clone(), lease.clone());
        Ok(CreateOutcome::Created)
    }

    fn get(&self, task: &TaskKey) -> Result<Option<Lease>, StoreError> {
        Ok(self.lock()?.leases.get(task).cloned())
    }

    fn delete_if(
        &self,
        task: &TaskKey,
        predicate: &dyn Fn(&Lease) -> bool,
    ) -> Result<DeleteOutcome, StoreError> {
        let mut state = self.lock()?;
        let Some(existing) = state.leases.get(task) else {
            return Ok(DeleteOutcome::Absent);
        };
        if !predicate(existing) {
            return Ok(DeleteOutcome::Kept(existing.clone()));
        }
        match state.leases.remove(task) {
            Some(removed) => Ok(DeleteOutcome::Deleted(removed)),
            None => Ok(DeleteOutcome::Absent),
        }
    }

    fn leases(&self) -> Result<Vec<Lease>, StoreError> {
        let state = self.lock()?;
        let mut leases: Vec<Lease> = state.leases.values().cloned().collect();
        leases.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        Ok(leases)
    }
}

impl AgentIndex for MemoryClaimStore {
    fn append(&self, owner: &OwnerId, task: &TaskKey) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.index.entry(owner.clone()).or_default().push(task.clone());
        Ok(())
    }

    fn prune(&self, owner: &OwnerId, task: &TaskKey) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        let Some(entries) = state.index.get_mut(owner) else {
            return Ok(false);
        };
        let Some(position) = entries.iter().position(|entry| entry == task) else {
            return Ok(false);
        };
        entries.remove(position);
        if entries.is_empty() {
            state.index.remove(owner);
        }
        Ok(true)
    }

    fn entries(&self, owner: &OwnerId) -> Result<Vec<TaskKey>, StoreError> {
        Ok(self.lock()?.index.get(owner).cloned().unwrap_or_default())
    }

    fn owners(&self) -> Result<Vec<OwnerId>, StoreError> {
        let state = self.lock()?;
        let mut owners: Vec<OwnerId> = state
            .index
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(owner, _)| owner.clone())
            .collect();
        owners.sort();
        Ok(owners)
    }
}
