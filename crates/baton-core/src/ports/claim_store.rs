//! ClaimStore / AgentIndex ports - 共有ストアの抽象化
//!
//! 複数のワーカー（別プロセス）が同じストアを読み書きします。
//! ストアに要求するプリミティブは 2 つだけです：
//! - **create_if_absent**: 存在しなければ作成（アトミック）
//! - **delete_if**: 述語に一致すれば削除（読み取り〜削除がアトミック）
//!
//! Agent Index は owner ごとの task_id ログで、表示と掃除のためだけに使う。
//! 正本ではありません（lease が消えてもエントリが残ることがある）。
//!
//! # 実装
//! - `impls::FileClaimStore`: 共有ディレクトリ（本番用、単一ホスト）
//! - `impls::MemoryClaimStore`: Mutex + HashMap（単一プロセス・テスト用）

use crate::domain::{Lease, OwnerId, StoreError, TaskKey};

/// Result of an atomic create-if-absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// A record already existed; it is returned as read right after the failed create.
    ///
    /// `None` when the existing record vanished before it could be read.
    Exists(Option<Lease>),
}

/// Result of an atomic delete-if-predicate-matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted(Lease),
    /// The record exists but the predicate rejected it; nothing was touched.
    Kept(Lease),
    /// Nothing to delete. Not an error: a racing sweep or release got there first.
    Absent,
}

/// Lease records keyed by task id.
///
/// # 設計原則
/// - 1 task_id につき高々 1 レコード
/// - create_if_absent は同時に呼ばれても成功するのはちょうど 1 つ
/// - delete_if は同じ task_id に対する他の delete_if と直列化される
pub trait ClaimStore: Send + Sync {
    fn create_if_absent(&self, lease: &Lease) -> Result<CreateOutcome, StoreError>;

    fn get(&self, task: &TaskKey) -> Result<Option<Lease>, StoreError>;

    fn delete_if(
        &self,
        task: &TaskKey,
        predicate: &dyn Fn(&Lease) -> bool,
    ) -> Result<DeleteOutcome, StoreError>;

    /// Snapshot of every lease record.
    fn leases(&self) -> Result<Vec<Lease>, StoreError>;
}

/// Per-owner, append-only log of claimed task ids.
pub trait AgentIndex: Send + Sync {
    fn append(&self, owner: &OwnerId, task: &TaskKey) -> Result<(), StoreError>;

    /// Removes the oldest entry equal to `task`; returns whether one was removed.
    ///
    /// Each successful claim appends one entry and each deleted lease prunes
    /// one, so a prune that lands after the owner re-claimed the same task
    /// leaves the new entry in place.
    fn prune(&self, owner: &OwnerId, task: &TaskKey) -> Result<bool, StoreError>;

    /// Entries in claim order.
    fn entries(&self, owner: &OwnerId) -> Result<Vec<TaskKey>, StoreError>;

    /// Owners whose index has at least one entry.
    fn owners(&self) -> Result<Vec<OwnerId>, StoreError>;
}

/// Both halves of the shared store, as the board needs them.
pub trait LeaseStore: ClaimStore + AgentIndex {}

impl<T: ClaimStore + AgentIndex> LeaseStore for T {}
