//! Errors - エラー型と分類
//!
//! - `StoreError`: 下層ストレージ（ファイル / メモリ）の失敗
//! - `ClaimError`: claim / release などの操作結果の分類

use std::path::PathBuf;

use thiserror::Error;

use super::ids::{OwnerId, TaskKey};
use super::lease::Lease;

/// ErrorKind は操作エラーの運用分類
///
/// - Contention: 他のワーカーと競合した（想定内、アラート不要）
/// - Caller: 呼び出し側の前提が崩れている（存在しない task、別 owner）
/// - Infrastructure: ストレージ障害（呼び出しを中断すべき唯一の分類）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Contention,
    Caller,
    Infrastructure,
}

/// Failure of the backing store itself.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt record {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to lock store: {0}")]
    Lock(String),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Outcome taxonomy of the lease operations.
#[derive(Debug, Error)]
pub enum ClaimError {
    /// `holder` is the lease seen when the create lost; `None` if it vanished before it could be read.
    #[error("task {task} is already claimed{}", holder_suffix(.holder.as_ref()))]
    AlreadyClaimed { task: TaskKey, holder: Option<Lease> },

    #[error("no lease exists for task {0}")]
    NotFound(TaskKey),

    #[error("task {task} is held by {owner}, not {caller}")]
    NotOwner {
        task: TaskKey,
        owner: OwnerId,
        caller: OwnerId,
    },

    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] StoreError),
}

impl ClaimError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClaimError::AlreadyClaimed { .. } => ErrorKind::Contention,
            ClaimError::NotFound(_) | ClaimError::NotOwner { .. } => ErrorKind::Caller,
            ClaimError::StorageUnavailable(_) => ErrorKind::Infrastructure,
        }
    }

    /// Only storage failures should abort the calling operation.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Infrastructure
    }
}

fn holder_suffix(holder: Option<&Lease>) -> String {
    match holder {
        Some(lease) => format!(" by {} until {}", lease.owner_id, lease.expires_at()),
        None => String::new(),
    }
}
