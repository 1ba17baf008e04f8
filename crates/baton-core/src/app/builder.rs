//! BoardBuilder - ClaimBoard の構築とワイヤリング
//!
//! # Fail-fast 設計
//! - ストア未指定や TTL 0 は build() 時に BuildError を返す
//! - Clock を指定しなければ SystemClock を使う

use std::sync::Arc;

use chrono::Duration;

use crate::config::BoardConfig;
use crate::domain::{DEFAULT_TTL_SECS, StoreError};
use crate::impls::FileClaimStore;
use crate::ports::{Clock, LeaseStore, SystemClock};

use super::board::{ClaimBoard, DEFAULT_RECENT_WINDOW_SECS};

/// BoardBuilder は ClaimBoard を構築
///
/// # 使用例
/// ```ignore
/// let board = BoardBuilder::new()
///     .store(MemoryClaimStore::new())
///     .clock(FixedClock::new(start))
///     .default_ttl_secs(120)
///     .build()?;
/// ```
pub struct BoardBuilder {
    store: Option<Arc<dyn LeaseStore>>,
    clock: Option<Arc<dyn Clock>>,
    default_ttl_secs: u64,
    recent_window_secs: u64,
}

/// BuildError は ClaimBoard 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no claim store configured")]
    MissingStore,

    #[error("default ttl must be at least one second")]
    ZeroTtl,

    #[error("failed to open claim store: {0}")]
    Store(#[from] StoreError),
}

impl BoardBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            clock: None,
            default_ttl_secs: DEFAULT_TTL_SECS,
            recent_window_secs: DEFAULT_RECENT_WINDOW_SECS,
        }
    }

    /// File store and timings from a loaded config.
    pub fn from_config(config: &BoardConfig) -> Result<Self, BuildError> {
        let store = FileClaimStore::open(&config.root)?;
        Ok(Self::new()
            .store(store)
            .default_ttl_secs(config.default_ttl_secs)
            .recent_window_secs(config.recent_window_secs))
    }

    pub fn store(self, store: impl LeaseStore + 'static) -> Self {
        self.shared_store(Arc::new(store))
    }

    /// Uses a store that the caller keeps a handle to.
    pub fn shared_store(mut self, store: Arc<dyn LeaseStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(self, clock: impl Clock + 'static) -> Self {
        self.shared_clock(Arc::new(clock))
    }

    pub fn shared_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn default_ttl_secs(mut self, secs: u64) -> Self {
        self.default_ttl_secs = secs;
        self
    }

    pub fn recent_window_secs(mut self, secs: u64) -> Self {
        self.recent_window_secs = secs;
        self
    }

    pub fn build(self) -> Result<ClaimBoard, BuildError> {
        let store = self.store.ok_or(BuildError::MissingStore)?;
        if self.default_ttl_secs == 0 {
            return Err(BuildError::ZeroTtl);
        }
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let window = i64::try_from(self.recent_window_secs).unwrap_or(i64::MAX);
        Ok(ClaimBoard {
            store,
            clock,
            default_ttl_secs: self.default_ttl_secs,
            recent_window: Duration::try_seconds(window).unwrap_or(Duration::MAX),
        })
    }
}

impl Default for BoardBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OwnerId, TaskKey};
    use crate::impls::MemoryClaimStore;
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_build_success() {
        let board = BoardBuilder::new()
            .store(MemoryClaimStore::new())
            .default_ttl_secs(42)
            .build()
            .unwrap();
        assert_eq!(board.default_ttl_secs(), 42);
    }

    #[test]
    fn test_build_missing_store() {
        let board = BoardBuilder::new().build();
        assert!(matches!(board, Err(BuildError::MissingStore)));
    }

    #[test]
    fn test_build_zero_ttl() {
        let board = BoardBuilder::new()
            .store(MemoryClaimStore::new())
            .default_ttl_secs(0)
            .build();
        assert!(matches!(board, Err(BuildError::ZeroTtl)));
    }

    #[test]
    fn test_build_uses_given_clock() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let board = BoardBuilder::new()
            .store(MemoryClaimStore::new())
            .clock(FixedClock::new(start))
            .build()
            .unwrap();
        let lease = board
            .claim(&TaskKey::new("t").unwrap(), &OwnerId::new("o").unwrap())
            .unwrap();
        assert_eq!(lease.claimed_at, start);
    }

    #[test]
    fn test_from_config_opens_file_store() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = BoardConfig {
            root: temp.path().join("board"),
            default_ttl_secs: 90,
            ..BoardConfig::default()
        };
        let board = BoardBuilder::from_config(&config).unwrap().build().unwrap();
        assert_eq!(board.default_ttl_secs(), 90);
        assert!(temp.path().join("board/claims").is_dir());
    }
}
