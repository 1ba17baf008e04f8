//! OwnerIdGenerator port - owner_id 生成の抽象化
//!
//! owner_id は呼び出し側が決めるものですが、安定した名前を持たない
//! ワーカー（使い捨てのセッションなど）のために生成器を用意します。
//!
//! # 実装
//! - **UlidOwnerIdGenerator**: ULID ベース（`agent-<ULID>`）

use crate::domain::OwnerId;
use crate::ports::Clock;
use ulid::Ulid;

/// OwnerIdGenerator は衝突しない owner_id を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数スレッドから使える）
pub trait OwnerIdGenerator: Send + Sync {
    fn generate_owner_id(&self) -> OwnerId;
}

/// UlidOwnerIdGenerator は ULID ベースの owner_id 生成器
///
/// Clock を使って現在時刻ベースの ULID を生成します。
/// 時刻部分が先頭なので、生成された owner_id は作成順にソートできます。
pub struct UlidOwnerIdGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidOwnerIdGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> OwnerIdGenerator for UlidOwnerIdGenerator<C> {
    fn generate_owner_id(&self) -> OwnerId {
        let timestamp_ms = u64::try_from(self.clock.now().timestamp_millis()).unwrap_or(0);
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        match OwnerId::new(format!("agent-{ulid}")) {
            Ok(owner) => owner,
            Err(_) => unreachable!("formatted owner id is never empty"),
        }
    }
}
