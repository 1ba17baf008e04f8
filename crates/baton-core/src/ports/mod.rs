//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! ClaimBoard はここにある trait だけに依存し、共有ストアや時計の
//! 実装の詳細を知りません。

pub mod claim_store;
pub mod clock;
pub mod id_generator;

pub use self::claim_store::{AgentIndex, ClaimStore, CreateOutcome, DeleteOutcome, LeaseStore};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{OwnerIdGenerator, UlidOwnerIdGenerator};
