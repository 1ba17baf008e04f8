//! baton-core
//!
//! Lease-based task claims for cooperating agents that share one working tree.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（TaskKey / OwnerId, Lease, errors, listing）
//! - **ports**: 抽象化レイヤー（ClaimStore, AgentIndex, Clock, OwnerIdGenerator）
//! - **impls**: 実装（FileClaimStore: 本番用, MemoryClaimStore: テスト・単一プロセス用）
//! - **app**: アプリケーションロジック（ClaimBoard, BoardBuilder, Status, SweepLoop）
//! - **config**: BoardConfig（TOML + 環境変数）
//!
//! # Trust model
//! Owner identity is asserted by the caller and never authenticated. The
//! owner check in `release` guards against accidents between cooperating
//! agents, not against a hostile one.

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{BoardBuilder, ClaimBoard, StatusReport, SweepLoop};
pub use config::BoardConfig;
pub use domain::{ClaimError, Lease, ListedTask, OwnerId, StoreError, TaskKey, TaskStatus};
