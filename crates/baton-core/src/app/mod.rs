//! App - アプリケーション層
//!
//! ports を組み合わせて lease 操作を実装します。
//!
//! # 主要コンポーネント
//! - **ClaimBoard**: claim / release / list（board.rs）、sweep（sweep.rs）、status（status.rs）
//! - **BoardBuilder**: ClaimBoard の構築とワイヤリング
//! - **SweepLoop**: sweep を定期実行する任意のドライバ

pub mod board;
pub mod builder;
pub mod status;
pub mod sweep;
pub mod sweep_loop;

pub use self::board::{ClaimBoard, DEFAULT_RECENT_WINDOW_SECS, TaskList};
pub use self::builder::{BoardBuilder, BuildError};
pub use self::status::{LeaseView, RecentClaim, StatusReport};
pub use self::sweep::SweepReport;
pub use self::sweep_loop::SweepLoop;
