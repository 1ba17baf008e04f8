//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **FileClaimStore**: 共有ディレクトリ上のストア（複数プロセス、単一ホスト）
//! - **MemoryClaimStore**: 単一プロセス用（テスト、組み込み用途）

pub mod file_store;
pub mod memory_store;

pub use self::file_store::FileClaimStore;
pub use self::memory_store::MemoryClaimStore;
