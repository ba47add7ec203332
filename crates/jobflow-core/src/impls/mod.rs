//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryQueueChannel**: 開発・テスト用の配送キュー
//! - **InMemoryJobStore**: 開発・テスト用の正本
//! - **RedisQueueChannel**: 本番用の配送キュー（feature `redis-backend`）
//! - **RedisJobStore**: 複数プロセスで共有する正本（feature `redis-backend`）
//! - **executors**: 組み込みの Executor（シミュレーション）

pub mod executors;
pub mod inmem_queue;
pub mod inmem_store;
#[cfg(feature = "redis-backend")]
pub mod redis_queue;
#[cfg(feature = "redis-backend")]
pub mod redis_store;

// 主要な型を再エクスポート
pub use self::executors::{AlwaysFail, SimulatedDurations, SimulatedWork};
pub use self::inmem_queue::InMemoryQueueChannel;
pub use self::inmem_store::InMemoryJobStore;
#[cfg(feature = "redis-backend")]
pub use self::redis_queue::RedisQueueChannel;
#[cfg(feature = "redis-backend")]
pub use self::redis_store::RedisJobStore;
