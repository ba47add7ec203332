//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部システム（レコードストア、Redis、実処理）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - JobStore が source of truth（正本）
//! - QueueChannel は配送キュー（JobId のみ）
//! - Executor は job_type ごとの実処理（orchestrator からは不透明）

pub mod clock;
pub mod executor;
pub mod id_generator;
pub mod job_store;
pub mod queue_channel;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::executor::{ExecutionContext, Executor};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::job_store::{JobStore, StoreError};
pub use self::queue_channel::{QueueChannel, QueueError};
