//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **AppBuilder / App**: アプリケーションの構築とワイヤリング
//! - **ExecutorRegistry**: job_type → Executor の対応表
//! - **Lifecycle**: 試行結果の適用（完了 / リトライ / DLQ）
//! - **Submitter**: 投入と照会
//! - **WorkerLoop / WorkerGroup**: ジョブ実行ループ（pop→start→execute→settle）
//! - **ReaperLoop**: Lease 期限切れの回収
//! - **Stats**: キュー深さとステータス別件数

pub mod builder;
pub mod lifecycle;
pub mod reaper_loop;
pub mod registry;
pub mod status;
pub mod submission;
pub mod worker_loop;

// 主要な型を再エクスポート
pub use self::builder::{App, AppBuilder, BuildError};
pub use self::lifecycle::{CycleOutcome, Lifecycle};
pub use self::reaper_loop::ReaperLoop;
pub use self::registry::{ExecutorRegistry, RegistryError};
pub use self::status::{Stats, StatsSnapshot};
pub use self::submission::Submitter;
pub use self::worker_loop::{WorkerGroup, WorkerLoop};
