//! jobflow-core
//!
//! Core building blocks for the jobflow orchestrator: jobs are submitted,
//! queued by id, executed by workers off the request path, retried a bounded
//! number of times and dead-lettered when retries run out.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, state, job, spec, outcome, decision, errors）
//! - **ports**: 抽象化レイヤー（JobStore, QueueChannel, Executor, Clock, IdGenerator）
//! - **impls**: 実装（InMemoryJobStore, InMemoryQueueChannel, RedisQueueChannel, RedisJobStore, 組み込み Executor）
//! - **app**: アプリケーションロジック（builder, lifecycle, worker_loop, reaper_loop, status, など）
//! - **config**: 実行時設定
//! - **http**: axum による投入・照会 API

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod impls;
pub mod ports;

pub use config::{JobflowConfig, RetryPlacement};
pub use error::JobflowError;
