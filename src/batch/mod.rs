//! # 批量处理模块
//!
//! 提供批量任务的收集、调度与结果汇总。
//!
//! ## 功能
//! - 收集匹配的视频文件列表
//! - 固定大小 worker 池并行处理
//! - 取消信号
//! - 统计与摘要
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 使用 `rayon`, `crossbeam-channel` 进行并行处理
//! - 子模块: cancel, collector, dispatcher, aggregator

pub mod aggregator;
pub mod cancel;
pub mod collector;
pub mod dispatcher;

pub use aggregator::{Aggregator, BatchStats};
pub use cancel::CancelToken;
pub use collector::FileCollector;
pub use dispatcher::Dispatcher;
