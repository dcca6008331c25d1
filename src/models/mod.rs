//! # 数据模型模块
//!
//! 定义元数据集合、任务与任务结果。
//!
//! ## 依赖关系
//! - 被 `engine/`, `batch/` 和 `commands/` 使用
//! - 子模块: metadata, task, result

pub mod metadata;
pub mod result;
pub mod task;

pub use metadata::MetadataSet;
pub use result::{ErrorKind, ReportRow, TaskResult};
pub use task::{plan_tasks, OutputNaming, Task, TaskSpec};
