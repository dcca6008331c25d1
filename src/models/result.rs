//! # 任务结果模型
//!
//! 每个任务恰好产生一个 `TaskResult`，由聚合器恰好消费一次。
//!
//! ## 依赖关系
//! - 被 `engine/adapter.rs` 产生
//! - 被 `batch/aggregator.rs` 消费

use crate::models::Task;

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// 单任务失败类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// 源文件不存在或不可读
    NotFound,
    /// 引擎无法打开容器
    UnsupportedFormat,
    /// 目标已存在且不允许覆盖
    DestinationConflict,
    /// 引擎非零退出
    EngineFailure,
    /// 引擎成功退出但回读标签不完整
    VerificationFailure,
    /// 超过单任务时限
    Timeout,
    /// 批次被用户中断
    Cancelled,
}

impl ErrorKind {
    /// 调度器是否可以重试
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::EngineFailure)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::UnsupportedFormat => "UnsupportedFormat",
            ErrorKind::DestinationConflict => "DestinationConflict",
            ErrorKind::EngineFailure => "EngineFailure",
            ErrorKind::VerificationFailure => "VerificationFailure",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

/// 单任务处理结果，创建后不再修改
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub task: Task,
    pub success: bool,
    pub error_kind: Option<ErrorKind>,
    pub duration: Duration,
    pub input_bytes: u64,
    pub output_bytes: u64,
    /// 实际调用次数（含重试）
    pub attempts: u32,
    pub message: Option<String>,
}

impl TaskResult {
    pub fn succeeded(task: Task, duration: Duration, input_bytes: u64, output_bytes: u64) -> Self {
        Self {
            task,
            success: true,
            error_kind: None,
            duration,
            input_bytes,
            output_bytes,
            attempts: 1,
            message: None,
        }
    }

    pub fn failed(task: Task, kind: ErrorKind, duration: Duration, message: impl Into<String>) -> Self {
        Self {
            task,
            success: false,
            error_kind: Some(kind),
            duration,
            input_bytes: 0,
            output_bytes: 0,
            attempts: 1,
            message: Some(message.into()),
        }
    }

    /// 未被执行的任务（批次中断后仍在队列中）
    pub fn cancelled(task: Task) -> Self {
        Self {
            attempts: 0,
            ..Self::failed(task, ErrorKind::Cancelled, Duration::ZERO, "batch interrupted")
        }
    }

    pub fn with_input_bytes(mut self, bytes: u64) -> Self {
        self.input_bytes = bytes;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn duration_ms(&self) -> u64 {
        u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX)
    }
}

/// CSV 报告中的一行
#[derive(Debug, Serialize)]
pub struct ReportRow {
    pub id: usize,
    pub source: String,
    pub destination: String,
    pub success: bool,
    pub error_kind: Option<ErrorKind>,
    pub duration_ms: u64,
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub attempts: u32,
    pub message: String,
}

impl From<&TaskResult> for ReportRow {
    fn from(result: &TaskResult) -> Self {
        ReportRow {
            id: result.task.id,
            source: result.task.source.display().to_string(),
            destination: result.task.destination.display().to_string(),
            success: result.success,
            error_kind: result.error_kind,
            duration_ms: result.duration_ms(),
            input_bytes: result.input_bytes,
            output_bytes: result.output_bytes,
            attempts: result.attempts,
            message: result.message.clone().unwrap_or_default(),
        }
    }
}
