//! # 媒体引擎模块
//!
//! 外部媒体处理工具的两操作契约（重封装写标签 / 读取标签）及其适配器。
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 使用 `models/`, `batch/cancel.rs`
//! - 子模块: process, ffmpeg, adapter

pub mod adapter;
pub mod ffmpeg;
pub mod process;

#[cfg(test)]
pub mod testing;

pub use adapter::{EngineAdapter, OverwritePolicy};
pub use ffmpeg::FfmpegEngine;
pub use process::InvocationControl;

use std::path::Path;

/// 一次重封装请求
#[derive(Debug, Clone, Copy)]
pub struct RemuxRequest<'a> {
    pub source: &'a Path,
    pub destination: &'a Path,
    /// 已转义的标签参数对，顺序即参数顺序
    pub tags: &'a [(String, String)],
    pub overwrite: bool,
}

/// 重封装调用的结束方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemuxOutcome {
    /// 退出码为 0
    Completed,
    /// 引擎无法打开输入容器或无法写出该容器
    Rejected { stderr: String },
    /// 其他非零退出
    Failed { code: Option<i32>, stderr: String },
    TimedOut,
    Cancelled,
}

/// 引擎调用本身失败（而非媒体处理失败）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// 可执行文件无法启动
    Spawn { command: String, reason: String },
    /// 内省失败：无法解析容器
    Unreadable { reason: String },
    TimedOut,
    Cancelled,
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Spawn { command, reason } => {
                write!(f, "failed to run '{}': {}", command, reason)
            }
            EngineError::Unreadable { reason } => write!(f, "{}", reason),
            EngineError::TimedOut => write!(f, "timed out"),
            EngineError::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// 外部媒体引擎契约
///
/// 实现必须可在多个 worker 线程间共享。
pub trait MediaEngine: Send + Sync {
    /// 流拷贝重封装并写入容器级标签
    fn remux(&self, request: &RemuxRequest<'_>, control: &InvocationControl) -> RemuxOutcome;

    /// 读取容器级标签（原始值，未反转义）
    fn introspect(
        &self,
        path: &Path,
        control: &InvocationControl,
    ) -> Result<Vec<(String, String)>, EngineError>;
}
