//! # 统一错误处理模块
//!
//! 定义 vidtag 的批次级错误类型，使用 `thiserror` 派生。
//! 单个任务的失败不在此处，而是作为数据记录在 `models::result::ErrorKind` 中。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// vidtag 统一错误类型
#[derive(Error, Debug)]
pub enum VidtagError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 元数据错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid metadata token '{token}': {reason}")]
    ParseError { token: String, reason: String },

    #[error("Failed to read tags from {path}\nReason: {reason}")]
    ReadError { path: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // 外部命令错误
    // ─────────────────────────────────────────────────────────────
    #[error("External command '{command}' not found in PATH")]
    CommandNotFound { command: String },

    #[error("External command failed: {command}\n{stderr}")]
    CommandFailed { command: String, stderr: String },

    // ─────────────────────────────────────────────────────────────
    // 参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No video files to process")]
    NoFilesFound,

    #[error("Failed to read from terminal")]
    PromptError(#[from] std::io::Error),

    // ─────────────────────────────────────────────────────────────
    // 报告错误
    // ─────────────────────────────────────────────────────────────
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    // ─────────────────────────────────────────────────────────────
    // 其他
    // ─────────────────────────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, VidtagError>;
