//! # inject 子命令 CLI 定义
//!
//! 批量写入容器元数据
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/inject.rs`

use super::{EngineArgs, ExecutionArgs};
use clap::Args;
use std::path::PathBuf;

/// inject 子命令参数
#[derive(Args, Debug)]
pub struct InjectArgs {
    /// Video file(s) to process
    #[arg(short, long, num_args = 1..)]
    pub input: Vec<PathBuf>,

    /// Directory to scan for videos (mp4, avi, mkv, mov, wmv, flv, webm, m4v)
    #[arg(short, long)]
    pub directory: Option<PathBuf>,

    /// File name pattern(s) for directory scan (comma-separated, e.g. 'trip_*,*.mkv')
    #[arg(long)]
    pub pattern: Option<String>,

    /// Scan the directory recursively
    #[arg(short, long, default_value_t = false)]
    pub recursive: bool,

    /// Output directory (default: next to each source)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Metadata as key=value pairs
    #[arg(short, long, num_args = 1.., required = true, value_name = "KEY=VALUE")]
    pub metadata: Vec<String>,

    /// Suffix inserted before the extension of output files
    #[arg(short, long, default_value = "_metadata")]
    pub suffix: String,

    #[command(flatten)]
    pub execution: ExecutionArgs,

    #[command(flatten)]
    pub engine: EngineArgs,

    /// Write a per-file CSV report
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Show the planned outputs and engine command without running it
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}
