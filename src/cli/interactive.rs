//! # interactive 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/interactive.rs`

use super::{EngineArgs, ExecutionArgs};
use clap::Args;
use std::path::PathBuf;

/// interactive 子命令参数
#[derive(Args, Debug)]
pub struct InteractiveArgs {
    /// Output directory (default: next to each source)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Suffix inserted before the extension of output files
    #[arg(short, long, default_value = "_metadata")]
    pub suffix: String,

    #[command(flatten)]
    pub execution: ExecutionArgs,

    #[command(flatten)]
    pub engine: EngineArgs,
}
