//! # read 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/read.rs`

use super::EngineArgs;
use clap::Args;
use std::path::PathBuf;

/// read 子命令参数
#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Video file to inspect
    pub file: PathBuf,

    /// Print tags as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[command(flatten)]
    pub engine: EngineArgs,
}
