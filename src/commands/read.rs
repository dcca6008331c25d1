//! # read 命令实现
//!
//! 打印单个视频文件的容器级标签。
//!
//! ## 依赖关系
//! - 使用 `cli/read.rs` 定义的参数
//! - 使用 `engine/adapter.rs` 回读标签
//! - 使用 `utils/output.rs`, `utils/progress.rs`

use crate::cli::read::ReadArgs;
use crate::commands::Outcome;
use crate::engine::{EngineAdapter, FfmpegEngine};
use crate::error::{Result, VidtagError};
use crate::models::task::resolve_path;
use crate::models::MetadataSet;
use crate::utils::{output, progress};

use std::collections::BTreeMap;
use tabled::{Table, Tabled};

/// 标签表格行
#[derive(Tabled)]
struct TagRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// 执行 read 命令
pub fn execute(args: ReadArgs) -> Result<Outcome> {
    let engine = FfmpegEngine::new(args.engine.ffmpeg.as_str(), args.engine.ffprobe.as_str());
    let adapter = EngineAdapter::new(engine);
    let path = resolve_path(&args.file);

    let spinner = progress::create_spinner("Reading tags...");
    let tags = adapter.read(&path);
    spinner.finish_and_clear();
    let tags = tags?;

    if args.json {
        println!("{}", to_json(&tags)?);
        return Ok(Outcome::Success);
    }

    output::print_header(&format!("Tags of {}", path.display()));
    if tags.is_empty() {
        output::print_warning("No metadata found");
    } else {
        let rows: Vec<TagRow> = tags
            .iter()
            .map(|(key, value)| TagRow {
                key: key.to_string(),
                value: value.to_string(),
            })
            .collect();
        println!("{}", Table::new(rows));
    }

    Ok(Outcome::Success)
}

fn to_json(tags: &MetadataSet) -> Result<String> {
    let map: BTreeMap<&str, &str> = tags.iter().collect();
    serde_json::to_string_pretty(&map).map_err(|e| VidtagError::Other(e.to_string()))
}
