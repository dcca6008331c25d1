//! # interactive 命令实现
//!
//! 引导式会话：选择文件、填写建议字段与自定义字段、确认后执行批次。
//! 无子命令启动时默认进入此模式。
//!
//! ## 依赖关系
//! - 使用 `cli/interactive.rs` 定义的参数
//! - 使用 `console::Term` 读取终端输入
//! - 批次执行复用 `commands/inject.rs` 的 `run_batch`

use crate::batch::FileCollector;
use crate::cli::interactive::InteractiveArgs;
use crate::commands::inject::{run_batch, BatchConfig};
use crate::commands::Outcome;
use crate::engine::FfmpegEngine;
use crate::error::{Result, VidtagError};
use crate::models::task::resolve_path;
use crate::models::{MetadataSet, OutputNaming, TaskSpec};
use crate::utils::output;

use console::Term;
use std::path::PathBuf;

/// 依次询问的建议字段
pub const SUGGESTED_FIELDS: &[&str] = &[
    "title",
    "artist",
    "description",
    "tags",
    "hashtags",
    "category",
    "project",
    "comment",
    "copyright",
    "date",
];

/// 文件最多列出的条数
const RECAP_LIMIT: usize = 10;

/// 行输入来源
pub trait Prompt {
    /// 显示问题并返回去除首尾空白的回答
    fn ask(&mut self, question: &str) -> Result<String>;
}

impl Prompt for Term {
    fn ask(&mut self, question: &str) -> Result<String> {
        self.write_str(question)?;
        self.flush()?;
        Ok(self.read_line()?.trim().to_string())
    }
}

/// 会话收集到的批次输入
#[derive(Debug)]
pub struct SessionInput {
    pub files: Vec<PathBuf>,
    pub metadata: MetadataSet,
}

/// 执行交互式会话
pub fn execute(args: InteractiveArgs) -> Result<Outcome> {
    let mut term = Term::stdout();

    let input = match run_session(&mut term, &args.suffix)? {
        Some(input) => input,
        None => {
            output::print_info("Cancelled, nothing was written");
            return Ok(Outcome::Success);
        }
    };

    let naming = OutputNaming {
        suffix: args.suffix.clone(),
        output_dir: args.output.clone(),
    };
    let config = BatchConfig::new(&args.execution, naming)?;
    let specs = input.files.into_iter().map(TaskSpec::new).collect();
    let engine = FfmpegEngine::new(args.engine.ffmpeg.as_str(), args.engine.ffprobe.as_str());

    run_batch(specs, input.metadata, engine, &config)
}

/// 询问文件与字段，展示摘要并确认；用户拒绝时返回 `None`
pub fn run_session<P: Prompt>(prompt: &mut P, suffix: &str) -> Result<Option<SessionInput>> {
    output::print_header("Video Metadata Injection");

    let files = choose_files(prompt, suffix)?;
    if files.is_empty() {
        return Err(VidtagError::NoFilesFound);
    }
    output::print_success(&format!("{} file(s) selected", files.len()));

    let metadata = ask_fields(prompt)?;
    if metadata.is_empty() {
        return Err(VidtagError::InvalidArgument(
            "no metadata fields given".to_string(),
        ));
    }

    print_recap(&files, &metadata);

    let answer = prompt.ask("Proceed? [y/N]: ")?;
    if !is_yes(&answer) {
        return Ok(None);
    }

    Ok(Some(SessionInput { files, metadata }))
}

fn choose_files<P: Prompt>(prompt: &mut P, suffix: &str) -> Result<Vec<PathBuf>> {
    println!("  1) A single video file");
    println!("  2) Several files (comma-separated paths)");
    println!("  3) Every video in a folder");

    match prompt.ask("Choice [1-3]: ")?.as_str() {
        "1" => {
            let path = unquote(&prompt.ask("Video file: ")?);
            if !path.is_file() {
                return Err(VidtagError::InvalidArgument(format!(
                    "File not found: {}",
                    path.display()
                )));
            }
            Ok(vec![resolve_path(&path)])
        }
        "2" => {
            let answer = prompt.ask("Video files: ")?;
            let mut files = Vec::new();
            for part in answer.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let path = unquote(part);
                if path.is_file() {
                    files.push(resolve_path(&path));
                } else {
                    output::print_warning(&format!("Skipping missing file: {}", path.display()));
                }
            }
            Ok(files)
        }
        "3" => {
            let dir = unquote(&prompt.ask("Folder: ")?);
            let recursive = is_yes(&prompt.ask("Include subfolders? [y/N]: ")?);
            let files = FileCollector::new(dir)
                .recursive(recursive)
                .exclude_suffix(suffix)
                .collect()?;
            Ok(files.iter().map(|p| resolve_path(p)).collect())
        }
        other => Err(VidtagError::InvalidArgument(format!(
            "Unknown choice '{}'",
            other
        ))),
    }
}

fn ask_fields<P: Prompt>(prompt: &mut P) -> Result<MetadataSet> {
    output::print_separator();
    output::print_info("Fill in the fields to write (Enter to skip)");

    let mut pairs: Vec<(String, String)> = Vec::new();
    for field in SUGGESTED_FIELDS {
        let value = prompt.ask(&format!("  {}: ", field))?;
        if !value.is_empty() {
            pairs.push((field.to_string(), value));
        }
    }

    output::print_info("Custom fields (empty name to finish)");
    loop {
        let key = prompt.ask("  name: ")?;
        if key.is_empty() {
            break;
        }
        let value = prompt.ask(&format!("  {}: ", key))?;
        if value.is_empty() {
            output::print_skip(&format!("{} left empty", key));
            continue;
        }
        pairs.push((key, value));
    }

    MetadataSet::from_pairs(pairs)
}

fn print_recap(files: &[PathBuf], metadata: &MetadataSet) {
    output::print_header("Summary");

    output::print_info(&format!("Files ({}):", files.len()));
    for file in files.iter().take(RECAP_LIMIT) {
        println!("    {}", file.display());
    }
    if files.len() > RECAP_LIMIT {
        println!("    ... and {} more", files.len() - RECAP_LIMIT);
    }

    output::print_info(&format!("Fields ({}):", metadata.len()));
    for (key, value) in metadata.iter() {
        output::print_tag(key, value);
    }
    output::print_separator();
}

/// 去掉拖放路径时终端附带的引号
fn unquote(answer: &str) -> PathBuf {
    PathBuf::from(answer.trim().trim_matches(|c| c == '"' || c == '\''))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.to_lowercase().as_str(), "y" | "yes")
}
