//! # inject 命令实现
//!
//! 批量向视频容器写入元数据（流拷贝，不重新编码）。
//!
//! ## 功能
//! - 合并显式文件列表与目录扫描结果
//! - 生成任务并在固定大小的 worker 池上执行
//! - Ctrl-C 中断：不再启动新文件，终止进行中的引擎并清理部分输出
//! - 摘要、失败表格与可选 CSV 报告
//!
//! ## 依赖关系
//! - 使用 `cli/inject.rs` 定义的参数
//! - 使用 `batch/`, `engine/`, `models/`
//! - 使用 `utils/output.rs`, `utils/progress.rs`

use crate::batch::collector::merge_inputs;
use crate::batch::{aggregator, Aggregator, BatchStats, CancelToken, Dispatcher, FileCollector};
use crate::cli::inject::InjectArgs;
use crate::cli::ExecutionArgs;
use crate::commands::Outcome;
use crate::engine::adapter::partial_affixes;
use crate::engine::{EngineAdapter, FfmpegEngine, OverwritePolicy, RemuxRequest};
use crate::error::{Result, VidtagError};
use crate::models::task::resolve_path;
use crate::models::{
    plan_tasks, ErrorKind, MetadataSet, OutputNaming, ReportRow, Task, TaskResult, TaskSpec,
};
use crate::utils::output::{self, TaskStatus};
use crate::utils::progress;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tabled::{Table, Tabled};
use tracing::{debug, warn};

/// 批量注入配置，由命令行参数生成
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub naming: OutputNaming,
    pub concurrency: usize,
    pub timeout: Option<Duration>,
    pub retries: u32,
    pub overwrite: OverwritePolicy,
    pub report: Option<PathBuf>,
    pub dry_run: bool,
}

impl BatchConfig {
    pub fn new(execution: &ExecutionArgs, naming: OutputNaming) -> Result<Self> {
        let concurrency = match execution.threads {
            Some(0) => {
                return Err(VidtagError::InvalidArgument(
                    "--threads must be at least 1".to_string(),
                ))
            }
            Some(n) => n,
            None => num_cpus::get(),
        };

        Ok(Self {
            naming,
            concurrency,
            timeout: (execution.timeout > 0).then(|| Duration::from_secs(execution.timeout)),
            retries: execution.retries,
            overwrite: if execution.overwrite {
                OverwritePolicy::Replace
            } else {
                OverwritePolicy::Fail
            },
            report: None,
            dry_run: false,
        })
    }
}

/// 执行 inject 命令
pub fn execute(args: InjectArgs) -> Result<Outcome> {
    output::print_header("Video Metadata Injection");

    // 元数据为所有任务共享，解析失败则整个批次中止
    let metadata = MetadataSet::build(&args.metadata)?;

    let files = gather_inputs(&args)?;

    let naming = OutputNaming {
        suffix: args.suffix.clone(),
        output_dir: args.output.clone(),
    };
    let mut config = BatchConfig::new(&args.execution, naming)?;
    config.report = args.report.clone();
    config.dry_run = args.dry_run;

    let specs = files.into_iter().map(TaskSpec::new).collect();
    let engine = FfmpegEngine::new(args.engine.ffmpeg.as_str(), args.engine.ffprobe.as_str());
    run_batch(specs, metadata, engine, &config)
}

/// 收集输入文件：`-i` 显式文件 + `-d` 目录扫描
fn gather_inputs(args: &InjectArgs) -> Result<Vec<PathBuf>> {
    if args.input.is_empty() && args.directory.is_none() {
        return Err(VidtagError::NoFilesFound);
    }

    let explicit: Vec<PathBuf> = args.input.iter().map(|p| resolve_path(p)).collect();

    let scanned = match &args.directory {
        Some(dir) => {
            let mut collector = FileCollector::new(dir.clone())
                .recursive(args.recursive)
                .exclude_suffix(&args.suffix);
            if let Some(pattern) = &args.pattern {
                collector = collector.with_pattern(pattern)?;
            }
            let files = collector.collect()?;
            output::print_info(&format!(
                "Found {} video files in '{}'",
                files.len(),
                dir.display()
            ));
            files.iter().map(|p| resolve_path(p)).collect()
        }
        None => Vec::new(),
    };

    Ok(merge_inputs(explicit, scanned))
}

/// 规划并执行一个批次（inject 与 interactive 共用）
pub fn run_batch(
    specs: Vec<TaskSpec>,
    metadata: MetadataSet,
    engine: FfmpegEngine,
    config: &BatchConfig,
) -> Result<Outcome> {
    if metadata.is_empty() {
        return Err(VidtagError::InvalidArgument(
            "no metadata fields given".to_string(),
        ));
    }

    let field_count = metadata.len();
    let tasks = plan_tasks(specs, Arc::new(metadata), &config.naming)?;

    output::print_info(&format!("Files to process: {}", tasks.len()));
    output::print_info(&format!("Parallel workers: {}", config.concurrency));
    output::print_info(&format!("Metadata fields:  {}", field_count));

    if tasks.is_empty() {
        output::print_warning("No video files found, nothing to do");
        aggregator::render(&Aggregator::new(0).finalize());
        return Ok(Outcome::Success);
    }

    let adapter = EngineAdapter::new(engine)
        .with_overwrite(config.overwrite)
        .with_timeout(config.timeout);

    if config.dry_run {
        print_plan(adapter.engine(), &tasks);
        return Ok(Outcome::Success);
    }

    let version = adapter.engine().probe_version()?;
    output::print_info(&format!("Engine: {}", version));

    let cancel = CancelToken::new();
    if let Err(e) = cancel.install_interrupt_handler() {
        warn!(error = %e, "interrupt handler not installed");
    }

    let adapter = Arc::new(adapter);
    let dispatcher = Dispatcher::new(config.concurrency)
        .with_retries(config.retries)
        .with_cancel(cancel.clone());

    let stats = process_batch(
        tasks,
        &dispatcher,
        move |task, cancel| adapter.inject(task, cancel),
        config.report.as_deref(),
    )?;
    aggregator::render(&stats);

    Ok(outcome_for(&stats, &cancel))
}

/// 分发任务并按到达顺序聚合结果
pub fn process_batch<F>(
    tasks: Vec<Task>,
    dispatcher: &Dispatcher,
    processor: F,
    report: Option<&Path>,
) -> Result<BatchStats>
where
    F: Fn(&Task, &CancelToken) -> TaskResult + Send + Sync + 'static,
{
    let mut writer = match report {
        Some(path) => Some(csv::Writer::from_path(path)?),
        None => None,
    };

    debug!(
        tasks = tasks.len(),
        workers = dispatcher.concurrency(),
        "dispatching batch"
    );
    let stream = dispatcher.run(tasks, processor);
    let mut aggregator = Aggregator::new(stream.expected());
    let pb = progress::create_progress_bar(stream.expected() as u64, "Injecting");

    for result in stream {
        pb.suspend(|| print_result(&result));
        if let Some(writer) = writer.as_mut() {
            writer.serialize(ReportRow::from(&result))?;
        }
        aggregator.observe(&result);
        pb.inc(1);
    }

    pb.finish_and_clear();

    if let (Some(mut writer), Some(path)) = (writer, report) {
        writer.flush().map_err(|e| VidtagError::FileWriteError {
            path: path.display().to_string(),
            source: e,
        })?;
        output::print_success(&format!("Report written to '{}'", path.display()));
    }

    Ok(aggregator.finalize())
}

/// 由统计与中断状态决定退出结果
pub fn outcome_for(stats: &BatchStats, cancel: &CancelToken) -> Outcome {
    if cancel.is_cancelled() {
        Outcome::Interrupted
    } else if stats.all_succeeded() {
        Outcome::Success
    } else {
        Outcome::Failed
    }
}

fn print_result(result: &TaskResult) {
    let name = result.task.display_name();
    let destination = result.task.destination.display().to_string();
    let kind = result.error_kind.map(|k| k.to_string()).unwrap_or_default();
    let message = result.message.as_deref().unwrap_or_default();

    let status = match result.error_kind {
        None => TaskStatus::Written {
            destination: &destination,
            seconds: result.duration.as_secs_f64(),
            attempts: result.attempts,
        },
        Some(ErrorKind::Cancelled) => TaskStatus::Cancelled,
        Some(_) => TaskStatus::Failed {
            kind: &kind,
            reason: message.lines().next().unwrap_or_default(),
        },
    };
    output::print_task(&name, status);
}

/// dry run 计划表格行
#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "#")]
    id: usize,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Destination")]
    destination: String,
}

fn print_plan(engine: &FfmpegEngine, tasks: &[Task]) {
    let rows: Vec<PlanRow> = tasks
        .iter()
        .map(|t| PlanRow {
            id: t.id,
            source: t.source.display().to_string(),
            destination: t.destination.display().to_string(),
        })
        .collect();
    println!("{}", Table::new(rows));

    if let Some(first) = tasks.first() {
        let tags = first.metadata.to_arguments();
        // 实际运行时随机串由 tempfile 生成
        let (prefix, suffix) = partial_affixes(&first.destination);
        let partial = first
            .destination
            .with_file_name(format!("{}XXXXXX{}", prefix, suffix));
        let request = RemuxRequest {
            source: &first.source,
            destination: &partial,
            tags: &tags,
            overwrite: true,
        };
        output::print_info("Engine command for the first file:");
        println!("  {}", engine.command_line(&request));
    }

    output::print_done("Dry run, nothing was written");
}
