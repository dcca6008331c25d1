//! # 任务模型
//!
//! 一个任务 = 一个已解析的源文件 + 计算出的目标路径 + 共享的元数据。
//!
//! ## 依赖关系
//! - 被 `batch/`, `engine/`, `commands/` 使用
//! - 使用 `models/metadata.rs`

use crate::error::{Result, VidtagError};
use crate::models::MetadataSet;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 输入规格：源文件与可选的显式目标
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub source: PathBuf,
    pub destination: Option<PathBuf>,
}

impl TaskSpec {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: None,
        }
    }
}

/// 输出文件命名规则
#[derive(Debug, Clone)]
pub struct OutputNaming {
    /// 插入扩展名之前的后缀
    pub suffix: String,
    /// 输出目录（默认与源文件同目录）
    pub output_dir: Option<PathBuf>,
}

impl Default for OutputNaming {
    fn default() -> Self {
        Self {
            suffix: "_metadata".to_string(),
            output_dir: None,
        }
    }
}

impl OutputNaming {
    /// `<dir>/<stem><suffix><.ext>`
    pub fn destination_for(&self, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());

        let file_name = match source.extension() {
            Some(ext) => format!("{}{}.{}", stem, self.suffix, ext.to_string_lossy()),
            None => format!("{}{}", stem, self.suffix),
        };

        let dir = match &self.output_dir {
            Some(dir) => dir.clone(),
            None => source
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        };

        dir.join(file_name)
    }
}

/// 单个处理任务，创建后不可变
#[derive(Debug, Clone)]
pub struct Task {
    /// 提交序号
    pub id: usize,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub metadata: Arc<MetadataSet>,
}

impl Task {
    /// 源文件名（用于显示）
    pub fn display_name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.source.display().to_string())
    }
}

/// 解析为绝对路径；不存在的文件保持原名，由适配器报告 NotFound
pub fn resolve_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// 由输入规格生成任务列表
///
/// 目标路径重复、与源文件相同或与批次内任一源文件相同，
/// 都属于批次级错误，在分发前中止。
pub fn plan_tasks(
    specs: Vec<TaskSpec>,
    metadata: Arc<MetadataSet>,
    naming: &OutputNaming,
) -> Result<Vec<Task>> {
    let resolved: Vec<(PathBuf, PathBuf)> = specs
        .into_iter()
        .map(|spec| {
            let source = resolve_path(&spec.source);
            let destination = match spec.destination {
                Some(dest) => resolve_path(&dest),
                None => resolve_path(&naming.destination_for(&source)),
            };
            (source, destination)
        })
        .collect();

    let sources: HashSet<&Path> = resolved.iter().map(|(s, _)| s.as_path()).collect();
    let mut seen = HashSet::new();
    let mut tasks = Vec::with_capacity(resolved.len());

    for (id, (source, destination)) in resolved.iter().enumerate() {
        if *destination == *source {
            return Err(VidtagError::InvalidArgument(format!(
                "destination equals source for '{}' (use a non-empty suffix or an output directory)",
                source.display()
            )));
        }
        if sources.contains(destination.as_path()) {
            return Err(VidtagError::InvalidArgument(format!(
                "output of '{}' would overwrite the input '{}'",
                source.display(),
                destination.display()
            )));
        }
        if !seen.insert(destination.as_path()) {
            return Err(VidtagError::InvalidArgument(format!(
                "several inputs map to the same destination '{}'",
                destination.display()
            )));
        }

        tasks.push(Task {
            id,
            source: source.clone(),
            destination: destination.clone(),
            metadata: Arc::clone(&metadata),
        });
    }

    Ok(tasks)
}
