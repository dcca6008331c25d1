//! # 文件收集器
//!
//! 根据输入目录和模式收集待处理的视频文件列表。
//!
//! ## 功能
//! - 按视频扩展名过滤（不区分大小写）
//! - 可选 glob 模式（逗号分隔多模式）
//! - 可选递归搜索
//! - 跳过隐藏文件与已带输出后缀的文件
//!
//! ## 依赖关系
//! - 被 `commands/inject.rs`, `commands/interactive.rs` 调用
//! - 使用 `walkdir` 遍历目录，`glob` 匹配文件名

use crate::error::{Result, VidtagError};

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 识别为视频的扩展名
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv", "mov", "wmv", "flv", "webm", "m4v"];

/// 视频文件收集器
pub struct FileCollector {
    /// 输入目录
    input: PathBuf,
    /// 匹配模式列表
    patterns: Vec<glob::Pattern>,
    /// 是否递归
    recursive: bool,
    /// 以此结尾的文件名主干视为已处理的输出
    exclude_suffix: Option<String>,
}

impl FileCollector {
    /// 创建新的文件收集器
    pub fn new(input: PathBuf) -> Self {
        Self {
            input,
            patterns: Vec::new(),
            recursive: false,
            exclude_suffix: None,
        }
    }

    /// 设置匹配模式（逗号分隔的多模式）
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self> {
        self.patterns = pattern
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                glob::Pattern::new(s).map_err(|e| {
                    VidtagError::InvalidArgument(format!("Invalid pattern '{}': {}", s, e))
                })
            })
            .collect::<Result<_>>()?;
        Ok(self)
    }

    /// 设置是否递归搜索
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// 跳过文件名主干以该后缀结尾的文件
    pub fn exclude_suffix(mut self, suffix: &str) -> Self {
        self.exclude_suffix = (!suffix.is_empty()).then(|| suffix.to_string());
        self
    }

    /// 收集所有匹配的文件（已排序）
    pub fn collect(&self) -> Result<Vec<PathBuf>> {
        if !self.input.is_dir() {
            return Err(VidtagError::DirectoryNotFound {
                path: self.input.display().to_string(),
            });
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };

        let mut files: Vec<PathBuf> = WalkDir::new(&self.input)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|path| self.accepts(path))
            .collect();

        files.sort();
        Ok(files)
    }

    fn accepts(&self, path: &Path) -> bool {
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => return false,
        };

        if name.starts_with('.') || !is_video_file(path) {
            return false;
        }

        if let (Some(suffix), Some(stem)) = (
            &self.exclude_suffix,
            path.file_stem().and_then(|s| s.to_str()),
        ) {
            if stem.ends_with(suffix.as_str()) {
                return false;
            }
        }

        self.patterns.is_empty() || self.patterns.iter().any(|p| p.matches(name))
    }
}

/// 扩展名是否属于视频容器
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| VIDEO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// 合并显式文件与目录扫描结果，去重并保持稳定顺序
pub fn merge_inputs(explicit: Vec<PathBuf>, scanned: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut seen = BTreeSet::new();
    explicit
        .into_iter()
        .chain(scanned)
        .filter(|p| seen.insert(p.clone()))
        .collect()
}
