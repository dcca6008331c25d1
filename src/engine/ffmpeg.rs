//! # FFmpeg 引擎
//!
//! 通过 `ffmpeg` 流拷贝重封装写入标签，通过 `ffprobe` 读取容器标签。
//!
//! ## 依赖关系
//! - 实现 `engine::MediaEngine`
//! - 使用 `engine/process.rs` 运行子进程
//! - 使用 `serde_json` 解析 ffprobe 输出

use super::process::{run_bounded, InvocationControl, Termination};
use super::{EngineError, MediaEngine, RemuxOutcome, RemuxRequest};
use crate::error::{Result, VidtagError};

use serde::Deserialize;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// 需要 `use_metadata_tags` 才能保留自定义键的容器
const MOV_FAMILY: &[&str] = &["mp4", "mov", "m4v", "m4a", "3gp"];

/// stderr 中表示容器无法打开或写出的标志
const REJECTION_MARKERS: &[&str] = &[
    "Invalid data found when processing input",
    "moov atom not found",
    "Unknown input format",
    "Unable to find a suitable output format",
    "does not contain any stream",
];

/// 基于 ffmpeg/ffprobe 可执行文件的引擎
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg: String,
    ffprobe: String,
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl FfmpegEngine {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// 检查两个可执行文件是否可用，返回 ffmpeg 版本行
    pub fn probe_version(&self) -> Result<String> {
        let mut version_line = String::new();
        for program in [&self.ffmpeg, &self.ffprobe] {
            let output = Command::new(program)
                .arg("-version")
                .output()
                .map_err(|_| VidtagError::CommandNotFound {
                    command: program.clone(),
                })?;

            if !output.status.success() {
                return Err(VidtagError::CommandFailed {
                    command: format!("{} -version", program),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                });
            }

            if version_line.is_empty() {
                version_line = String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .next()
                    .unwrap_or_default()
                    .to_string();
            }
        }
        Ok(version_line)
    }

    /// 构造 ffmpeg 参数列表（不含程序名）
    pub fn remux_arguments(&self, request: &RemuxRequest<'_>) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-nostdin", "-loglevel", "error", "-i"]
            .iter()
            .map(OsString::from)
            .collect();
        args.push(request.source.as_os_str().to_os_string());
        // 保留全部流（多音轨、字幕），默认选择每种类型只取一条
        args.extend(
            ["-map", "0", "-map_metadata", "0", "-c", "copy"]
                .iter()
                .map(OsString::from),
        );

        if is_mov_family(request.destination) {
            args.extend(["-movflags", "use_metadata_tags"].iter().map(OsString::from));
        }

        for (key, value) in request.tags {
            args.push(OsString::from("-metadata"));
            args.push(OsString::from(format!("{}={}", key, value)));
        }

        args.push(OsString::from(if request.overwrite { "-y" } else { "-n" }));
        args.push(request.destination.as_os_str().to_os_string());
        args
    }

    /// 可读形式的完整命令行（用于日志与 dry run）
    pub fn command_line(&self, request: &RemuxRequest<'_>) -> String {
        let mut line = self.ffmpeg.clone();
        for arg in self.remux_arguments(request) {
            let arg = arg.to_string_lossy();
            line.push(' ');
            if arg.contains(char::is_whitespace) || arg.is_empty() {
                line.push_str(&format!("'{}'", arg));
            } else {
                line.push_str(&arg);
            }
        }
        line
    }
}

impl MediaEngine for FfmpegEngine {
    fn remux(&self, request: &RemuxRequest<'_>, control: &InvocationControl) -> RemuxOutcome {
        debug!(command = %self.command_line(request), "invoking ffmpeg");

        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(self.remux_arguments(request));

        match run_bounded(cmd, control) {
            Ok(Termination::Exited(out)) if out.status.success() => RemuxOutcome::Completed,
            Ok(Termination::Exited(out)) => {
                let stderr = out.stderr.trim().to_string();
                if is_rejection(&stderr) {
                    RemuxOutcome::Rejected { stderr }
                } else {
                    RemuxOutcome::Failed {
                        code: out.status.code(),
                        stderr,
                    }
                }
            }
            Ok(Termination::TimedOut) => RemuxOutcome::TimedOut,
            Ok(Termination::Cancelled) => RemuxOutcome::Cancelled,
            Err(e) => RemuxOutcome::Failed {
                code: None,
                stderr: format!("failed to run '{}': {}", self.ffmpeg, e),
            },
        }
    }

    fn introspect(
        &self,
        path: &Path,
        control: &InvocationControl,
    ) -> std::result::Result<Vec<(String, String)>, EngineError> {
        let mut cmd = Command::new(&self.ffprobe);
        cmd.args(["-v", "error", "-print_format", "json", "-show_format"])
            .arg(path);

        match run_bounded(cmd, control) {
            Ok(Termination::Exited(out)) if out.status.success() => {
                parse_probe_output(&out.stdout).map_err(|reason| EngineError::Unreadable { reason })
            }
            Ok(Termination::Exited(out)) => Err(EngineError::Unreadable {
                reason: out.stderr.trim().to_string(),
            }),
            Ok(Termination::TimedOut) => Err(EngineError::TimedOut),
            Ok(Termination::Cancelled) => Err(EngineError::Cancelled),
            Err(e) => Err(EngineError::Spawn {
                command: self.ffprobe.clone(),
                reason: e.to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

/// 解析 `ffprobe -print_format json -show_format` 的输出
pub fn parse_probe_output(stdout: &[u8]) -> std::result::Result<Vec<(String, String)>, String> {
    let probe: ProbeOutput =
        serde_json::from_slice(stdout).map_err(|e| format!("invalid ffprobe output: {}", e))?;
    let format = probe
        .format
        .ok_or_else(|| "ffprobe reported no container format".to_string())?;
    Ok(format.tags.into_iter().collect())
}

fn is_mov_family(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| MOV_FAMILY.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn is_rejection(stderr: &str) -> bool {
    REJECTION_MARKERS.iter().any(|m| stderr.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::CancelToken;

    fn to_strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_remux_arguments_order() {
        let engine = FfmpegEngine::default();
        let tags = vec![
            ("title".to_string(), "My clip".to_string()),
            ("artist".to_string(), "B".to_string()),
        ];
        let request = RemuxRequest {
            source: Path::new("/in/a.mkv"),
            destination: Path::new("/out/a.mkv"),
            tags: &tags,
            overwrite: false,
        };

        let args = to_strings(engine.remux_arguments(&request));
        assert_eq!(
            args,
            vec![
                "-hide_banner", "-nostdin", "-loglevel", "error", "-i", "/in/a.mkv",
                "-map", "0", "-map_metadata", "0", "-c", "copy", "-metadata", "title=My clip",
                "-metadata", "artist=B", "-n", "/out/a.mkv",
            ]
        );
        assert_eq!(args, to_strings(engine.remux_arguments(&request)));
    }

    #[test]
    fn test_mov_family_keeps_custom_tags() {
        let engine = FfmpegEngine::default();
        let request = RemuxRequest {
            source: Path::new("a.MP4"),
            destination: Path::new(".a.partial.MP4"),
            tags: &[],
            overwrite: true,
        };
        let args = to_strings(engine.remux_arguments(&request));
        assert!(args.windows(2).any(|w| w == ["-movflags", "use_metadata_tags"]));
        assert_eq!(args[args.len() - 2], "-y");
    }

    #[test]
    fn test_parse_probe_output() {
        let json = br#"{"format": {"filename": "a.mp4", "tags": {"title": "A", "artist": "B"}}}"#;
        let tags = parse_probe_output(json).unwrap();
        assert_eq!(
            tags,
            vec![
                ("artist".to_string(), "B".to_string()),
                ("title".to_string(), "A".to_string()),
            ]
        );

        let untagged = br#"{"format": {"filename": "a.mp4"}}"#;
        assert!(parse_probe_output(untagged).unwrap().is_empty());

        assert!(parse_probe_output(b"{}").is_err());
        assert!(parse_probe_output(b"not json").is_err());
    }

    #[test]
    fn test_rejection_markers() {
        assert!(is_rejection("a.mp4: Invalid data found when processing input"));
        assert!(!is_rejection("Conversion failed!"));
    }

    #[test]
    fn test_missing_binary_reported() {
        let engine = FfmpegEngine::new("vidtag-missing-ffmpeg", "vidtag-missing-ffprobe");
        assert!(matches!(
            engine.probe_version(),
            Err(VidtagError::CommandNotFound { .. })
        ));

        let control = InvocationControl::new(None, CancelToken::new());
        let request = RemuxRequest {
            source: Path::new("a.mkv"),
            destination: Path::new("b.mkv"),
            tags: &[],
            overwrite: true,
        };
        assert!(matches!(
            engine.remux(&request, &control),
            RemuxOutcome::Failed { code: None, .. }
        ));
        assert!(matches!(
            engine.introspect(Path::new("a.mkv"), &control),
            Err(EngineError::Spawn { .. })
        ));
    }

    #[cfg(unix)]
    mod scripted {
        use super::*;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use std::thread;
        use std::time::Duration;
        use tempfile::TempDir;

        /// 写出可执行的 sh 脚本代替 ffmpeg/ffprobe
        fn script(dir: &TempDir, name: &str, body: &str) -> String {
            let path = dir.path().join(name);
            let text = format!("#!/bin/sh\n[ -n \"$VIDTAG_WARMUP\" ] && exit 0\n{}\n", body);
            fs::write(&path, text).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();

            // 其他测试线程 fork 时可能短暂持有写句柄（ETXTBSY）
            for _ in 0..100 {
                match Command::new(&path).env("VIDTAG_WARMUP", "1").status() {
                    Err(e) if e.raw_os_error() == Some(26) => thread::sleep(Duration::from_millis(10)),
                    _ => break,
                }
            }
            path.to_string_lossy().to_string()
        }

        fn remux_with(ffmpeg_body: &str, cancel: CancelToken) -> (TempDir, RemuxOutcome) {
            let dir = tempfile::tempdir().unwrap();
            let ffmpeg = script(&dir, "ffmpeg", ffmpeg_body);
            let engine = FfmpegEngine::new(ffmpeg, "ffprobe");
            let source = dir.path().join("in.mkv");
            let destination = dir.path().join("out.mkv");
            let tags = vec![("title".to_string(), "A".to_string())];
            let request = RemuxRequest {
                source: &source,
                destination: &destination,
                tags: &tags,
                overwrite: true,
            };
            let outcome = engine.remux(&request, &InvocationControl::new(None, cancel));
            (dir, outcome)
        }

        fn introspect_with(ffprobe_body: &str) -> std::result::Result<Vec<(String, String)>, EngineError> {
            let dir = tempfile::tempdir().unwrap();
            let ffprobe = script(&dir, "ffprobe", ffprobe_body);
            let engine = FfmpegEngine::new("ffmpeg", ffprobe);
            let control = InvocationControl::new(None, CancelToken::new());
            engine.introspect(&dir.path().join("in.mkv"), &control)
        }

        #[test]
        fn test_remux_success_writes_destination() {
            let (dir, outcome) = remux_with(
                "for last; do :; done\nprintf data > \"$last\"",
                CancelToken::new(),
            );
            assert_eq!(outcome, RemuxOutcome::Completed);
            assert_eq!(fs::read(dir.path().join("out.mkv")).unwrap(), b"data");
        }

        #[test]
        fn test_remux_rejection_and_failure() {
            let (_dir, outcome) = remux_with(
                "echo 'in.mkv: Invalid data found when processing input' >&2\nexit 1",
                CancelToken::new(),
            );
            assert!(matches!(outcome, RemuxOutcome::Rejected { .. }));

            let (_dir, outcome) = remux_with("echo 'Conversion failed!' >&2\nexit 3", CancelToken::new());
            assert_eq!(
                outcome,
                RemuxOutcome::Failed {
                    code: Some(3),
                    stderr: "Conversion failed!".to_string(),
                }
            );
        }

        #[test]
        fn test_remux_cancelled() {
            let cancel = CancelToken::new();
            cancel.cancel();
            let (_dir, outcome) = remux_with("exec sleep 5", cancel);
            assert_eq!(outcome, RemuxOutcome::Cancelled);
        }

        #[test]
        fn test_introspect_outcomes() {
            let tags = introspect_with(r#"printf '{"format":{"tags":{"title":"A"}}}'"#).unwrap();
            assert_eq!(tags, vec![("title".to_string(), "A".to_string())]);

            assert_eq!(
                introspect_with("echo 'moov atom not found' >&2\nexit 1"),
                Err(EngineError::Unreadable {
                    reason: "moov atom not found".to_string(),
                })
            );

            assert!(matches!(
                introspect_with("echo garbage"),
                Err(EngineError::Unreadable { .. })
            ));
        }
    }
}
