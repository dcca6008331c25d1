//! 测试用的内存外引擎：把标签写成文本头，源字节原样附在后面。

use super::process::InvocationControl;
use super::{EngineError, MediaEngine, RemuxOutcome, RemuxRequest};

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

const HEADER: &str = "TAGS\n";
const BODY: &str = "DATA\n";

/// 可配置行为的假引擎
#[derive(Debug, Default)]
pub struct FakeEngine {
    /// 写出文件但不写任何新标签
    pub drop_tags: bool,
    /// 写出部分文件后返回该结果
    pub outcome: Option<RemuxOutcome>,
    /// 每次 remux 阻塞的时间
    pub delay: Duration,
    /// 前 N 次 remux 以 EngineFailure 结束
    pub fail_first: usize,
    pub remux_calls: AtomicUsize,
}

impl FakeEngine {
    pub fn calls(&self) -> usize {
        self.remux_calls.load(Ordering::SeqCst)
    }
}

fn split_tagged(content: &[u8]) -> Option<(Vec<(String, String)>, Vec<u8>)> {
    let text = String::from_utf8_lossy(content);
    let rest = text.strip_prefix(HEADER)?;
    let (head, _) = rest.split_once(BODY)?;
    let tags = head
        .lines()
        .filter_map(|l| l.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let offset = HEADER.len() + head.len() + BODY.len();
    Some((tags, content[offset..].to_vec()))
}

impl MediaEngine for FakeEngine {
    fn remux(&self, request: &RemuxRequest<'_>, control: &InvocationControl) -> RemuxOutcome {
        let call = self.remux_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        if control.cancel.is_cancelled() {
            return RemuxOutcome::Cancelled;
        }

        let source = match fs::read(request.source) {
            Ok(bytes) => bytes,
            Err(e) => {
                return RemuxOutcome::Failed {
                    code: Some(1),
                    stderr: e.to_string(),
                }
            }
        };
        if source.starts_with(b"BAD") {
            return RemuxOutcome::Rejected {
                stderr: "Invalid data found when processing input".to_string(),
            };
        }
        if !request.overwrite && request.destination.exists() {
            return RemuxOutcome::Failed {
                code: Some(1),
                stderr: "File exists".to_string(),
            };
        }

        let (mut tags, payload) = split_tagged(&source).unwrap_or((Vec::new(), source));
        if !self.drop_tags {
            for (key, value) in request.tags {
                tags.retain(|(k, _)| k != key);
                tags.push((key.clone(), value.clone()));
            }
        }

        let mut out = String::from(HEADER);
        for (k, v) in &tags {
            out.push_str(&format!("{}={}\n", k, v));
        }
        out.push_str(BODY);
        let mut bytes = out.into_bytes();
        bytes.extend_from_slice(&payload);
        if fs::write(request.destination, bytes).is_err() {
            return RemuxOutcome::Failed {
                code: Some(1),
                stderr: "write failed".to_string(),
            };
        }

        if call < self.fail_first {
            return RemuxOutcome::Failed {
                code: Some(1),
                stderr: "transient failure".to_string(),
            };
        }
        self.outcome.clone().unwrap_or(RemuxOutcome::Completed)
    }

    fn introspect(
        &self,
        path: &Path,
        _control: &InvocationControl,
    ) -> Result<Vec<(String, String)>, EngineError> {
        let content = fs::read(path).map_err(|e| EngineError::Unreadable {
            reason: e.to_string(),
        })?;
        if content.starts_with(b"BAD") {
            return Err(EngineError::Unreadable {
                reason: "Invalid data found when processing input".to_string(),
            });
        }
        Ok(split_tagged(&content).map(|(tags, _)| tags).unwrap_or_default())
    }
}
