//! # 元数据集合
//!
//! 有序的键值映射，批次开始时构建一次，之后只读并在所有 worker 间共享。
//!
//! ## 规则
//! - 键区分大小写且唯一，保留插入顺序
//! - 键不能包含 `=`、NUL、CR、LF
//! - 值不能为空：引擎把空值当作删除该标签
//! - 值中的双引号与换行在交给引擎前转义
//!
//! ## 依赖关系
//! - 被 `models/task.rs`, `engine/` 使用
//! - 使用 `error.rs`

use crate::error::{Result, VidtagError};

/// 转义哨兵字符
const ESCAPE: char = '\\';

/// 键中禁止出现的字符
const FORBIDDEN_KEY_CHARS: [char; 4] = ['=', '\0', '\r', '\n'];

/// 不可变的有序元数据集合
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataSet {
    entries: Vec<(String, String)>,
}

impl MetadataSet {
    /// 从 `key=value` 形式的参数构建
    pub fn build<I, S>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = MetadataSet::default();
        for token in tokens {
            let token = token.as_ref();
            let (key, value) = token.split_once('=').ok_or_else(|| VidtagError::ParseError {
                token: token.to_string(),
                reason: "expected key=value".to_string(),
            })?;
            set.insert_checked(token, key.trim(), value.trim())?;
        }
        Ok(set)
    }

    /// 从交互式会话收集的键值对构建
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut set = MetadataSet::default();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref().trim(), value.as_ref().trim());
            let token = format!("{}={}", key, value);
            set.insert_checked(&token, key, value)?;
        }
        Ok(set)
    }

    /// 解析引擎读出的标签（值反转义，不做键校验）
    pub fn from_engine_tags(tags: Vec<(String, String)>) -> Self {
        let mut set = MetadataSet::default();
        for (key, value) in tags {
            if set.get(&key).is_none() {
                set.entries.push((key, unescape(&value)));
            }
        }
        set
    }

    fn insert_checked(&mut self, token: &str, key: &str, value: &str) -> Result<()> {
        let fail = |reason: &str| VidtagError::ParseError {
            token: token.to_string(),
            reason: reason.to_string(),
        };

        if key.is_empty() {
            return Err(fail("empty key"));
        }
        if key.contains(&FORBIDDEN_KEY_CHARS[..]) {
            return Err(fail("key contains a reserved character"));
        }
        if self.get(key).is_some() {
            return Err(fail("duplicate key"));
        }
        if value.is_empty() {
            return Err(fail("empty value"));
        }

        self.entries.push((key.to_string(), value.to_string()));
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// 按键查找（忽略 ASCII 大小写），部分容器会改写标签名大小写
    pub fn get_ignore_case(&self, key: &str) -> Option<&str> {
        self.get(key).or_else(|| {
            self.entries
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.as_str())
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 生成引擎参数对 `(key, 转义后的 value)`，顺序与插入顺序一致
    pub fn to_arguments(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), escape(v)))
            .collect()
    }

    /// 返回 `read_back` 中缺失或值不符的键
    ///
    /// 键比较忽略大小写；值包含转义哨兵时无法保证往返一致，只检查键是否存在。
    pub fn missing_from(&self, read_back: &MetadataSet) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(key, value)| match read_back.get_ignore_case(key) {
                None => true,
                Some(_) if value.contains(ESCAPE) => false,
                Some(found) => found.trim() != value.trim(),
            })
            .map(|(key, _)| key.clone())
            .collect()
    }
}

/// 将双引号与换行映射为引擎安全的转义序列
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

/// `escape` 的逆映射；未知转义序列原样保留
pub fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c != ESCAPE {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('"') => {
                out.push('"');
                chars.next();
            }
            Some('n') => {
                out.push('\n');
                chars.next();
            }
            Some('r') => {
                out.push('\r');
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}
