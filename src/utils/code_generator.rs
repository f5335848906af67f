//! 随机码生成与探测重试
//!
//! 短码和 API Key 共用同一套流程：生成候选值，探测是否已被占用，
//! 插入；插入撞上唯一约束时换一个候选值继续，直到次数用尽。

use std::future::Future;

use tracing::{debug, warn};

use crate::errors::{LinkhubError, Result};

/// 62 个字符的字母表
pub const ALPHABET: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

pub fn generate_random_code(length: usize) -> String {
    use std::iter;

    iter::repeat_with(|| ALPHABET[rand::random_range(0..ALPHABET.len())] as char)
        .take(length)
        .collect()
}

/// 候选值来源
pub trait CodeSource: Send + Sync {
    fn next_code(&self, length: usize) -> String;
}

/// 默认来源：每个字符独立均匀抽取
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCodeSource;

impl CodeSource for RandomCodeSource {
    fn next_code(&self, length: usize) -> String {
        generate_random_code(length)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSettings {
    pub length: usize,
    pub max_attempts: u32,
}

/// 探测重试
///
/// `exists` 是减少冲突的预检查；真正的唯一性由存储层保证，
/// 所以 `insert` 返回 `UniqueViolation` 时同样视为冲突并重试。
/// 其他错误原样返回。
pub async fn generate_unique<T, E, EF, I, IF>(
    source: &dyn CodeSource,
    settings: ProbeSettings,
    label: &str,
    mut exists: E,
    mut insert: I,
) -> Result<T>
where
    E: FnMut(String) -> EF,
    EF: Future<Output = Result<bool>>,
    I: FnMut(String) -> IF,
    IF: Future<Output = Result<T>>,
{
    for attempt in 1..=settings.max_attempts {
        let candidate = source.next_code(settings.length);

        if exists(candidate.clone()).await? {
            debug!(
                "{} candidate collided on probe (attempt {}/{})",
                label, attempt, settings.max_attempts
            );
            continue;
        }

        match insert(candidate).await {
            Ok(value) => return Ok(value),
            Err(LinkhubError::UniqueViolation(constraint)) => {
                warn!(
                    "{} insert lost a race on {} (attempt {}/{})",
                    label, constraint, attempt, settings.max_attempts
                );
            }
            Err(e) => return Err(e),
        }
    }

    Err(LinkhubError::retries_exhausted(format!(
        "could not generate a unique {} after {} attempts",
        label, settings.max_attempts
    )))
}
