//! 阶段重试 - 流程层
//!
//! 所有阶段共用同一个重试策略。每次尝试恰好留下一条尝试日志：
//! 第 N 次成功时日志有 N 条，重试耗尽时日志有 `max_retries + 1` 条。
//!
//! 回复分类：
//! - `Rejected`：阶段自己判定输入不合法，立即终止，不重试
//! - `Structured`：schema 校验 + 反序列化，失败视为解析错误并重试
//! - `Text`：去掉 Markdown 代码块后按 JSON 解析，解析失败或得到标量值都会重试
//! - 调用出错：记录完整错误链并重试

use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::services::{Stage, StageReply};

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 首次尝试之后的额外重试次数
    pub max_retries: u32,
    /// 两次尝试之间的等待时间
    pub delay: Duration,
}

impl RetryPolicy {
    /// 总尝试次数上限
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_secs(1),
        }
    }
}

/// 一个阶段在重试包装下的最终结果
#[derive(Debug, Clone)]
pub struct StageAttempt<T> {
    /// 成功时的阶段输出
    pub parsed: Option<T>,
    /// 最后一次收到的原始回复，用于诊断
    pub raw_output: Option<String>,
    /// 每次尝试一条
    pub logs: Vec<String>,
    pub success: bool,
    /// 失败原因
    pub error: Option<String>,
}

/// 本次尝试的结论
enum Verdict<T> {
    Done(T),
    /// 输入不合法，不再重试
    Rejected(String),
    /// 可重试的失败
    Retry(String),
}

/// 在重试策略下调用一个阶段
pub async fn call_with_retry<S>(
    stage: &S,
    input: &S::Input,
    name: &str,
    policy: &RetryPolicy,
) -> StageAttempt<S::Output>
where
    S: Stage + ?Sized,
{
    let max_attempts = policy.max_attempts();
    let mut logs = Vec::new();
    let mut raw_output = None;
    let mut last_error = String::new();

    for attempt in 1..=max_attempts {
        debug!("[{}] 第 {}/{} 次尝试", name, attempt, max_attempts);

        let verdict = match stage.call(input).await {
            Ok(reply) => classify(stage, input, reply, &mut raw_output),
            Err(e) => Verdict::Retry(format!("调用出错: {:#}", e)),
        };

        match verdict {
            Verdict::Done(output) => {
                logs.push(format!("Attempt {}: 成功", attempt));
                info!("[{}] ✓ 第 {} 次尝试成功", name, attempt);
                return StageAttempt {
                    parsed: Some(output),
                    raw_output,
                    logs,
                    success: true,
                    error: None,
                };
            }
            Verdict::Rejected(reason) => {
                logs.push(format!("Attempt {}: 输入校验失败，未调用模型: {}", attempt, reason));
                warn!("[{}] ⚠️ 输入校验失败，不再重试: {}", name, reason);
                return StageAttempt {
                    parsed: None,
                    raw_output,
                    logs,
                    success: false,
                    error: Some(format!("输入校验失败: {}", reason)),
                };
            }
            Verdict::Retry(reason) => {
                logs.push(format!("Attempt {}: {}", attempt, reason));
                warn!("[{}] 第 {}/{} 次尝试失败: {}", name, attempt, max_attempts, reason);
                last_error = reason;
            }
        }

        if attempt < max_attempts && !policy.delay.is_zero() {
            tokio::time::sleep(policy.delay).await;
        }
    }

    StageAttempt {
        parsed: None,
        raw_output,
        logs,
        success: false,
        error: Some(format!(
            "已尝试 {} 次仍失败，最后一次错误: {}",
            max_attempts, last_error
        )),
    }
}

fn classify<S>(
    stage: &S,
    input: &S::Input,
    reply: StageReply,
    raw_output: &mut Option<String>,
) -> Verdict<S::Output>
where
    S: Stage + ?Sized,
{
    let value = match reply {
        StageReply::Rejected(reason) => return Verdict::Rejected(reason),
        StageReply::Structured(value) => {
            *raw_output = Some(value.to_string());
            value
        }
        StageReply::Text(text) => {
            let parsed = parse_text_reply(&text);
            *raw_output = Some(text);
            match parsed {
                Ok(value) if value.is_object() || value.is_array() => value,
                Ok(value) => {
                    return Verdict::Retry(format!("意外的回复类型: {}", json_kind(&value)))
                }
                Err(e) => return Verdict::Retry(format!("文本回复解析失败: {:#}", e)),
            }
        }
    };

    match stage.declaration().decode::<S::Reply>(value) {
        Ok(reply) => Verdict::Done(stage.finish(input, reply)),
        Err(e) => Verdict::Retry(format!("结构校验失败: {}", e)),
    }
}

/// 解析文本回复，允许外面包一层 Markdown 代码块
pub fn parse_text_reply(text: &str) -> Result<Value> {
    let fence = Regex::new(r"(?s)^\s*```[A-Za-z]*\s*\n?(.*?)\s*```\s*$")?;
    let body = match fence.captures(text).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => text.trim(),
    };
    serde_json::from_str(body).context("回复不是合法的 JSON")
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
