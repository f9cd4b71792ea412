//! 用于测试的脚本化模型网关
//!
//! 按强制调用的函数名排队预设响应，并记录每一次请求。

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::model_gateway::{GatewayRequest, GatewayResponse, ModelGateway};
use crate::error::GatewayError;

/// 预设响应
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Structured(Value),
    Text(String),
    /// 模拟一次 API 调用失败
    Failure(String),
}

/// 被记录的请求
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub prompt: String,
    pub instructions: String,
    pub forced_function: Option<String>,
}

#[derive(Debug, Default)]
pub struct ScriptedGateway {
    replies: Mutex<HashMap<String, VecDeque<ScriptedReply>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// 未强制函数调用时使用的队列名
const TEXT_QUEUE: &str = "";

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为指定函数追加一个预设响应
    pub fn on(self, function: &str, reply: ScriptedReply) -> Self {
        self.push(function, reply);
        self
    }

    /// 为指定函数追加结构化响应
    pub fn on_structured(self, function: &str, value: Value) -> Self {
        self.on(function, ScriptedReply::Structured(value))
    }

    pub fn push(&self, function: &str, reply: ScriptedReply) {
        let mut replies = self.replies.lock().unwrap_or_else(|e| e.into_inner());
        replies.entry(function.to_string()).or_default().push_back(reply);
    }

    /// 总调用次数
    pub fn calls(&self) -> usize {
        self.requests().len()
    }

    /// 指定函数的调用次数
    pub fn calls_for(&self, function: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.forced_function.as_deref() == Some(function))
            .count()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn complete(&self, request: &GatewayRequest<'_>) -> Result<GatewayResponse, GatewayError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedRequest {
                prompt: request.prompt.to_string(),
                instructions: request.instructions.to_string(),
                forced_function: request.forced_function.map(str::to_string),
            });

        let queue = request.forced_function.unwrap_or(TEXT_QUEUE);
        let reply = self
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(queue)
            .and_then(VecDeque::pop_front);

        match reply {
            Some(ScriptedReply::Structured(value)) => Ok(GatewayResponse::Structured(value)),
            Some(ScriptedReply::Text(text)) => Ok(GatewayResponse::Text(text)),
            Some(ScriptedReply::Failure(message)) => Err(GatewayError::api_call_failed(
                "scripted",
                std::io::Error::new(std::io::ErrorKind::Other, message),
            )),
            None => Err(GatewayError::EmptyResponse {
                model: format!("scripted ({queue} 没有剩余的预设响应)"),
            }),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
