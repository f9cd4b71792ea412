//! 阶段的公共抽象
//!
//! 每个阶段 = 固定的输出 schema + 领域指令 + 本地输入校验 + 轻量后处理。
//! 阶段本身不重试，重试由 `workflow::retry` 统一负责。

use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::clients::{GatewayRequest, GatewayResponse, ModelGateway};
use crate::models::FunctionDeclaration;

/// 阶段的一次原始回复
#[derive(Debug, Clone, PartialEq)]
pub enum StageReply {
    /// 输入不满足要求，未调用模型
    Rejected(String),
    /// 已经是结构化数据
    Structured(Value),
    /// 需要解析的文本
    Text(String),
}

impl From<GatewayResponse> for StageReply {
    fn from(response: GatewayResponse) -> Self {
        match response {
            GatewayResponse::Structured(value) => StageReply::Structured(value),
            GatewayResponse::Text(text) => StageReply::Text(text),
        }
    }
}

/// 评分流程中的一个阶段
#[async_trait]
pub trait Stage: Send + Sync {
    /// 阶段输入（会被快照进步骤记录）
    type Input: Serialize + Send + Sync;
    /// 模型回复经校验后转换成的类型
    type Reply: DeserializeOwned + Send;
    /// 阶段最终输出
    type Output: Serialize + Send;

    /// 强制模型调用的函数
    fn declaration(&self) -> &FunctionDeclaration;

    /// 调用一次模型；输入不合法时返回 `StageReply::Rejected` 且不调用模型
    async fn call(&self, input: &Self::Input) -> Result<StageReply>;

    /// 对已校验的回复做后处理
    fn finish(&self, input: &Self::Input, reply: Self::Reply) -> Self::Output;
}

/// 以强制函数调用的方式请求模型
pub async fn call_forced(
    gateway: &dyn ModelGateway,
    prompt: &str,
    instructions: &str,
    declaration: &FunctionDeclaration,
) -> Result<StageReply> {
    let request = GatewayRequest::forced(prompt, instructions, declaration);
    let response = gateway.complete(&request).await?;
    Ok(response.into())
}
