//! 模型网关
//!
//! 封装与外部语言模型的一次请求/响应往返：
//! 系统指令 + 用户提示词，可选地声明函数并强制模型调用其中一个。
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 兼容 OpenAI API 的服务（如 Groq, Azure 等）

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionMessageToolCalls, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionResponseMessage, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::GatewayError;
use crate::models::FunctionDeclaration;

/// 一次模型请求
#[derive(Debug, Clone)]
pub struct GatewayRequest<'a> {
    /// 用户提示词
    pub prompt: &'a str,
    /// 系统指令
    pub instructions: &'a str,
    /// 声明给模型的函数
    pub functions: Vec<&'a FunctionDeclaration>,
    /// 强制调用的函数名，必须出现在 `functions` 中
    pub forced_function: Option<&'a str>,
}

impl<'a> GatewayRequest<'a> {
    /// 只声明一个函数并强制模型调用它
    pub fn forced(prompt: &'a str, instructions: &'a str, function: &'a FunctionDeclaration) -> Self {
        Self {
            prompt,
            instructions,
            functions: vec![function],
            forced_function: Some(function.name()),
        }
    }
}

/// 模型响应
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayResponse {
    /// 函数调用的参数（已解析）
    Structured(Value),
    /// 没有发生函数调用时的原始文本
    Text(String),
}

/// 模型网关
///
/// 每次调用恰好对应一次网络往返，不在调用之间保留任何状态。
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn complete(&self, request: &GatewayRequest<'_>) -> Result<GatewayResponse, GatewayError>;

    fn model_name(&self) -> &str;
}

/// 基于 OpenAI 兼容 API 的模型网关
pub struct OpenAiGateway {
    client: Client<OpenAIConfig>,
    model_name: String,
    temperature: f32,
    seed: i64,
}

impl OpenAiGateway {
    /// 创建新的模型网关
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            temperature: config.temperature,
            seed: config.seed,
        }
    }

    fn build_request(
        &self,
        request: &GatewayRequest<'_>,
    ) -> Result<CreateChatCompletionRequest, GatewayError> {
        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(request.instructions)
            .build()
            .map_err(GatewayError::InvalidRequest)?;
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(request.prompt)
            .build()
            .map_err(GatewayError::InvalidRequest)?;

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model_name)
            .messages(vec![
                ChatCompletionRequestMessage::System(system_msg),
                ChatCompletionRequestMessage::User(user_msg),
            ])
            .temperature(self.temperature)
            .seed(self.seed)
            .stream(false);

        if !request.functions.is_empty() {
            let tools = request
                .functions
                .iter()
                .map(|f| f.to_tool())
                .collect::<Result<Vec<_>, _>>()
                .map_err(GatewayError::InvalidRequest)?;
            args.tools(tools);
        }

        if let Some(name) = request.forced_function {
            let function = request
                .functions
                .iter()
                .find(|f| f.name() == name)
                .ok_or_else(|| GatewayError::UnknownForcedFunction {
                    name: name.to_string(),
                })?;
            args.tool_choice(function.to_tool_choice());
        }

        args.build().map_err(GatewayError::InvalidRequest)
    }
}

#[async_trait]
impl ModelGateway for OpenAiGateway {
    async fn complete(&self, request: &GatewayRequest<'_>) -> Result<GatewayResponse, GatewayError> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", request.prompt.len());
        if let Some(name) = request.forced_function {
            debug!("强制调用函数: {}", name);
        }

        let chat_request = self.build_request(request)?;

        let response = self.client.chat().create(chat_request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            GatewayError::api_call_failed(&self.model_name, e)
        })?;

        debug!("LLM API 调用成功");

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::EmptyResponse {
                model: self.model_name.clone(),
            })?;

        interpret_message(choice.message, &self.model_name)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// 解读响应消息
///
/// 有工具调用时只接受函数调用，并返回解析后的参数；否则返回文本内容。
pub fn interpret_message(
    message: ChatCompletionResponseMessage,
    model: &str,
) -> Result<GatewayResponse, GatewayError> {
    let first_call = message
        .tool_calls
        .and_then(|calls| calls.into_iter().next());

    match first_call {
        Some(ChatCompletionMessageToolCalls::Function(call)) => {
            let function = call.function.name;
            debug!("模型调用了函数: {}", function);

            // 参数为空字符串时同样报 MalformedArguments
            let parsed = serde_json::from_str(&call.function.arguments)
                .map_err(|source| GatewayError::MalformedArguments { function, source })?;
            Ok(GatewayResponse::Structured(parsed))
        }
        Some(ChatCompletionMessageToolCalls::Custom(call)) => {
            Err(GatewayError::UnexpectedToolKind {
                kind: format!("custom ({})", call.custom_tool.name),
            })
        }
        None => message
            .content
            .map(|content| GatewayResponse::Text(content.trim().to_string()))
            .ok_or_else(|| GatewayError::EmptyResponse {
                model: model.to_string(),
            }),
    }
}
