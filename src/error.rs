use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 模型网关错误
    #[error("模型网关错误: {0}")]
    Gateway(#[from] GatewayError),
    /// 输出结构校验错误
    #[error("结构校验错误: {0}")]
    Schema(#[from] SchemaError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 结果持久化错误
    #[error("持久化错误: {0}")]
    Store(#[from] StoreError),
}

/// 模型网关错误
#[derive(Debug, Error)]
pub enum GatewayError {
    /// 请求构建失败
    #[error("请求构建失败: {0}")]
    InvalidRequest(#[source] async_openai::error::OpenAIError),
    /// 强制调用的函数不在声明列表中
    #[error("强制调用的函数 {name} 未声明")]
    UnknownForcedFunction { name: String },
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {source}")]
    ApiCallFailed {
        model: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 返回结果为空
    #[error("LLM返回结果为空 (模型: {model})")]
    EmptyResponse { model: String },
    /// 模型选择了函数调用以外的工具类型
    #[error("LLM返回了意外的工具类型: {kind}")]
    UnexpectedToolKind { kind: String },
    /// 函数调用参数不是合法 JSON
    #[error("函数 {function} 的调用参数无法解析: {source}")]
    MalformedArguments {
        function: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 输出结构校验错误
#[derive(Debug, Error)]
pub enum SchemaError {
    /// 声明的 JSON Schema 本身无法编译
    #[error("函数 {function} 的 schema 编译失败: {message}")]
    CompileFailed { function: String, message: String },
    /// 模型输出不符合声明的 schema
    #[error("输出不符合函数 {function} 的 schema: {}", .violations.join("; "))]
    Violation {
        function: String,
        violations: Vec<String>,
    },
    /// 通过校验但无法转换为类型化结果
    #[error("输出无法转换为 {function} 的结果类型: {source}")]
    Deserialize {
        function: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 环境变量不存在
    #[error("环境变量 {var_name} 不存在")]
    EnvVarNotFound { var_name: String },
}

/// 结果持久化错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 记录序列化失败
    #[error("记录序列化失败: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ========== 便捷构造函数 ==========

impl GatewayError {
    /// 创建LLM API调用错误
    pub fn api_call_failed(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        GatewayError::ApiCallFailed {
            model: model.into(),
            source: Box::new(source),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
