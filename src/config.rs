use std::time::Duration;

use crate::error::ConfigError;
use crate::workflow::RetryPolicy;

/// `MAX_RETRIES` 允许的最大值
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    /// 采样温度，固定为 0 以尽量保证可复现
    pub temperature: f32,
    /// 固定随机种子
    pub seed: i64,
    // --- 重试配置 ---
    /// 首次调用之后的额外重试次数
    pub max_retries: u32,
    /// 两次尝试之间的等待时间（毫秒）
    pub retry_delay_ms: u64,
    // --- 运行配置 ---
    /// 批量模式下同时进行的评分流程数量
    pub max_concurrent_runs: usize,
    /// 评分结果追加写入的文件（JSON Lines）
    pub results_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.groq.com/openai/v1".to_string(),
            llm_model_name: "gemma2-9b-it".to_string(),
            temperature: 0.0,
            seed: 42,
            max_retries: 2,
            retry_delay_ms: 1000,
            max_concurrent_runs: 4,
            results_file: "evaluations.jsonl".to_string(),
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            llm_api_key: std::env::var("LLM_API_KEY")
                .or_else(|_| std::env::var("GROQ_API_KEY"))
                .unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            temperature: parsed_var("LLM_TEMPERATURE").unwrap_or(default.temperature),
            seed: parsed_var("LLM_SEED").unwrap_or(default.seed),
            max_retries: parsed_var("MAX_RETRIES").unwrap_or(default.max_retries),
            retry_delay_ms: parsed_var("RETRY_DELAY_MS").unwrap_or(default.retry_delay_ms),
            max_concurrent_runs: parsed_var("MAX_CONCURRENT_RUNS").unwrap_or(default.max_concurrent_runs),
            results_file: std::env::var("RESULTS_FILE").unwrap_or(default.results_file),
            verbose_logging: parsed_var("VERBOSE_LOGGING").unwrap_or(default.verbose_logging),
        }
    }

    /// 在发起任何网络调用之前检查必需的配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm_api_key.trim().is_empty() {
            return Err(ConfigError::EnvVarNotFound {
                var_name: "LLM_API_KEY".to_string(),
            });
        }
        if self.max_concurrent_runs == 0 {
            return Err(ConfigError::EnvVarParseFailed {
                var_name: "MAX_CONCURRENT_RUNS".to_string(),
                value: "0".to_string(),
                expected_type: "正整数".to_string(),
            });
        }
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::EnvVarParseFailed {
                var_name: "MAX_RETRIES".to_string(),
                value: self.max_retries.to_string(),
                expected_type: format!("不超过 {} 的整数", MAX_RETRIES_LIMIT),
            });
        }
        Ok(())
    }

    /// 所有阶段统一使用的重试策略
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
