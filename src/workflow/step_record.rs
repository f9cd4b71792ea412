//! 步骤记录
//!
//! 每次阶段调用产生一条记录，追加到本次运行的记录列表后不再修改。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::retry::StageAttempt;

/// 步骤状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    Success,
    Failure,
}

/// 单个步骤的记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    /// 阶段输入快照
    pub inputs: Value,
    pub attempt_logs: Vec<String>,
    pub raw_output: Option<String>,
    pub parsed_output: Option<Value>,
    pub status: StepStatus,
    pub error_detail: Option<String>,
}

impl StepRecord {
    /// 由重试结果生成记录
    pub fn from_attempt<T: Serialize>(name: &str, inputs: Value, attempt: &StageAttempt<T>) -> Self {
        let parsed_output = attempt
            .parsed
            .as_ref()
            .and_then(|output| serde_json::to_value(output).ok());

        let (status, error_detail) = match (&attempt.parsed, attempt.success) {
            (Some(_), true) => (StepStatus::Success, None),
            (None, true) => (
                StepStatus::Failure,
                Some("阶段没有返回结果".to_string()),
            ),
            (_, false) => (
                StepStatus::Failure,
                Some(
                    attempt
                        .error
                        .clone()
                        .unwrap_or_else(|| "阶段失败".to_string()),
                ),
            ),
        };

        Self {
            name: name.to_string(),
            inputs,
            attempt_logs: attempt.logs.clone(),
            raw_output: attempt.raw_output.clone(),
            parsed_output,
            status,
            error_detail,
        }
    }

    /// 阶段成功但输出缺少必需字段时追加的记录
    ///
    /// `inputs` 记录未通过检查的阶段输出，便于排查
    pub fn logic_check_failure(stage_name: &str, inputs: Value, detail: impl Into<String>) -> Self {
        Self {
            name: format!("{} - Logic Check", stage_name),
            inputs,
            attempt_logs: Vec::new(),
            raw_output: None,
            parsed_output: None,
            status: StepStatus::Failure,
            error_detail: Some(detail.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }
}
