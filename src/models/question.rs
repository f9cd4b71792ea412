use serde::{Deserialize, Serialize};

/// 问题类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Descriptive,
    Analytical,
    Argumentative,
}

/// 问题理解阶段的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionAnalysis {
    pub question_type: QuestionType,
    #[serde(default)]
    pub key_concepts_expected: Vec<String>,
    #[serde(default)]
    pub teacher_expectations: Vec<String>,
}
