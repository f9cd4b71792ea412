use serde::{Deserialize, Serialize};

/// 语言错误类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageErrorKind {
    Grammar,
    Spelling,
    Accentuation,
    Style,
}

/// 一条语言错误
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageError {
    #[serde(rename = "type")]
    pub kind: LanguageErrorKind,
    /// 答案中出错的原文片段
    pub text: String,
    /// 修改建议，必须与原文不同
    pub suggestion: String,
}

impl LanguageError {
    /// 建议为空或与原文相同的错误没有意义
    pub fn has_usable_suggestion(&self) -> bool {
        !self.suggestion.trim().is_empty() && self.suggestion != self.text
    }
}

/// 语法与语言评估结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrammarReport {
    /// 扣分百分比（0-10）
    pub penalty: f64,
    pub errors: Vec<LanguageError>,
}

impl GrammarReport {
    /// 丢弃无效建议；没有错误时扣分强制为 0
    ///
    /// 返回被丢弃的错误数量。
    pub fn enforce_invariants(&mut self) -> usize {
        let before = self.errors.len();
        self.errors.retain(LanguageError::has_usable_suggestion);
        let dropped = before - self.errors.len();
        if self.errors.is_empty() {
            self.penalty = 0.0;
        }
        dropped
    }
}
