use serde::{Deserialize, Serialize};

/// 评分细则中的一项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricEntry {
    pub concept: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// 权重（百分比，0-100）
    pub weight: f64,
}

/// 评分细则
///
/// 各项权重之和应接近 100，但不强制。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rubric {
    #[serde(default)]
    pub rubric: Vec<RubricEntry>,
}

impl Rubric {
    pub fn is_empty(&self) -> bool {
        self.rubric.is_empty()
    }

    pub fn total_weight(&self) -> f64 {
        self.rubric.iter().map(|e| e.weight).sum()
    }
}
