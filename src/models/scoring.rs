use serde::{Deserialize, Serialize};

/// 单个概念的得分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptScore {
    pub concept: String,
    pub score: f64,
}

/// 按评分细则打分的结果
///
/// 两个字段缺一不可，由流程在该阶段之后检查。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RubricScoring {
    #[serde(default)]
    pub scores: Option<Vec<ConceptScore>>,
    #[serde(default)]
    pub total_score: Option<f64>,
}

/// 最终评分结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResult {
    pub final_score: f64,
    pub feedback: String,
}

/// 计算最终得分：细则得分扣除语言扣分百分比，并限制在 0-100
pub fn compute_final_score(rubric_score: f64, penalty_percent: f64) -> f64 {
    (rubric_score * (1.0 - penalty_percent / 100.0)).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_penalty_is_applied() {
        let score = compute_final_score(65.0, 5.0);
        assert!((score - 61.75).abs() < 1e-9);
    }

    #[test]
    fn test_lower_clamp() {
        assert_eq!(compute_final_score(0.0, 100.0), 0.0);
        assert_eq!(compute_final_score(50.0, 150.0), 0.0);
    }

    #[test]
    fn test_upper_clamp() {
        assert_eq!(compute_final_score(120.0, 0.0), 100.0);
    }
}
