use serde::{Deserialize, Serialize};

/// 在学生答案中识别出的概念
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptFound {
    pub concept: String,
    pub relevance_score: f64,
    pub completeness_score: f64,
}

/// 答案结构评估
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerStructure {
    pub coherent: bool,
    pub has_intro: bool,
    pub has_body: bool,
    pub has_conclusion: bool,
}

/// 答案理解阶段的结果
///
/// `concepts_found` 与 `structure` 是后续评分阶段的必需输入，缺失时评分阶段直接拒绝。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerAnalysis {
    #[serde(default)]
    pub concepts_found: Option<Vec<ConceptFound>>,
    #[serde(default)]
    pub overall_semantic_alignment: f64,
    #[serde(default)]
    pub named_entities: Vec<String>,
    #[serde(default)]
    pub dates: Vec<String>,
    #[serde(default)]
    pub structure: Option<AnswerStructure>,
}

impl AnswerAnalysis {
    /// 评分阶段需要的两个子字段是否都存在
    pub fn has_scoring_fields(&self) -> bool {
        self.concepts_found.is_some() && self.structure.is_some()
    }
}
