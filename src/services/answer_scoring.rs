//! 细则评分阶段
//!
//! 参考答案理解阶段的语义分析，按评分细则逐项给分。

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use super::stage::{call_forced, Stage, StageReply};
use crate::clients::ModelGateway;
use crate::models::submission::is_blank;
use crate::models::{AnswerAnalysis, ConceptScore, FunctionDeclaration, RubricEntry, RubricScoring};

const INSTRUCTIONS: &str = r#"
Score the student’s answer based on the given rubric, considering the detailed semantic analysis from 'Answer Understanding'.
For each rubric item, assign a score from 0 up to the item's weight.

**Scoring Guidelines:**
    -   **Semantic Alignment**: Use the `overall_semantic_alignment` score from 'Answer Understanding' as a primary indicator of the answer's overall quality and relevance. A high overall alignment should lead to higher scores for relevant rubric concepts.
    -   **Concept Relevance & Completeness**: For each concept in the rubric, cross-reference it with the `concepts_found` in 'Answer Understanding'.
        -   If a rubric concept is clearly and accurately addressed by a `concepts_found` entry with high `relevance_score` and `completeness_score` (e.g., 90-100), assign a score very close to or equal to its full weight.
        -   If a rubric concept is partially addressed, or matched by a concept with lower `relevance_score` or `completeness_score`, assign proportional partial credit.
        -   If a rubric concept is not addressed, or addressed irrelevantly/incompletely (low scores), assign 0 or a very low score.
    -   **Accuracy**: Implicitly consider the accuracy based on the `relevance_score` and `overall_semantic_alignment`. Ensure the student's answer aligns factually with the provided 'Text'.
    -   **Structure**: Consider the `structure` details from 'Answer Understanding' (coherence, intro/body/conclusion) for rubric items related to organization or presentation, if applicable.
    -   **Irrelevance/Nonsense**: If the student's answer is completely irrelevant or nonsensical to the question and text, the `total_score` should be 0.

Ensure that for the exact same inputs, the 'scores' and 'total_score' generated are always identical.
Base your scoring strictly on the provided information, focusing on objective evidence from the student's answer in relation to the rubric and the detailed 'Answer Understanding'.
The 'scores' array in your output MUST contain an entry for EACH concept listed in the provided 'Rubric', and ONLY for those concepts. Do NOT invent new concepts for scoring.
Finally, calculate the total score as the sum of all individual scores.

All responses MUST be in French.

IMPORTANT: When generating the JSON for the tool call, STRICTLY adhere to the defined schema. Do NOT include any properties or fields that are not explicitly defined in the tool's 'parameters' section. Ensure all boolean values are `true` or `false`.
"#;

/// 细则评分阶段的输入
#[derive(Debug, Clone, Serialize)]
pub struct ScoringInput {
    pub text: String,
    pub question: String,
    pub answer: String,
    pub rubric: Vec<RubricEntry>,
    pub answer_analysis: AnswerAnalysis,
}

impl ScoringInput {
    /// 原文、问题、答案、细则都非空，且答案分析带有概念与结构
    pub fn is_complete(&self) -> bool {
        !is_blank(&self.text)
            && !is_blank(&self.question)
            && !is_blank(&self.answer)
            && !self.rubric.is_empty()
            && self.answer_analysis.has_scoring_fields()
    }
}

/// 模型总分与重新求和结果之间允许的误差
const TOTAL_TOLERANCE: f64 = 0.01;

pub struct AnswerScoring {
    gateway: Arc<dyn ModelGateway>,
    declaration: FunctionDeclaration,
}

impl AnswerScoring {
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self {
            gateway,
            declaration: declaration(),
        }
    }
}

fn declaration() -> FunctionDeclaration {
    FunctionDeclaration::new(
        "evaluate_answer",
        "Score the student’s answer based on the given rubric and detailed semantic analysis.",
        json!({
            "type": "object",
            "properties": {
                "scores": {
                    "type": "array",
                    "description": "A list of scores for each concept in the rubric.",
                    "items": {
                        "type": "object",
                        "properties": {
                            "concept": { "type": "string", "description": "The name of the concept." },
                            "score": { "type": "number", "description": "The score assigned to the concept." }
                        },
                        "required": ["concept", "score"]
                    }
                },
                "total_score": {
                    "type": "number",
                    "description": "The total score, which is the sum of all individual concept scores."
                }
            },
            "required": ["scores", "total_score"]
        }),
    )
}

#[async_trait]
impl Stage for AnswerScoring {
    type Input = ScoringInput;
    type Reply = RubricScoring;
    type Output = RubricScoring;

    fn declaration(&self) -> &FunctionDeclaration {
        &self.declaration
    }

    async fn call(&self, input: &ScoringInput) -> Result<StageReply> {
        if !input.is_complete() {
            debug!("细则评分: 输入不完整，不调用模型");
            return Ok(StageReply::Rejected(
                "原文、问题、答案、细则或答案分析（concepts_found / structure）缺失".to_string(),
            ));
        }

        let prompt = format!(
            "\nContext Text: {}\n\nQuestion: {}\n\nStudent Answer: {}\n\nRubric: {}\n\nExtracted Concepts: {}\n\nAnswer Structure: {}\n",
            input.text,
            input.question,
            input.answer,
            serde_json::to_string(&input.rubric)?,
            serde_json::to_string(&input.answer_analysis.concepts_found)?,
            serde_json::to_string(&input.answer_analysis.structure)?,
        );

        call_forced(self.gateway.as_ref(), &prompt, INSTRUCTIONS, &self.declaration).await
    }

    /// 每个细则概念只保留第一条得分，去掉细则之外的概念，总分按保留的得分重新求和
    fn finish(&self, input: &ScoringInput, mut reply: RubricScoring) -> RubricScoring {
        let Some(scores) = reply.scores.take() else {
            return reply;
        };

        let mut kept: Vec<ConceptScore> = Vec::with_capacity(input.rubric.len());
        for score in scores {
            if !input.rubric.iter().any(|e| e.concept == score.concept) {
                warn!("细则评分: 丢弃细则之外的概念 '{}'", score.concept);
            } else if kept.iter().any(|k| k.concept == score.concept) {
                warn!("细则评分: 丢弃重复的概念 '{}'", score.concept);
            } else {
                kept.push(score);
            }
        }

        for entry in &input.rubric {
            if !kept.iter().any(|s| s.concept == entry.concept) {
                warn!("细则评分: 概念 '{}' 没有得分", entry.concept);
            }
        }

        let sum: f64 = kept.iter().map(|s| s.score).sum();
        if let Some(reported) = reply.total_score {
            if (reported - sum).abs() > TOTAL_TOLERANCE {
                warn!(
                    "细则评分: 模型给出的总分 {} 与保留得分之和 {} 不一致，使用后者",
                    reported, sum
                );
            }
        }

        reply.scores = Some(kept);
        reply.total_score = Some(sum);
        reply
    }
}
