//! 最终评分阶段
//!
//! 最终得分由程序计算（细则得分扣除语言扣分），模型只负责围绕这个已确定的分数撰写反馈。
//! 模型回复中的 `final_score` 仅用于诊断：与计算值不一致时记录警告，不视为错误。

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use super::stage::{call_forced, Stage, StageReply};
use crate::clients::ModelGateway;
use crate::models::submission::is_blank;
use crate::models::{
    compute_final_score, AnswerAnalysis, ConceptScore, FinalResult, FunctionDeclaration,
    RubricEntry,
};

const INSTRUCTIONS: &str = r#"
You are an evaluation agent. Your task is to provide nuanced, context-aware, and constructive feedback, and output the pre-calculated final score.

1.  **Provide Feedback**:
    Write a detailed feedback summary (2-4 sentences) for the student. Your feedback should:
    -   **Describe Strengths**: State what the student's answer covered well, referencing specific concepts or aspects where they scored highly, based *only* on the provided text and rubric. (e.g., "L'élève a correctement identifié X et a fourni des détails pertinents sur Y, tels que mentionné dans le texte source.")
    -   **Identify Gaps/Inaccuracies**: Point out what was missing or incorrect in the student's answer, referencing areas where the student scored lower or where their answer lacked completeness, relevance, or accuracy, based *only* on the provided text and rubric. (e.g., "Cependant, l'explication de Z était incomplète, et le concept de A n'a pas été abordé comme attendu par la rubrique.")
    -   **Focus on Content**: Ensure the feedback strictly evaluates the student's answer against the provided text and rubric, without introducing external information, new suggestions, or advice not directly derivable from the evaluation criteria.
    -   **Reflect Nuance**: Incorporate insights from the 'Breakdown Scores' and 'Analysis of Student's Answer' (especially `relevance_score`, `completeness_score`, and `overall_semantic_alignment`) to provide feedback that goes beyond simple correctness, touching on coverage, accuracy, and clarity/coherence as observed in the answer.

All responses MUST be in French.

IMPORTANT: When generating the JSON for the tool call, STRICTLY adhere to the defined schema. Do NOT include any properties or fields that are not explicitly defined in the tool's 'parameters' section. Ensure all boolean values are `true` or `false`.
"#;

/// 模型分数与计算分数的容差
const SCORE_TOLERANCE: f64 = 0.01;

/// 最终评分阶段的输入
#[derive(Debug, Clone, Serialize)]
pub struct FinalScoringInput {
    pub text: String,
    pub question: String,
    pub answer: String,
    pub rubric: Vec<RubricEntry>,
    pub answer_analysis: AnswerAnalysis,
    pub rubric_score: f64,
    pub grammar_penalty: f64,
    pub breakdown: Vec<ConceptScore>,
}

impl FinalScoringInput {
    pub fn is_complete(&self) -> bool {
        !is_blank(&self.text)
            && !is_blank(&self.question)
            && !is_blank(&self.answer)
            && !self.rubric.is_empty()
            && self.answer_analysis.has_scoring_fields()
            && self.rubric_score.is_finite()
            && self.grammar_penalty.is_finite()
    }

    /// 程序计算的最终得分
    pub fn computed_score(&self) -> f64 {
        compute_final_score(self.rubric_score, self.grammar_penalty)
    }
}

/// 模型的回复
#[derive(Debug, Clone, Deserialize)]
pub struct FinalEvaluationReply {
    #[serde(default)]
    pub final_score: Option<f64>,
    pub feedback: String,
}

pub struct FinalScoring {
    gateway: Arc<dyn ModelGateway>,
    declaration: FunctionDeclaration,
}

impl FinalScoring {
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self {
            gateway,
            declaration: declaration(),
        }
    }
}

fn declaration() -> FunctionDeclaration {
    FunctionDeclaration::new(
        "provide_final_evaluation",
        "Provide nuanced, context-aware, and constructive feedback, and output the pre-calculated final score.",
        json!({
            "type": "object",
            "properties": {
                "final_score": {
                    "type": "number",
                    "description": "The pre-calculated numerical final score."
                },
                "feedback": {
                    "type": "string",
                    "description": "Detailed, constructive feedback highlighting strengths and areas for improvement (2-4 sentences)."
                }
            },
            "required": ["feedback"]
        }),
    )
}

#[async_trait]
impl Stage for FinalScoring {
    type Input = FinalScoringInput;
    type Reply = FinalEvaluationReply;
    type Output = FinalResult;

    fn declaration(&self) -> &FunctionDeclaration {
        &self.declaration
    }

    async fn call(&self, input: &FinalScoringInput) -> Result<StageReply> {
        if !input.is_complete() {
            debug!("最终评分: 输入不完整，不调用模型");
            return Ok(StageReply::Rejected(
                "原文、问题、答案、细则、答案分析或分数缺失".to_string(),
            ));
        }

        let prompt = format!(
            "\nContext Information:\nText: {}\nQuestion: {}\nStudent Answer: {}\nRubric Used: {}\nAnalysis of Student's Answer (concepts found, structure): {}\nBreakdown of Scores from Rubric: {}\n\nPre-calculated Final Score: {:.2}\n\nTask:\nProvide constructive 'feedback' based on the context and the pre-calculated final score.\nOutput ONLY the JSON as specified.\n",
            input.text,
            input.question,
            input.answer,
            serde_json::to_string(&input.rubric)?,
            serde_json::to_string(&input.answer_analysis)?,
            serde_json::to_string(&input.breakdown)?,
            input.computed_score(),
        );

        call_forced(self.gateway.as_ref(), &prompt, INSTRUCTIONS, &self.declaration).await
    }

    fn finish(&self, input: &FinalScoringInput, reply: FinalEvaluationReply) -> FinalResult {
        let final_score = input.computed_score();

        if let Some(model_score) = reply.final_score {
            if (model_score - final_score).abs() > SCORE_TOLERANCE {
                warn!(
                    "最终评分: 模型给出的分数 {:.2} 与计算值 {:.2} 不一致，以计算值为准",
                    model_score, final_score
                );
            }
        }

        FinalResult {
            final_score,
            feedback: reply.feedback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ScriptedGateway;
    use crate::models::AnswerStructure;

    fn input(rubric_score: f64, grammar_penalty: f64) -> FinalScoringInput {
        FinalScoringInput {
            text: "Context text example.".to_string(),
            question: "Question example.".to_string(),
            answer: "Student answer example.".to_string(),
            rubric: vec![RubricEntry {
                concept: "causes économiques".to_string(),
                keywords: vec!["impôts".to_string()],
                weight: 100.0,
            }],
            answer_analysis: AnswerAnalysis {
                concepts_found: Some(vec![]),
                structure: Some(AnswerStructure::default()),
                ..Default::default()
            },
            rubric_score,
            grammar_penalty,
            breakdown: vec![ConceptScore {
                concept: "causes économiques".to_string(),
                score: rubric_score,
            }],
        }
    }

    fn stage() -> FinalScoring {
        FinalScoring::new(Arc::new(ScriptedGateway::new()))
    }

    #[test]
    fn test_model_score_is_ignored() {
        let result = stage().finish(
            &input(65.0, 5.0),
            FinalEvaluationReply {
                final_score: Some(90.0),
                feedback: "Bonne réponse.".to_string(),
            },
        );
        assert!((result.final_score - 61.75).abs() < 1e-9);
        assert_eq!(result.feedback, "Bonne réponse.");
    }

    #[test]
    fn test_full_penalty_clamps_to_zero() {
        let result = stage().finish(
            &input(0.0, 100.0),
            FinalEvaluationReply {
                final_score: None,
                feedback: "Réponse absente.".to_string(),
            },
        );
        assert_eq!(result.final_score, 0.0);
    }

    #[tokio::test]
    async fn test_prompt_carries_precomputed_score() {
        let gateway = Arc::new(ScriptedGateway::new().on_structured(
            "provide_final_evaluation",
            json!({ "final_score": 61.75, "feedback": "ok" }),
        ));
        let stage = FinalScoring::new(gateway.clone());

        stage.call(&input(65.0, 5.0)).await.unwrap();

        let requests = gateway.requests();
        assert!(requests[0].prompt.contains("Pre-calculated Final Score: 61.75"));
    }

    #[tokio::test]
    async fn test_missing_concepts_rejected_without_model_call() {
        let gateway = Arc::new(ScriptedGateway::new());
        let stage = FinalScoring::new(gateway.clone());
        let mut input = input(65.0, 5.0);
        input.answer_analysis.concepts_found = None;

        assert!(matches!(
            stage.call(&input).await.unwrap(),
            StageReply::Rejected(_)
        ));
        assert_eq!(gateway.calls(), 0);
    }
}
