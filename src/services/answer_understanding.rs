//! 答案理解阶段
//!
//! 从学生答案中提取概念（相关度、完整度）、整体语义一致度、
//! 命名实体、日期以及结构信息。

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use super::stage::{call_forced, Stage, StageReply};
use crate::clients::ModelGateway;
use crate::models::submission::is_blank;
use crate::models::{AnswerAnalysis, FunctionDeclaration};

const INSTRUCTIONS: &str = r#"
Analyze the following student’s answer in relation to the provided 'Text' and 'Question'.
Your task is to extract the following information:
-   **Concepts found**: Identify all relevant concepts present in the student's answer. For each concept, assign a `relevance_score` (how well it relates to the question and context) and a `completeness_score` (how thoroughly it's explained).
    -   **Direct/Perfect Matches**: If a concept in the student's answer directly and perfectly matches information in the 'Text' that answers the 'Question', assign `relevance_score` and `completeness_score` of **100**. Minor spelling differences (e.g., "lecon" vs "leçon") should not reduce these scores, as they are handled by the grammar agent.
    -   **Near-Direct Matches**: If a concept very closely matches but isn't absolutely perfect, assign `relevance_score` and `completeness_score` between 95 and 99.
    -   **Partial Matches**: If a concept is partially addressed or less clearly stated, assign proportional scores.
    -   **Semantic Similarity**: Be flexible with phrasing; consider semantic similarity even if the exact words are not used.
-   **Overall semantic alignment**: Provide an `overall_semantic_alignment` score (0-100) indicating how well the student's answer aligns with the expected content based on the 'Text' and 'Question'.
-   **Named entities**: List any named entities (people, places, organizations) found *within the student's answer*.
-   **Dates**: List any specific time references or dates found *within the student's answer*.
-   **Structure**: Assess the answer's structure (coherence, presence of intro, body, conclusion).

Ensure all analysis and scoring are strictly based on the provided 'Text', 'Question', and 'Student Answer'.

All extracted information MUST be in French.
STRICTLY adhere to the defined function schema for the output format. Do NOT include any properties or fields that are not explicitly defined in the tool's 'parameters' section. Ensure all boolean values are `true` or `false`.
"#;

/// 答案理解阶段的输入
#[derive(Debug, Clone, Serialize)]
pub struct AnswerInput {
    pub text: String,
    pub question: String,
    pub answer: String,
}

pub struct AnswerUnderstanding {
    gateway: Arc<dyn ModelGateway>,
    declaration: FunctionDeclaration,
}

impl AnswerUnderstanding {
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self {
            gateway,
            declaration: declaration(),
        }
    }
}

fn declaration() -> FunctionDeclaration {
    let score = |description: &str| {
        json!({ "type": "number", "description": description, "minimum": 0, "maximum": 100 })
    };
    let flag = |description: &str| json!({ "type": "boolean", "description": description });

    FunctionDeclaration::new(
        "understand_answer",
        "Analyze a student's answer in relation to provided text and question, extracting concepts, semantic alignment, entities, dates, and structure.",
        json!({
            "type": "object",
            "properties": {
                "concepts_found": {
                    "type": "array",
                    "description": "List of relevant concepts identified in the student's answer.",
                    "items": {
                        "type": "object",
                        "properties": {
                            "concept": { "type": "string", "description": "The name of the concept." },
                            "relevance_score": score("Relevance score (0-100) of the concept to the question and context."),
                            "completeness_score": score("Completeness score (0-100) of the concept's explanation.")
                        },
                        "required": ["concept", "relevance_score", "completeness_score"]
                    }
                },
                "overall_semantic_alignment": score("Overall semantic alignment score (0-100) of the answer with expected content."),
                "named_entities": {
                    "type": "array",
                    "description": "List of named entities (people, places, organizations) mentioned.",
                    "items": { "type": "string" }
                },
                "dates": {
                    "type": "array",
                    "description": "List of dates or time references mentioned.",
                    "items": { "type": "string" }
                },
                "structure": {
                    "type": "object",
                    "description": "Assessment of the answer's structure.",
                    "properties": {
                        "coherent": flag("True if the answer is coherent."),
                        "has_intro": flag("True if the answer has an introduction."),
                        "has_body": flag("True if the answer has a body."),
                        "has_conclusion": flag("True if the answer has a conclusion.")
                    },
                    "required": ["coherent", "has_intro", "has_body", "has_conclusion"]
                }
            },
            "required": ["concepts_found", "overall_semantic_alignment", "named_entities", "dates", "structure"]
        }),
    )
}

#[async_trait]
impl Stage for AnswerUnderstanding {
    type Input = AnswerInput;
    type Reply = AnswerAnalysis;
    type Output = AnswerAnalysis;

    fn declaration(&self) -> &FunctionDeclaration {
        &self.declaration
    }

    async fn call(&self, input: &AnswerInput) -> Result<StageReply> {
        if is_blank(&input.text) || is_blank(&input.question) || is_blank(&input.answer) {
            debug!("答案理解: 原文、问题或答案为空，不调用模型");
            return Ok(StageReply::Rejected("原文、问题或答案为空".to_string()));
        }

        let prompt = format!(
            "\nText: {}\n\nQuestion: {}\n\nStudent Answer: {}\n",
            input.text, input.question, input.answer
        );

        call_forced(self.gateway.as_ref(), &prompt, INSTRUCTIONS, &self.declaration).await
    }

    fn finish(&self, _input: &AnswerInput, reply: AnswerAnalysis) -> AnswerAnalysis {
        reply
    }
}
