//! 评分细则提取阶段

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use super::stage::{call_forced, Stage, StageReply};
use crate::clients::ModelGateway;
use crate::models::submission::is_blank;
use crate::models::{FunctionDeclaration, Rubric};

const INSTRUCTIONS: &str = r#"
Based on the provided 'Text', 'Question', and 'Key Concepts Expected', define a detailed scoring rubric.
Each rubric entry MUST include:
*   "A concept name" (derived directly from the 'Key Concepts Expected')
*   "A list of relevant keywords for that concept" (derived from the 'Text' and 'Question')
*   "A weight (percentage) representing its importance, such that the total weights add up to 100%."

Prioritize the most important concepts that directly answer the question and distribute weights logically to reflect their significance. Ensure the rubric is comprehensive but not overly granular.
You MUST generate at least one rubric entry if key concepts are provided.

All responses MUST be in French.

IMPORTANT: When generating the JSON for the tool call, STRICTLY adhere to the defined schema. Do NOT include any properties or fields that are not explicitly defined in the tool's 'parameters' section. Ensure all boolean values are `true` or `false`.
"#;

/// 权重之和偏离 100 超过该值时记录警告
const WEIGHT_TOLERANCE: f64 = 1.0;

/// 评分细则提取阶段的输入
#[derive(Debug, Clone, Serialize)]
pub struct RubricInput {
    pub text: String,
    pub question: String,
    pub key_concepts_expected: Vec<String>,
}

pub struct RubricExtraction {
    gateway: Arc<dyn ModelGateway>,
    declaration: FunctionDeclaration,
}

impl RubricExtraction {
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self {
            gateway,
            declaration: declaration(),
        }
    }
}

fn declaration() -> FunctionDeclaration {
    FunctionDeclaration::new(
        "extract_rubric",
        "Define a detailed scoring rubric based on a question and its key concepts.",
        json!({
            "type": "object",
            "properties": {
                "rubric": {
                    "type": "array",
                    "description": "A list of rubric entries, each with a concept, keywords, and weight.",
                    "items": {
                        "type": "object",
                        "properties": {
                            "concept": {
                                "type": "string",
                                "description": "The name of the concept."
                            },
                            "keywords": {
                                "type": "array",
                                "description": "A list of relevant keywords for that concept.",
                                "items": { "type": "string" }
                            },
                            "weight": {
                                "type": "number",
                                "description": "A weight (percentage) representing its importance, such that the total weights add up to 100%.",
                                "minimum": 0,
                                "maximum": 100
                            }
                        },
                        "required": ["concept", "keywords", "weight"]
                    }
                }
            },
            "required": ["rubric"]
        }),
    )
}

#[async_trait]
impl Stage for RubricExtraction {
    type Input = RubricInput;
    type Reply = Rubric;
    type Output = Rubric;

    fn declaration(&self) -> &FunctionDeclaration {
        &self.declaration
    }

    async fn call(&self, input: &RubricInput) -> Result<StageReply> {
        if is_blank(&input.text) || is_blank(&input.question) || input.key_concepts_expected.is_empty() {
            debug!("细则提取: 原文、问题或关键概念为空，不调用模型");
            return Ok(StageReply::Rejected(
                "原文、问题或关键概念列表为空".to_string(),
            ));
        }

        let prompt = format!(
            "\nText: {}\n\nQuestion: {}\n\nKey Concepts Expected: {}\n",
            input.text,
            input.question,
            input.key_concepts_expected.join(", ")
        );

        call_forced(self.gateway.as_ref(), &prompt, INSTRUCTIONS, &self.declaration).await
    }

    fn finish(&self, _input: &RubricInput, reply: Rubric) -> Rubric {
        let total = reply.total_weight();
        if !reply.is_empty() && (total - 100.0).abs() > WEIGHT_TOLERANCE {
            warn!("细则权重之和为 {:.1}，不等于 100", total);
        }
        reply
    }
}
