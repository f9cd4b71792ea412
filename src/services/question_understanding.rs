//! 问题理解阶段
//!
//! 判断问题类型，并从原文中提取完整答案应包含的关键概念与教师期望。

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use super::stage::{call_forced, Stage, StageReply};
use crate::clients::ModelGateway;
use crate::models::submission::is_blank;
use crate::models::{FunctionDeclaration, QuestionAnalysis};

const INSTRUCTIONS: &str = r#"
Analyze the provided 'Text' and 'Question' to extract the following:
1. The type of question (choose one: descriptive, analytical, argumentative).
2. The key concepts or actions directly mentioned in the 'Text' that answer the 'Question'. These should be specific keywords or phrases representing the essential information expected in a complete answer, derived *only* from the 'Text'.
3. The teacher’s expectations regarding the answer, based on the 'Question' and the 'Text'.

All responses MUST be in French.

IMPORTANT: When generating the JSON for the tool call, STRICTLY adhere to the defined schema. Do NOT include any properties or fields that are not explicitly defined in the tool's 'parameters' section. Ensure all boolean values are `true` or `false`.
"#;

/// 问题理解阶段的输入
#[derive(Debug, Clone, Serialize)]
pub struct QuestionInput {
    pub text: String,
    pub question: String,
}

pub struct QuestionUnderstanding {
    gateway: Arc<dyn ModelGateway>,
    declaration: FunctionDeclaration,
}

impl QuestionUnderstanding {
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self {
            gateway,
            declaration: declaration(),
        }
    }
}

fn declaration() -> FunctionDeclaration {
    FunctionDeclaration::new(
        "understand_question",
        "Analyze a question and extract its type, key concepts expected, and teacher's expectations.",
        json!({
            "type": "object",
            "properties": {
                "question_type": {
                    "type": "string",
                    "description": "The type of question.",
                    "enum": ["descriptive", "analytical", "argumentative"]
                },
                "key_concepts_expected": {
                    "type": "array",
                    "description": "An array of keywords or phrases representing the key concepts expected in a complete answer.",
                    "items": { "type": "string" }
                },
                "teacher_expectations": {
                    "type": "array",
                    "description": "An array of points outlining the teacher’s expectations regarding the answer.",
                    "items": { "type": "string" }
                }
            },
            "required": ["question_type", "key_concepts_expected", "teacher_expectations"]
        }),
    )
}

#[async_trait]
impl Stage for QuestionUnderstanding {
    type Input = QuestionInput;
    type Reply = QuestionAnalysis;
    type Output = QuestionAnalysis;

    fn declaration(&self) -> &FunctionDeclaration {
        &self.declaration
    }

    async fn call(&self, input: &QuestionInput) -> Result<StageReply> {
        if is_blank(&input.text) || is_blank(&input.question) {
            debug!("问题理解: 原文或问题为空，不调用模型");
            return Ok(StageReply::Rejected("原文或问题为空".to_string()));
        }

        let prompt = format!(
            "\nText: {}\n\nQuestion: {}\n",
            input.text, input.question
        );

        call_forced(self.gateway.as_ref(), &prompt, INSTRUCTIONS, &self.declaration).await
    }

    fn finish(&self, _input: &QuestionInput, reply: QuestionAnalysis) -> QuestionAnalysis {
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ScriptedGateway;

    #[tokio::test]
    async fn test_blank_question_is_rejected_without_model_call() {
        let gateway = Arc::new(ScriptedGateway::new());
        let stage = QuestionUnderstanding::new(gateway.clone());

        let reply = stage
            .call(&QuestionInput {
                text: "Le cycle de l'eau.".to_string(),
                question: "   ".to_string(),
            })
            .await
            .unwrap();

        assert!(matches!(reply, StageReply::Rejected(_)));
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn test_prompt_contains_text_and_question() {
        let gateway = Arc::new(ScriptedGateway::new().on_structured(
            "understand_question",
            json!({
                "question_type": "descriptive",
                "key_concepts_expected": ["évaporation"],
                "teacher_expectations": []
            }),
        ));
        let stage = QuestionUnderstanding::new(gateway.clone());

        let reply = stage
            .call(&QuestionInput {
                text: "Le cycle de l'eau.".to_string(),
                question: "Quelles étapes ?".to_string(),
            })
            .await
            .unwrap();

        assert!(matches!(reply, StageReply::Structured(_)));
        let requests = gateway.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].prompt.contains("Text: Le cycle de l'eau."));
        assert!(requests[0].prompt.contains("Question: Quelles étapes ?"));
        assert_eq!(
            requests[0].forced_function.as_deref(),
            Some("understand_question")
        );
    }
}
