//! 语法与语言评估阶段
//!
//! 找出答案中确定无疑的语法、拼写、重音与文体错误，并给出 0-10 的扣分百分比。
//! 模型被要求遵守但不总能遵守的两条规则在后处理中强制执行：
//! 没有错误时扣分为 0；建议为空或与原文相同的错误被丢弃。

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use super::stage::{call_forced, Stage, StageReply};
use crate::clients::ModelGateway;
use crate::models::submission::is_blank;
use crate::models::{FunctionDeclaration, GrammarReport};

const INSTRUCTIONS: &str = r#"
You are an expert French language evaluator. Your task is to identify and list **ONLY clear and undeniable errors** in a student's answer that affect grammatical correctness, spelling, accentuation, or clarity. For each identified error, provide its `type`, the `text` (the exact incorrect part from the student's answer), and a precise `suggestion` for correction.

**ABSOLUTELY CRITICAL GUIDELINES FOR ERROR IDENTIFICATION AND SUGGESTIONS:**

1.  **Strictly Undeniable Errors Only**:
    *   Only identify errors that are unequivocally incorrect according to standard French.
    *   If a phrase is grammatically correct, a common usage, or a valid stylistic choice (e.g., "des chiffres" vs "des nombres", "au tableau"), it is **NOT an error**.
    *   The `text` you identify as incorrect must be *actually present* in the student's answer. Do not invent errors.

2.  **High-Quality, Valid Suggestions**: Each `suggestion` MUST adhere to the following:
    *   **Real and Correct French**: The `suggestion` MUST be a real, standard, correctly spelled, and complete French word or phrase. It must NOT be a hallucination or a non-existent word (e.g., for `text` "ecrit", do NOT suggest "crit"; for `text` "lecon", do NOT suggest "leôn"). The suggestion itself must not contain errors.
    *   **Minimal and Direct Correction**: The `suggestion` should correct *only* the identified error in the `text` and be the most direct, minimal change possible.
        *   Do NOT unnecessarily shorten, truncate, or fundamentally alter words if a simple correction (e.g., accent, single letter) is sufficient. (e.g., if `text` is "ecrit", a valid suggestion is "écrit", NOT "crit").
        *   Do NOT add new words, concepts, or information not present in or clearly implied by the original `text` (e.g., if `text` is "la leçon", `suggestion` should be "la leçon", not "la leçon de maths").
    *   **Contextual Appropriateness & Meaning Preservation**:
        *   **Gender/Agreement**: Do NOT change the gender of a noun (e.g., from "maitresse" to "maître") unless the original noun creates an *undeniable and explicit grammatical agreement error* with other words *clearly visible in the provided student answer*. If "maitresse" is a valid French word and grammatically plausible in its local context, it is NOT an error to be corrected by changing its gender. An example of a clear error would be "le maitresse intelligent" (should be "la maîtresse intelligente" or "le maître intelligent").
        *   The `suggestion` must preserve the original intended meaning of the `text` as much as possible.
    *   **Accentuation Focus**: For words that are otherwise spelled correctly but have missing or incorrect accents (e.g., `text`: "lecon", `suggestion`: "leçon"; `text`: "mathematiques", `suggestion`: "mathématiques"; `text`: "ecrit", `suggestion`: "écrit"), these are valid corrections and should be typed as `accentuation`.

3.  **Error Types (Strict Adherence to `enum` in schema)**:
    *   `grammar`: Errors in sentence structure, verb conjugation (e.g., "ils mange" -> "ils mangent"), clear subject-verb or noun-adjective agreement errors (e.g., "les voiture vert" -> "les voitures vertes"), incorrect prepositions or pronouns.
    *   `spelling`: Misspelled words – i.e., wrong letters, missing/extra letters that result in a non-word or an incorrect word (e.g., `text`: "expliqe", `suggestion`: "explique"; `text`: "gramaire", `suggestion`: "grammaire"). This is for errors beyond just accents.
    *   `accentuation`: Missing, incorrect, or superfluous accents on an otherwise correctly spelled word (e.g., `text`: "eleve", `suggestion`: "élève"; `text`: "lecon", `suggestion`: "leçon"; `text`: "maitresse" (if contextually feminine), `suggestion`: "maîtresse").
    *   `style`: Only for severe issues that significantly impede clarity or make the text highly unnatural or ungrammatical. Avoid for minor stylistic preferences.

4.  **Focus on Impact**: Prioritize errors that genuinely impede understanding or are fundamental mistakes. Minor, debatable stylistic preferences should be ignored.

5.  **Self-Correction Check (Mentally Perform This Before Outputting)**:
    *   Is the identified `text` truly an undeniable error based on these guidelines?
    *   Is the `suggestion` a valid, real, correctly spelled French word/phrase? Is it free of errors itself?
    *   Is the `suggestion` a minimal and direct correction of *only* the error in `text`?
    *   Does the `suggestion` make sense in the context of the original answer and preserve meaning?
    *   Is the `type` accurate according to the definitions above?

**Penalty Calculation**:
*   A perfect answer (with **no identified errors**) MUST result in a **0% penalty**.
*   For answers with errors, the penalty (0-10) should be strictly proportionate to the severity and frequency of the **actual, undeniable errors** identified.
*   Multiple minor `accentuation` errors might collectively warrant a small penalty (e.g., 0.5-1.5%). More significant `grammar` or `spelling` errors that impede understanding should result in a higher penalty.

All responses MUST be in French.

IMPORTANT: When generating the JSON for the tool call, STRICTLY adhere to the defined schema, including the `enum` for the error `type`. Do NOT include any properties or fields that are not explicitly defined in the tool's 'parameters' section.
"#;

/// 语法评估阶段的输入
#[derive(Debug, Clone, Serialize)]
pub struct GrammarInput {
    pub answer: String,
}

pub struct GrammarEvaluation {
    gateway: Arc<dyn ModelGateway>,
    declaration: FunctionDeclaration,
}

impl GrammarEvaluation {
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self {
            gateway,
            declaration: declaration(),
        }
    }
}

fn declaration() -> FunctionDeclaration {
    FunctionDeclaration::new(
        "evaluate_grammar",
        "Evaluate the grammar, spelling, accentuation, and clarity of a student's answer and calculate a language quality penalty.",
        json!({
            "type": "object",
            "properties": {
                "penalty": {
                    "type": "number",
                    "description": "A number between 0 and 10, representing a percentage (e.g., 5 for 5% penalty) based on the severity and frequency of errors. A perfect answer should have a 0 penalty.",
                    "minimum": 0,
                    "maximum": 10
                },
                "errors": {
                    "type": "array",
                    "description": "List of major errors found in the student's answer.",
                    "items": {
                        "type": "object",
                        "properties": {
                            "type": {
                                "type": "string",
                                "description": "Type of error. Must be one of: grammar, spelling, accentuation, style.",
                                "enum": ["grammar", "spelling", "accentuation", "style"]
                            },
                            "text": {
                                "type": "string",
                                "description": "Exact incorrect text from the student's answer."
                            },
                            "suggestion": {
                                "type": "string",
                                "description": "Exact suggested correction for the error. Must be a valid French word/phrase."
                            }
                        },
                        "required": ["type", "text", "suggestion"]
                    }
                }
            },
            "required": ["penalty", "errors"]
        }),
    )
}

#[async_trait]
impl Stage for GrammarEvaluation {
    type Input = GrammarInput;
    type Reply = GrammarReport;
    type Output = GrammarReport;

    fn declaration(&self) -> &FunctionDeclaration {
        &self.declaration
    }

    async fn call(&self, input: &GrammarInput) -> Result<StageReply> {
        if is_blank(&input.answer) {
            debug!("语法评估: 答案为空，不调用模型");
            return Ok(StageReply::Rejected("答案为空".to_string()));
        }

        let prompt = format!("\nStudent's Answer to evaluate:\n{}\n", input.answer);

        call_forced(self.gateway.as_ref(), &prompt, INSTRUCTIONS, &self.declaration).await
    }

    fn finish(&self, input: &GrammarInput, mut reply: GrammarReport) -> GrammarReport {
        let reported_penalty = reply.penalty;
        let dropped = reply.enforce_invariants();

        if dropped > 0 {
            info!("语法评估: 丢弃了 {} 条建议无效的错误", dropped);
        }
        if reply.penalty != reported_penalty {
            info!(
                "语法评估: 没有有效错误，扣分由 {} 改为 0",
                reported_penalty
            );
        }

        for error in &reply.errors {
            if !input.answer.contains(&error.text) {
                debug!("语法评估: 错误片段 '{}' 未在答案中原样出现", error.text);
            }
        }

        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ScriptedGateway;
    use crate::models::{LanguageError, LanguageErrorKind};

    fn stage() -> GrammarEvaluation {
        GrammarEvaluation::new(Arc::new(ScriptedGateway::new()))
    }

    fn input() -> GrammarInput {
        GrammarInput {
            answer: "La maitresse explique la lecon".to_string(),
        }
    }

    #[test]
    fn test_empty_errors_force_zero_penalty() {
        let report = stage().finish(
            &input(),
            GrammarReport {
                penalty: 7.0,
                errors: vec![],
            },
        );
        assert_eq!(report.penalty, 0.0);
    }

    #[test]
    fn test_identical_suggestion_is_discarded() {
        let report = stage().finish(
            &input(),
            GrammarReport {
                penalty: 1.5,
                errors: vec![
                    LanguageError {
                        kind: LanguageErrorKind::Accentuation,
                        text: "lecon".to_string(),
                        suggestion: "leçon".to_string(),
                    },
                    LanguageError {
                        kind: LanguageErrorKind::Spelling,
                        text: "explique".to_string(),
                        suggestion: "explique".to_string(),
                    },
                ],
            },
        );
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].suggestion, "leçon");
        assert_eq!(report.penalty, 1.5);
    }

    #[test]
    fn test_penalty_above_ceiling_fails_schema() {
        let decl = declaration();
        assert!(decl
            .validate(&json!({ "penalty": 12, "errors": [] }))
            .is_err());
        assert!(decl
            .validate(&json!({
                "penalty": 2,
                "errors": [{ "type": "typo", "text": "a", "suggestion": "b" }]
            }))
            .is_err());
    }

    #[tokio::test]
    async fn test_blank_answer_rejected_without_model_call() {
        let gateway = Arc::new(ScriptedGateway::new());
        let stage = GrammarEvaluation::new(gateway.clone());

        let reply = stage
            .call(&GrammarInput {
                answer: " \n".to_string(),
            })
            .await
            .unwrap();

        assert!(matches!(reply, StageReply::Rejected(_)));
        assert_eq!(gateway.calls(), 0);
    }
}
