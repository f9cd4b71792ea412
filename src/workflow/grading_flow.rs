//! 评分流程 - 流程层
//!
//! 核心职责：定义"一份答案"的完整评分流程
//!
//! 流程顺序：
//! 1. 问题理解 → 检查关键概念非空
//! 2. 评分细则提取 → 检查细则非空
//! 3. 答案理解
//! 4. 语法评估
//! 5. 细则评分 → 检查逐项得分与总分都存在
//! 6. 最终评分（得分由程序计算，模型只写反馈）
//!
//! 任何一步失败都会追加一条 Failure 记录并立即停止，后续阶段不会被调用。
//! 流程从不返回错误：调用方总是拿到 (结果或无, 步骤记录)。

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use super::retry::{call_with_retry, RetryPolicy};
use super::step_record::StepRecord;
use crate::clients::ModelGateway;
use crate::models::{FinalResult, Submission};
use crate::services::{
    AnswerInput, AnswerScoring, AnswerUnderstanding, FinalScoring, FinalScoringInput,
    GrammarEvaluation, GrammarInput, QuestionInput, QuestionUnderstanding, RubricExtraction,
    RubricInput, ScoringInput, Stage,
};

pub const STEP_QUESTION_UNDERSTANDING: &str = "1. Question Understanding";
pub const STEP_RUBRIC_EXTRACTION: &str = "2. Rubric Extraction";
pub const STEP_ANSWER_UNDERSTANDING: &str = "3. Answer Understanding";
pub const STEP_GRAMMAR_EVALUATION: &str = "4. Grammar Evaluation";
pub const STEP_RUBRIC_SCORING: &str = "5. Rubric Scoring";
pub const STEP_FINAL_SCORING: &str = "6. Final Scoring";

/// 一次评分运行的结果
#[derive(Debug, Clone, Serialize)]
pub struct GradingOutcome {
    pub result: Option<FinalResult>,
    pub steps: Vec<StepRecord>,
}

impl GradingOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_some()
    }

    /// 导致流程停止的那一步
    pub fn failed_step(&self) -> Option<&StepRecord> {
        self.steps.iter().find(|step| !step.is_success())
    }
}

/// 评分流程
///
/// - 按顺序调用六个阶段，把上一阶段的输出传给下一阶段
/// - 每个阶段都经过同一个重试策略
/// - 不持有任何运行间共享的可变状态
pub struct GradingFlow {
    question_understanding: QuestionUnderstanding,
    rubric_extraction: RubricExtraction,
    answer_understanding: AnswerUnderstanding,
    grammar_evaluation: GrammarEvaluation,
    answer_scoring: AnswerScoring,
    final_scoring: FinalScoring,
    retry_policy: RetryPolicy,
}

impl GradingFlow {
    pub fn new(gateway: Arc<dyn ModelGateway>, retry_policy: RetryPolicy) -> Self {
        Self {
            question_understanding: QuestionUnderstanding::new(gateway.clone()),
            rubric_extraction: RubricExtraction::new(gateway.clone()),
            answer_understanding: AnswerUnderstanding::new(gateway.clone()),
            grammar_evaluation: GrammarEvaluation::new(gateway.clone()),
            answer_scoring: AnswerScoring::new(gateway.clone()),
            final_scoring: FinalScoring::new(gateway),
            retry_policy,
        }
    }

    pub async fn run(&self, submission: &Submission) -> GradingOutcome {
        let mut steps = Vec::new();
        let result = self.grade(submission, &mut steps).await;

        match &result {
            Some(final_result) => {
                info!("✅ 评分完成，最终得分: {:.2}", final_result.final_score);
            }
            None => {
                let failed = steps
                    .iter()
                    .rev()
                    .find(|step| !step.is_success())
                    .map(|step| step.name.as_str())
                    .unwrap_or("未知步骤");
                error!("❌ 评分在 [{}] 处停止", failed);
            }
        }

        GradingOutcome { result, steps }
    }

    async fn grade(&self, submission: &Submission, steps: &mut Vec<StepRecord>) -> Option<FinalResult> {
        // ========== 1. 问题理解 ==========
        let question_analysis = self
            .run_stage(
                &self.question_understanding,
                &QuestionInput {
                    text: submission.text.clone(),
                    question: submission.question.clone(),
                },
                STEP_QUESTION_UNDERSTANDING,
                steps,
            )
            .await?;

        if question_analysis.key_concepts_expected.is_empty() {
            return fail_logic_check(
                steps,
                STEP_QUESTION_UNDERSTANDING,
                "question_analysis_output",
                &question_analysis,
                "key_concepts_expected 为空",
            );
        }

        // ========== 2. 评分细则提取 ==========
        let rubric = self
            .run_stage(
                &self.rubric_extraction,
                &RubricInput {
                    text: submission.text.clone(),
                    question: submission.question.clone(),
                    key_concepts_expected: question_analysis.key_concepts_expected,
                },
                STEP_RUBRIC_EXTRACTION,
                steps,
            )
            .await?;

        if rubric.is_empty() {
            return fail_logic_check(
                steps,
                STEP_RUBRIC_EXTRACTION,
                "rubric_definition_output",
                &rubric,
                "rubric 为空",
            );
        }
        let rubric = rubric.rubric;

        // ========== 3. 答案理解 ==========
        let answer_analysis = self
            .run_stage(
                &self.answer_understanding,
                &AnswerInput {
                    text: submission.text.clone(),
                    question: submission.question.clone(),
                    answer: submission.answer.clone(),
                },
                STEP_ANSWER_UNDERSTANDING,
                steps,
            )
            .await?;

        // ========== 4. 语法评估 ==========
        let grammar = self
            .run_stage(
                &self.grammar_evaluation,
                &GrammarInput {
                    answer: submission.answer.clone(),
                },
                STEP_GRAMMAR_EVALUATION,
                steps,
            )
            .await?;

        // ========== 5. 细则评分 ==========
        let scoring = self
            .run_stage(
                &self.answer_scoring,
                &ScoringInput {
                    text: submission.text.clone(),
                    question: submission.question.clone(),
                    answer: submission.answer.clone(),
                    rubric: rubric.clone(),
                    answer_analysis: answer_analysis.clone(),
                },
                STEP_RUBRIC_SCORING,
                steps,
            )
            .await?;

        let (breakdown, rubric_score) = match (&scoring.scores, scoring.total_score) {
            (Some(scores), Some(total)) if !scores.is_empty() && total.is_finite() => {
                (scores.clone(), total)
            }
            (scores, total) => {
                let detail = match (scores, total) {
                    (None, _) => "缺少 scores".to_string(),
                    (Some(scores), _) if scores.is_empty() => "scores 为空".to_string(),
                    (_, None) => "缺少 total_score".to_string(),
                    (_, Some(total)) => format!("total_score 不是有效数字: {}", total),
                };
                return fail_logic_check(
                    steps,
                    STEP_RUBRIC_SCORING,
                    "evaluation_scores_output",
                    &scoring,
                    detail,
                );
            }
        };

        // ========== 6. 最终评分 ==========
        self.run_stage(
            &self.final_scoring,
            &FinalScoringInput {
                text: submission.text.clone(),
                question: submission.question.clone(),
                answer: submission.answer.clone(),
                rubric,
                answer_analysis,
                rubric_score,
                grammar_penalty: grammar.penalty,
                breakdown,
            },
            STEP_FINAL_SCORING,
            steps,
        )
        .await
    }

    /// 在重试策略下执行一个阶段并追加步骤记录
    async fn run_stage<S: Stage>(
        &self,
        stage: &S,
        input: &S::Input,
        name: &str,
        steps: &mut Vec<StepRecord>,
    ) -> Option<S::Output> {
        info!("[阶段 {}] ▶ 开始", name);

        let inputs = serde_json::to_value(input).unwrap_or(Value::Null);
        let attempt = call_with_retry(stage, input, name, &self.retry_policy).await;
        let record = StepRecord::from_attempt(name, inputs, &attempt);
        let succeeded = record.is_success();

        if !succeeded {
            error!(
                "[阶段 {}] ❌ 失败: {}",
                name,
                record.error_detail.as_deref().unwrap_or("未知错误")
            );
        }
        steps.push(record);

        if succeeded {
            attempt.parsed
        } else {
            None
        }
    }
}

/// 追加逻辑检查失败记录，`output_key` 下保存未通过检查的阶段输出
fn fail_logic_check<T, O: Serialize>(
    steps: &mut Vec<StepRecord>,
    stage_name: &str,
    output_key: &str,
    output: &O,
    detail: impl Into<String>,
) -> Option<T> {
    let detail = detail.into();
    warn!("[阶段 {}] ⚠️ 逻辑检查未通过: {}", stage_name, detail);

    let mut inputs = serde_json::Map::new();
    inputs.insert(
        output_key.to_string(),
        serde_json::to_value(output).unwrap_or(Value::Null),
    );
    steps.push(StepRecord::logic_check_failure(
        stage_name,
        Value::Object(inputs),
        detail,
    ));
    None
}
