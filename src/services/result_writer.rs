//! 评分结果写入服务 - 业务能力层
//!
//! 只负责"追加一条评分记录"能力，不关心流程

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::StoreError;
use crate::models::{FinalResult, Submission};

/// 一次完成的评分记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub text: String,
    pub question: String,
    pub student_answer: String,
    pub final_score: f64,
    pub feedback: String,
    pub timestamp: DateTime<Utc>,
}

impl EvaluationRecord {
    pub fn new(submission: &Submission, result: &FinalResult) -> Self {
        Self {
            text: submission.text.clone(),
            question: submission.question.clone(),
            student_answer: submission.answer.clone(),
            final_score: result.final_score,
            feedback: result.feedback.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// 评分结果的持久化
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn save(&self, record: &EvaluationRecord) -> Result<(), StoreError>;
}

/// 以 JSON Lines 形式追加写入文件
///
/// 每次运行最多写入一条，只追加，不读取已有内容。
pub struct ResultWriter {
    results_file_path: String,
}

impl ResultWriter {
    pub fn new() -> Self {
        Self {
            results_file_path: "evaluations.jsonl".to_string(),
        }
    }

    /// 使用自定义文件路径创建
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            results_file_path: path.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.results_file_path
    }
}

impl Default for ResultWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultStore for ResultWriter {
    async fn save(&self, record: &EvaluationRecord) -> Result<(), StoreError> {
        debug!(
            "写入评分记录: {} | 得分 {:.2}",
            self.results_file_path, record.final_score
        );

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let write_failed = |source| StoreError::WriteFailed {
            path: self.results_file_path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.results_file_path)
            .await
            .map_err(write_failed)?;

        file.write_all(line.as_bytes()).await.map_err(write_failed)?;
        file.flush().await.map_err(write_failed)?;

        Ok(())
    }
}
