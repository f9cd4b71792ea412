//! 批量评分处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责组装依赖、运行评分流程并持久化结果。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：校验配置、创建模型网关、评分流程和结果写入器
//! 2. **单次评分**：运行一次完整流程，成功时写入一条评分记录
//! 3. **批量评分**：使用 Semaphore 限制同时进行的评分流程数量
//! 4. **全局统计**：汇总成功、失败与写入失败的数量
//!
//! 网关与写入器在进程内只创建一次，通过参数注入到流程中，测试时可替换为假实现。

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::clients::{ModelGateway, OpenAiGateway};
use crate::config::Config;
use crate::error::AppResult;
use crate::models::{load_submissions, Submission};
use crate::services::{EvaluationRecord, ResultStore, ResultWriter};
use crate::utils::logging;
use crate::workflow::{GradingFlow, GradingOutcome};

/// 应用主结构
pub struct App {
    config: Config,
    flow: Arc<GradingFlow>,
    store: Arc<dyn ResultStore>,
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config) -> AppResult<Self> {
        config.validate()?;
        logging::log_startup(&config);

        let gateway: Arc<dyn ModelGateway> = Arc::new(OpenAiGateway::new(&config));
        info!("🤖 模型: {}", gateway.model_name());
        let store: Arc<dyn ResultStore> = Arc::new(ResultWriter::with_path(&config.results_file));

        Ok(Self::with_parts(config, gateway, store))
    }

    /// 使用给定的网关和写入器组装应用
    pub fn with_parts(
        config: Config,
        gateway: Arc<dyn ModelGateway>,
        store: Arc<dyn ResultStore>,
    ) -> Self {
        let flow = Arc::new(GradingFlow::new(gateway, config.retry_policy()));
        Self {
            config,
            flow,
            store,
        }
    }

    /// 评分一份答案
    pub async fn run_single(&self, submission: &Submission) -> RunReport {
        grade_and_store(&self.flow, self.store.as_ref(), submission, 1).await
    }

    /// 从 TOML 文件加载并批量评分
    pub async fn run_batch_file(&self, path: &Path) -> Result<BatchStats> {
        info!("\n📁 正在加载待评分的答案: {}", path.display());
        let submissions = load_submissions(path).await?;
        self.run_batch(submissions).await
    }

    /// 批量评分，每份答案是一次独立的流程
    pub async fn run_batch(&self, submissions: Vec<Submission>) -> Result<BatchStats> {
        let mut stats = BatchStats {
            total: submissions.len(),
            ..Default::default()
        };

        if submissions.is_empty() {
            info!("⚠️ 没有待评分的答案");
            return Ok(stats);
        }

        logging::log_submissions_loaded(stats.total, self.config.max_concurrent_runs);

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_runs));
        let mut handles = Vec::with_capacity(submissions.len());

        for (idx, submission) in submissions.into_iter().enumerate() {
            let run_index = idx + 1;
            let permit = semaphore.clone().acquire_owned().await?;
            let flow = self.flow.clone();
            let store = self.store.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                grade_and_store(&flow, store.as_ref(), &submission, run_index).await
            });
            handles.push((run_index, handle));
        }

        let (indices, handles): (Vec<usize>, Vec<_>) = handles.into_iter().unzip();
        let joined = join_all(handles).await;

        for (run_index, handle_result) in indices.into_iter().zip(joined) {
            match handle_result {
                Ok(report) => {
                    if report.outcome.is_success() {
                        stats.success += 1;
                    } else {
                        stats.failed += 1;
                    }
                    if report.persist_error.is_some() {
                        stats.persist_failed += 1;
                    }
                }
                Err(e) => {
                    error!("[答案 {}] 任务执行失败: {}", run_index, e);
                    stats.failed += 1;
                }
            }
        }

        logging::print_final_stats(
            stats.success,
            stats.failed,
            stats.total,
            &self.config.results_file,
        );

        Ok(stats)
    }
}

/// 单次评分的结果
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: GradingOutcome,
    /// 评分成功但写入结果失败时的原因，不影响评分结果本身
    pub persist_error: Option<String>,
}

/// 批量评分统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchStats {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub persist_failed: usize,
}

async fn grade_and_store(
    flow: &GradingFlow,
    store: &dyn ResultStore,
    submission: &Submission,
    run_index: usize,
) -> RunReport {
    info!(
        "[答案 {}] 📝 开始评分: {}",
        run_index,
        logging::truncate_text(&submission.answer, 40)
    );

    let outcome = flow.run(submission).await;

    let persist_error = match &outcome.result {
        Some(result) => {
            let record = EvaluationRecord::new(submission, result);
            match store.save(&record).await {
                Ok(()) => {
                    info!("[答案 {}] 💾 评分记录已保存", run_index);
                    None
                }
                Err(e) => {
                    error!("[答案 {}] ⚠️ 评分记录保存失败: {}", run_index, e);
                    Some(e.to_string())
                }
            }
        }
        None => None,
    };

    RunReport {
        outcome,
        persist_error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ScriptedGateway;
    use crate::error::StoreError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        records: Mutex<Vec<EvaluationRecord>>,
    }

    #[async_trait]
    impl ResultStore for MemoryStore {
        async fn save(&self, record: &EvaluationRecord) -> Result<(), StoreError> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    fn test_config() -> Config {
        Config {
            llm_api_key: "test-key".to_string(),
            retry_delay_ms: 0,
            max_concurrent_runs: 2,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_failed_runs_are_not_persisted() {
        let gateway = Arc::new(ScriptedGateway::new());
        let store = Arc::new(MemoryStore::default());
        let app = App::with_parts(test_config(), gateway, store.clone());

        let stats = app
            .run_batch(vec![
                Submission::new("", "Question ?", "Réponse"),
                Submission::new("Texte", "", "Réponse"),
                Submission::new("Texte", "Question ?", " "),
            ])
            .await
            .unwrap();

        assert_eq!(
            stats,
            BatchStats {
                total: 3,
                success: 0,
                failed: 3,
                persist_failed: 0,
            }
        );
        assert!(store.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let app = App::with_parts(
            test_config(),
            Arc::new(ScriptedGateway::new()),
            Arc::new(MemoryStore::default()),
        );

        let stats = app.run_batch(Vec::new()).await.unwrap();
        assert_eq!(stats.total, 0);
    }

    #[test]
    fn test_initialize_requires_api_key() {
        assert!(App::initialize(Config::default()).is_err());
    }
}
