//! # Answer Grader
//!
//! 通过六个串联的语言模型阶段，对照原文和问题为学生的自由作答评分
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 客户端层（Clients）
//! - `clients/` - 与外部语言模型的一次请求/响应往返
//! - `ModelGateway` - 网关抽象，`OpenAiGateway` 为 OpenAI 兼容实现
//! - `ScriptedGateway` - 预设响应的假网关，用于测试
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，每个阶段只做一件事
//! - 问题理解 / 细则提取 / 答案理解 / 语法评估 / 细则评分 / 最终评分
//! - `ResultWriter` - 追加写入评分记录
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一份答案"的完整评分流程
//! - `RetryPolicy` - 所有阶段共用的重试策略
//! - `GradingFlow` - 阶段串联、逻辑检查、失败即停
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 组装依赖，单次与批量评分，并发控制
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{ModelGateway, OpenAiGateway, ScriptedGateway};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{FinalResult, Submission};
pub use orchestrator::{App, BatchStats, RunReport};
pub use workflow::{GradingFlow, GradingOutcome, RetryPolicy, StepRecord, StepStatus};
