use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use answer_grader::models::submission::classroom_sample;
use answer_grader::utils::logging;
use answer_grader::{App, Config, Submission};

/// 对照原文和问题为学生答案评分
#[derive(Parser, Debug)]
#[command(name = "answer_grader", version, about)]
struct Args {
    /// 原文
    #[arg(long, conflicts_with = "text_file")]
    text: Option<String>,

    /// 从文件读取原文
    #[arg(long)]
    text_file: Option<PathBuf>,

    /// 问题
    #[arg(long)]
    question: Option<String>,

    /// 学生答案
    #[arg(long, conflicts_with = "answer_file")]
    answer: Option<String>,

    /// 从文件读取学生答案
    #[arg(long)]
    answer_file: Option<PathBuf>,

    /// 批量评分文件（TOML，包含 [[submissions]]）
    #[arg(long, conflicts_with_all = ["text", "text_file", "question", "answer", "answer_file"])]
    batch: Option<PathBuf>,

    /// 以 JSON 输出评分结果
    #[arg(long)]
    json: bool,

    /// 显示详细日志
    #[arg(long, env = "VERBOSE_LOGGING")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 加载配置
    let mut config = Config::from_env();
    config.verbose_logging |= args.verbose;

    // 初始化日志
    logging::init(config.verbose_logging);

    let app = App::initialize(config)?;

    if let Some(batch) = &args.batch {
        let stats = app.run_batch_file(batch).await?;
        if args.json {
            println!(
                "{}",
                serde_json::json!({
                    "total": stats.total,
                    "success": stats.success,
                    "failed": stats.failed,
                    "persist_failed": stats.persist_failed,
                })
            );
        }
        return Ok(());
    }

    let submission = submission_from_args(&args).await?;
    let report = app.run_single(&submission).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report.outcome)?);
    } else {
        print!("{}", logging::render_report(&report.outcome));
        if let Some(e) = &report.persist_error {
            println!("评分记录未保存: {}", e);
        }
    }

    Ok(())
}

/// 未提供的字段使用内置示例补齐
async fn submission_from_args(args: &Args) -> Result<Submission> {
    let sample = classroom_sample();

    let text = match (&args.text, &args.text_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => read_file(path).await?,
        (None, None) => sample.text,
    };
    let answer = match (&args.answer, &args.answer_file) {
        (Some(answer), _) => answer.clone(),
        (None, Some(path)) => read_file(path).await?,
        (None, None) => sample.answer,
    };
    let question = args.question.clone().unwrap_or(sample.question);

    Ok(Submission::new(text, question, answer))
}

async fn read_file(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取文件: {}", path.display()))
}
