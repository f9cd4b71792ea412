/// 日志工具模块
///
/// 提供日志初始化、格式化和评分报告输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::workflow::{GradingOutcome, StepRecord};

/// 初始化日志
///
/// `RUST_LOG` 优先；否则 `verbose` 为真时使用 debug 级别，默认 info。
/// 重复调用不会报错（测试中常见）。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 答案评分流程");
    info!("🌐 API: {}", config.llm_api_base_url);
    info!(
        "🔁 重试: 最多 {} 次，间隔 {} ms",
        config.max_retries, config.retry_delay_ms
    );
    info!("📊 最大并发数: {}", config.max_concurrent_runs);
    info!("{}", "=".repeat(60));
}

/// 记录批量加载信息
pub fn log_submissions_loaded(total: usize, max_concurrent: usize) {
    info!("✓ 找到 {} 份待评分的答案", total);
    info!("📋 最多同时进行 {} 个评分流程\n", max_concurrent);
}

/// 打印批量评分的最终统计
pub fn print_final_stats(success: usize, failed: usize, total: usize, results_file: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部评分完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", success, total);
    info!("❌ 失败: {}", failed);
    info!("{}", "=".repeat(60));
    info!("\n评分结果已追加至: {}", results_file);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大字符数
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

/// 把评分结果渲染为逐步报告
pub fn render_report(outcome: &GradingOutcome) -> String {
    let mut out = String::new();

    for step in &outcome.steps {
        render_step(&mut out, step);
    }

    out.push_str(&format!("{}\n", "=".repeat(60)));
    match &outcome.result {
        Some(result) => {
            out.push_str(&format!("最终得分: {:.2} / 100\n", result.final_score));
            out.push_str(&format!("反馈: {}\n", result.feedback));
        }
        None => {
            out.push_str("评分未完成，没有最终结果\n");
            if let Some(step) = outcome.failed_step() {
                out.push_str(&format!(
                    "停止于: {} ({})\n",
                    step.name,
                    step.error_detail.as_deref().unwrap_or("未知错误")
                ));
            }
        }
    }
    out.push_str(&format!("{}\n", "=".repeat(60)));

    out
}

fn render_step(out: &mut String, step: &StepRecord) {
    let marker = if step.is_success() { "✓" } else { "✗" };
    out.push_str(&format!("{}\n", "─".repeat(60)));
    out.push_str(&format!("{} {} [{:?}]\n", marker, step.name, step.status));

    if !step.inputs.is_null() {
        out.push_str(&format!(
            "  输入: {}\n",
            truncate_text(&step.inputs.to_string(), 300)
        ));
    }
    for log in &step.attempt_logs {
        out.push_str(&format!("  · {}\n", log));
    }
    if let Some(raw) = &step.raw_output {
        out.push_str(&format!("  原始输出: {}\n", truncate_text(raw, 300)));
    }
    if let Some(parsed) = &step.parsed_output {
        let pretty = serde_json::to_string_pretty(parsed).unwrap_or_else(|_| parsed.to_string());
        out.push_str("  解析结果:\n");
        for line in pretty.lines() {
            out.push_str(&format!("    {}\n", line));
        }
    }
    if let Some(detail) = &step.error_detail {
        out.push_str(&format!("  错误: {}\n", detail));
    }
}
