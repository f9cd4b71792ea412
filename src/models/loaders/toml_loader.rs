use crate::models::submission::Submission;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

/// 批量评分文件的结构
///
/// ```toml
/// [[submissions]]
/// text = "..."
/// question = "..."
/// answer = "..."
/// ```
#[derive(Debug, Deserialize)]
struct SubmissionBatch {
    #[serde(default)]
    submissions: Vec<Submission>,
}

/// 解析批量评分 TOML 内容
pub fn parse_submissions(content: &str) -> Result<Vec<Submission>> {
    let batch: SubmissionBatch = toml::from_str(content).context("无法解析批量评分内容")?;
    Ok(batch.submissions)
}

/// 从 TOML 文件加载待评分的答案列表
///
/// 字段不完整的条目会被跳过并记录警告。
pub async fn load_submissions(toml_file_path: &Path) -> Result<Vec<Submission>> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let submissions = parse_submissions(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    let total = submissions.len();
    let complete: Vec<Submission> = submissions
        .into_iter()
        .enumerate()
        .filter_map(|(index, submission)| {
            if submission.is_complete() {
                Some(submission)
            } else {
                tracing::warn!("跳过第 {} 条：原文、问题或答案为空", index + 1);
                None
            }
        })
        .collect();

    tracing::info!("成功加载 {}/{} 条待评分答案", complete.len(), total);

    Ok(complete)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_submissions() {
        let content = r#"
[[submissions]]
text = "Le cycle de l'eau comprend trois étapes."
question = "Quelles sont les étapes ?"
answer = "évaporation, condensation"

[[submissions]]
text = "Texte"
question = "Question"
answer = ""
"#;
        let submissions = parse_submissions(content).unwrap();
        assert_eq!(submissions.len(), 2);
        assert_eq!(submissions[0].answer, "évaporation, condensation");
        assert!(!submissions[1].is_complete());
    }

    #[tokio::test]
    async fn test_load_skips_incomplete_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.toml");
        std::fs::write(
            &path,
            "[[submissions]]\ntext = \"t\"\nquestion = \"q\"\nanswer = \"a\"\n\n[[submissions]]\ntext = \"t\"\nquestion = \"\"\nanswer = \"a\"\n",
        )
        .unwrap();

        let submissions = load_submissions(&path).await.unwrap();
        assert_eq!(submissions, vec![Submission::new("t", "q", "a")]);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let result = load_submissions(Path::new("/nonexistent/batch.toml")).await;
        assert!(result.is_err());
    }
}
