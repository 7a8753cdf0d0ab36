use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::fs;

use crate::models::{Candidate, JobFilter};

/// 资料文件内容：候选人 + 可选的搜索条件
#[derive(Debug, Clone)]
pub struct Profile {
    pub candidate: Candidate,
    pub job_filter: Option<JobFilter>,
}

#[derive(Deserialize)]
struct ProfileFile {
    candidate: CandidateSection,
    #[serde(default)]
    job_filter: Option<JobFilter>,
}

#[derive(Deserialize)]
struct CandidateSection {
    #[serde(flatten)]
    candidate: Candidate,
    /// 简历纯文本文件（与 resume_text 二选一）
    #[serde(default)]
    resume_text_path: Option<PathBuf>,
}

/// 从 TOML 文件加载候选人资料
///
/// 相对路径（简历文件、简历文本）以资料文件所在目录为基准。
pub async fn load_profile(profile_path: &Path) -> Result<Profile> {
    let content = fs::read_to_string(profile_path)
        .await
        .with_context(|| format!("无法读取资料文件: {}", profile_path.display()))?;

    let file: ProfileFile = toml::from_str(&content)
        .with_context(|| format!("无法解析资料文件: {}", profile_path.display()))?;

    let base_dir = profile_path.parent().unwrap_or_else(|| Path::new("."));
    let mut candidate = file.candidate.candidate;

    if let Some(text_path) = file.candidate.resume_text_path {
        let text_path = resolve(base_dir, &text_path);
        candidate.resume_text = fs::read_to_string(&text_path)
            .await
            .with_context(|| format!("无法读取简历文本: {}", text_path.display()))?;
    }

    if let Some(resume) = candidate.resume_path.take() {
        let resume = resolve(base_dir, &resume);
        if !resume.exists() {
            tracing::warn!("简历文件不存在，将跳过上传字段: {}", resume.display());
        }
        candidate.resume_path = Some(resume);
    }

    if !candidate.is_complete() {
        tracing::warn!("候选人资料不完整（缺少姓名或简历文本），LLM 回答质量会下降");
    }

    Ok(Profile {
        candidate,
        job_filter: file.job_filter,
    })
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
