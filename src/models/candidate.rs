//! 候选人资料

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// 候选人资料
///
/// LLM 回答表单问题时使用的知识来源。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    /// 简历纯文本
    #[serde(default)]
    pub resume_text: String,
    /// 简历文件路径（上传用）
    #[serde(default)]
    pub resume_path: Option<PathBuf>,
    /// 个人简介 / 求职信
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experience_years: u32,
}

impl Candidate {
    /// 资料是否满足最低要求
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty() && !self.resume_text.trim().is_empty()
    }

    /// 生成送给 LLM 的候选人上下文
    pub fn context_for_ai(&self) -> String {
        let mut parts = Vec::new();

        if !self.name.is_empty() {
            parts.push(format!("Name: {}", self.name));
        }
        if !self.email.is_empty() {
            parts.push(format!("Email: {}", self.email));
        }
        if !self.phone.is_empty() {
            parts.push(format!("Phone: {}", self.phone));
        }
        if self.experience_years > 0 {
            parts.push(format!("Years of Experience: {}", self.experience_years));
        }
        if !self.skills.is_empty() {
            parts.push(format!("Skills: {}", self.skills.join(", ")));
        }
        if !self.resume_text.is_empty() {
            parts.push(format!("\n--- RESUME ---\n{}", self.resume_text));
        }
        if !self.bio.is_empty() {
            parts.push(format!("\n--- BIO/COVER LETTER ---\n{}", self.bio));
        }

        parts.join("\n")
    }
}
