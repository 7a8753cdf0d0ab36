//! 投递记录

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 投递状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Success,
    Failure,
    Skipped,
    Pending,
}

impl ApplicationStatus {
    /// 数据库中的存储值
    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Success => "success",
            ApplicationStatus::Failure => "failure",
            ApplicationStatus::Skipped => "skipped",
            ApplicationStatus::Pending => "pending",
        }
    }

    /// 带图标的显示文本
    pub fn display(self) -> &'static str {
        match self {
            ApplicationStatus::Success => "✅ 成功",
            ApplicationStatus::Failure => "❌ 失败",
            ApplicationStatus::Skipped => "⏭️ 跳过",
            ApplicationStatus::Pending => "⏳ 待处理",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(ApplicationStatus::Success),
            "failure" => Ok(ApplicationStatus::Failure),
            "skipped" => Ok(ApplicationStatus::Skipped),
            "pending" => Ok(ApplicationStatus::Pending),
            other => Err(format!("未知的投递状态: {}", other)),
        }
    }
}

/// 一次投递尝试的结果记录
///
/// 以 `job_id` 为唯一键，重复保存会覆盖旧记录。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationOutcome {
    pub job_id: String,
    pub company: String,
    pub title: String,
    pub location: String,
    pub timestamp: DateTime<Utc>,
    pub status: ApplicationStatus,
    pub log_message: String,
    pub tokens_used: u32,
}

impl ApplicationOutcome {
    pub fn is_successful(&self) -> bool {
        self.status == ApplicationStatus::Success
    }
}
