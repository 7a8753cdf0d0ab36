//! 失败记录服务 - 业务能力层
//!
//! 只负责"把没有成功的投递追加到运行日志"能力，不关心流程

use anyhow::Result;
use std::fs::OpenOptions;
use std::io::Write;
use tracing::debug;

use crate::models::ApplicationOutcome;

/// 失败记录服务
///
/// 职责：
/// - 每个未成功的职位追加一行到日志文件
/// - 只处理单条结果
/// - 不关心流程顺序
pub struct FailureLog {
    log_file_path: String,
}

impl FailureLog {
    /// 使用自定义文件路径创建
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            log_file_path: path.into(),
        }
    }

    /// 追加一条记录
    ///
    /// 格式：`job_id | status | title @ company | message`
    pub fn write(&self, outcome: &ApplicationOutcome) -> Result<()> {
        debug!(
            "写入失败记录: 职位 {} | 状态 {}",
            outcome.job_id, outcome.status
        );

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file_path)?;

        let line = format!(
            "{} | {} | {} @ {} | {}\n",
            outcome.job_id,
            outcome.status.display(),
            outcome.title,
            outcome.company,
            outcome.log_message.replace('\n', " ")
        );

        file.write_all(line.as_bytes())?;

        Ok(())
    }
}
