//! 投递上下文
//!
//! 封装"我正在处理第几个职位、是哪个职位"这一信息

use std::fmt::Display;

/// 投递上下文
///
/// 只用于日志前缀，不参与流程判断
#[derive(Debug, Clone)]
pub struct ApplyCtx {
    /// 本次运行中的序号（从1开始）
    pub job_index: usize,

    /// 站点上的职位ID
    pub job_id: String,
}

impl ApplyCtx {
    /// 创建新的投递上下文
    pub fn new(job_index: usize, job_id: impl Into<String>) -> Self {
        Self {
            job_index,
            job_id: job_id.into(),
        }
    }
}

impl Display for ApplyCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[职位 {} #{}]", self.job_index, self.job_id)
    }
}
