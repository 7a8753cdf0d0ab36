//! 投递调度器 - 编排层
//!
//! ## 职责
//!
//! 1. **搜索翻页**：逐页读取搜索结果中的职位
//! 2. **频率控制**：每个职位前询问 `Governor`，休息时轮询等待，致命原因时停止
//! 3. **流程调度**：打开职位并交给 `ApplicationFlow`
//! 4. **结果记录**：保存投递记录、更新当日统计、通知 `Governor`
//! 5. **状态广播**：通过 watch channel 发布频率控制状态快照
//!
//! 同一时间只处理一个职位。

use std::time::Duration;

use chrono::{Local, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::infrastructure::AutomationDriver;
use crate::models::{job_id_from_url, ApplicationOutcome, ApplicationStatus, JobFilter, JobListing};
use crate::services::{
    AnswerResolver, ApplicationStore, FailureLog, Governor, JobBoard, OpsecStatus,
};
use crate::utils::logging::log_jobs_loaded;
use crate::workflow::{ApplicationFlow, ApplyCtx, ApplyResult, FlowSettings, StopSignal};

pub const STOP_REQUESTED: &str = "收到停止请求";

/// 本次运行的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub success: usize,
    pub failure: usize,
    pub skipped: usize,
    pub tokens_used: u64,
    /// 提前停止的原因（每日上限、连续失败、手动停止）
    pub halt_reason: Option<String>,
}

impl RunStats {
    pub fn attempted(&self) -> usize {
        self.success + self.failure + self.skipped
    }

    fn record(&mut self, status: ApplicationStatus, tokens_used: u32) {
        match status {
            ApplicationStatus::Success => self.success += 1,
            ApplicationStatus::Failure => self.failure += 1,
            ApplicationStatus::Skipped | ApplicationStatus::Pending => self.skipped += 1,
        }
        self.tokens_used += u64::from(tokens_used);
    }
}

/// 调度参数
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub target_url: String,
    pub max_search_pages: usize,
    /// 休息期间的轮询间隔
    pub pause_poll: Duration,
    pub flow: FlowSettings,
}

impl From<&Config> for RunnerSettings {
    fn from(config: &Config) -> Self {
        Self {
            target_url: config.target_url.clone(),
            max_search_pages: config.max_search_pages,
            pause_poll: Duration::from_secs(config.pause_poll_secs.max(1)),
            flow: FlowSettings::from(config),
        }
    }
}

enum Gate {
    Proceed,
    Halt(String),
}

/// 投递调度器
pub struct BotRunner<'a> {
    driver: &'a dyn AutomationDriver,
    store: &'a dyn ApplicationStore,
    resolver: &'a AnswerResolver,
    governor: &'a mut Governor,
    settings: RunnerSettings,
    stop: StopSignal,
    status_tx: watch::Sender<OpsecStatus>,
    failure_log: Option<FailureLog>,
}

impl<'a> BotRunner<'a> {
    pub fn new(
        driver: &'a dyn AutomationDriver,
        store: &'a dyn ApplicationStore,
        resolver: &'a AnswerResolver,
        governor: &'a mut Governor,
        settings: RunnerSettings,
        stop: StopSignal,
    ) -> Self {
        let (status_tx, _) = watch::channel(governor.status());
        Self {
            driver,
            store,
            resolver,
            governor,
            settings,
            stop,
            status_tx,
            failure_log: None,
        }
    }

    /// 非成功的结果额外写入运行日志
    pub fn with_failure_log(mut self, failure_log: FailureLog) -> Self {
        self.failure_log = Some(failure_log);
        self
    }

    /// 订阅频率控制状态（读到的可能是稍旧的快照）
    pub fn subscribe(&self) -> watch::Receiver<OpsecStatus> {
        self.status_tx.subscribe()
    }

    /// 按搜索条件逐页投递，直到结果用完或需要停止
    pub async fn run(&mut self, filter: &JobFilter) -> RunStats {
        let mut stats = RunStats::default();
        let pacer = self.governor.pacer();

        for page in 0..self.settings.max_search_pages {
            if self.stop.is_stopped() {
                stats.halt_reason = Some(STOP_REQUESTED.to_string());
                break;
            }

            let board = JobBoard::new(self.driver, &self.settings.target_url, pacer);
            let urls = match board.collect_job_urls(filter, page).await {
                Ok(urls) => urls,
                Err(e) => {
                    error!("❌ 读取第 {} 页搜索结果失败: {}", page + 1, e);
                    break;
                }
            };
            log_jobs_loaded(page, urls.len());
            if urls.is_empty() {
                break;
            }

            if let Some(reason) = self.process_urls(&urls, &mut stats).await {
                stats.halt_reason = Some(reason);
                break;
            }
        }

        stats
    }

    /// 依次处理职位地址，需要停止时返回原因
    pub async fn process_urls(&mut self, urls: &[String], stats: &mut RunStats) -> Option<String> {
        for url in urls {
            if self.stop.is_stopped() {
                return Some(STOP_REQUESTED.to_string());
            }

            if self.recorded_as_applied(url).await {
                debug!("⏭️ 已成功投递过，跳过: {}", url);
                self.governor.record_skip();
                stats.record(ApplicationStatus::Skipped, 0);
                continue;
            }

            if let Gate::Halt(reason) = self.wait_until_allowed().await {
                return Some(reason);
            }

            let ctx = ApplyCtx::new(stats.attempted() + 1, job_id_from_url(url).unwrap_or_default());
            self.governor.wait_before_application().await;
            let (job, result) = self.apply_to(url, &ctx).await;
            self.record(&job, &result, stats).await;
        }
        None
    }

    async fn recorded_as_applied(&self, url: &str) -> bool {
        let Some(job_id) = job_id_from_url(url) else {
            return false;
        };
        self.store
            .is_already_applied(&job_id)
            .await
            .unwrap_or_else(|e| {
                warn!("查询投递记录失败: {}", e);
                false
            })
    }

    /// 等到允许投递；遇到致命原因或停止请求时返回 `Halt`
    async fn wait_until_allowed(&mut self) -> Gate {
        loop {
            let decision = self.governor.can_apply();
            self.publish_status();

            let Some(reason) = decision.block_reason() else {
                return Gate::Proceed;
            };
            if reason.is_fatal() {
                warn!("⛔ 停止投递: {}", reason);
                return Gate::Halt(reason.to_string());
            }

            info!("☕ {}", reason);
            tokio::time::sleep(self.settings.pause_poll).await;
            if self.stop.is_stopped() {
                return Gate::Halt(STOP_REQUESTED.to_string());
            }
        }
    }

    /// 打开职位并执行投递流程，打开失败也转成失败结果
    async fn apply_to(&self, url: &str, ctx: &ApplyCtx) -> (JobListing, ApplyResult) {
        let board = JobBoard::new(self.driver, &self.settings.target_url, self.governor.pacer());
        let job = match board.open_listing(url).await {
            Ok(job) => job,
            Err(e) => {
                let job = JobListing {
                    job_id: ctx.job_id.clone(),
                    title: String::new(),
                    company: String::new(),
                    location: String::new(),
                    description: String::new(),
                    url: url.to_string(),
                    is_remote: false,
                };
                return (job, ApplyResult::failed_before_start(e.to_string()));
            }
        };

        info!("{} 🏢 {}", ctx, job.display_name());
        let flow = ApplicationFlow::new(
            self.driver,
            self.resolver,
            self.store,
            self.governor.pacer(),
            self.stop.clone(),
            self.settings.flow,
        );
        let result = flow.run(&job, ctx).await;
        (job, result)
    }

    async fn record(&mut self, job: &JobListing, result: &ApplyResult, stats: &mut RunStats) {
        match result.status {
            ApplicationStatus::Success => self.governor.record_success(),
            ApplicationStatus::Failure => self.governor.record_failure(),
            ApplicationStatus::Skipped | ApplicationStatus::Pending => self.governor.record_skip(),
        }
        stats.record(result.status, result.tokens_used);
        self.publish_status();

        if result.already_applied {
            return;
        }

        let outcome = ApplicationOutcome {
            job_id: if job.job_id.is_empty() {
                job.url.clone()
            } else {
                job.job_id.clone()
            },
            company: job.company.clone(),
            title: job.title.clone(),
            location: job.location.clone(),
            timestamp: Utc::now(),
            status: result.status,
            log_message: format!("{} ({})", result.message, result.report),
            tokens_used: result.tokens_used,
        };

        if let Err(e) = self.store.save_outcome(&outcome).await {
            error!("保存投递记录失败: {}", e);
        }
        if let Err(e) = self
            .store
            .increment_daily_stats(Local::now().date_naive(), result.status, result.tokens_used)
            .await
        {
            warn!("更新当日统计失败: {}", e);
        }
        if !outcome.is_successful() {
            if let Some(failure_log) = &self.failure_log {
                if let Err(e) = failure_log.write(&outcome) {
                    warn!("写入失败记录失败: {}", e);
                }
            }
        }
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(self.governor.status());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_count_by_status() {
        let mut stats = RunStats::default();
        stats.record(ApplicationStatus::Success, 10);
        stats.record(ApplicationStatus::Failure, 5);
        stats.record(ApplicationStatus::Skipped, 0);
        stats.record(ApplicationStatus::Success, 1);
        assert_eq!(stats.success, 2);
        assert_eq!(stats.failure, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.attempted(), 4);
        assert_eq!(stats.tokens_used, 16);
    }
}
