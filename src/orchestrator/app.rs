//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：日志文件、数据库、个人资料、浏览器、LLM
//! 2. **资源管理**：唯一持有 Browser / CdpDriver / SqliteStore 的模块
//! 3. **运行**：确认登录后交给 `BotRunner`，结束时输出统计
//! 4. **清理**：关闭自行启动的浏览器
//!
//! 不处理单个职位的细节。

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chromiumoxide::Browser;
use chrono::Local;
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::browser;
use crate::config::Config;
use crate::infrastructure::{CdpDriver, JsExecutor};
use crate::models::loaders::load_profile;
use crate::models::JobFilter;
use crate::orchestrator::runner::{BotRunner, RunStats, RunnerSettings};
use crate::services::{
    AnswerOracle, AnswerResolver, ApplicationStore, Credentials, FailureLog, Governor, JobBoard,
    LlmService, OpsecConfig, SqliteStore,
};
use crate::utils::logging::{init_log_file, log_startup, print_final_stats};
use crate::workflow::StopSignal;

/// 应用主结构
pub struct App {
    config: Config,
    browser: Browser,
    /// 是否由本程序启动（连接到的用户浏览器不关闭）
    launched: bool,
    driver: CdpDriver,
    store: SqliteStore,
    resolver: AnswerResolver,
    governor: Governor,
    job_filter: JobFilter,
    stop: StopSignal,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config, stop: StopSignal) -> Result<Self> {
        config.validate()?;

        init_log_file(&config.output_log_file)?;

        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("无法创建数据目录 {}", config.data_dir))?;
        let store = SqliteStore::open(&config.database_path())?;

        let profile = load_profile(Path::new(&config.profile_path)).await?;
        let job_filter = resolve_job_filter(&store, profile.job_filter).await?;

        let today = Local::now().date_naive();
        let applied_today = store.get_today_count(today).await?;
        let mut governor = Governor::new(OpsecConfig::from(&config), config.account_age_days);
        governor.seed_applications_today(applied_today);
        log_startup(governor.daily_limit(), applied_today);

        let (browser, page, launched) = if config.use_existing_browser {
            let host = Url::parse(&config.target_url)
                .ok()
                .and_then(|url| url.host_str().map(str::to_string));
            let (browser, page) = browser::connect_to_browser_and_page(
                config.browser_debug_port,
                &config.target_url,
                host.as_deref(),
            )
            .await?;
            (browser, page, false)
        } else {
            let profile_dir = Path::new(&config.data_dir).join("browser-profile");
            let (browser, page) = browser::launch_browser(
                &config.target_url,
                config.headless,
                config.chrome_executable.as_deref(),
                &profile_dir,
            )
            .await?;
            (browser, page, true)
        };

        let driver = CdpDriver::new(JsExecutor::new(page));

        let oracle: Arc<dyn AnswerOracle> = Arc::new(LlmService::new(&config));
        let resolver = AnswerResolver::new(oracle, profile.candidate, config.description_char_budget);

        Ok(Self {
            config,
            browser,
            launched,
            driver,
            store,
            resolver,
            governor,
            job_filter,
            stop,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&mut self) -> Result<RunStats> {
        let board = JobBoard::new(&self.driver, &self.config.target_url, self.governor.pacer());
        if !board.ensure_logged_in(self.credentials().as_ref()).await? {
            bail!("未登录，无法继续投递");
        }

        info!(
            "🔍 搜索: {:?} @ {}{}",
            self.job_filter.keywords(),
            self.job_filter.location(),
            if self.job_filter.remote_only() { " (远程)" } else { "" }
        );

        let runner = BotRunner::new(
            &self.driver,
            &self.store,
            &self.resolver,
            &mut self.governor,
            RunnerSettings::from(&self.config),
            self.stop.clone(),
        );
        let mut runner = runner.with_failure_log(FailureLog::with_path(&self.config.output_log_file));

        let mut status_rx = runner.subscribe();
        let status_task = tokio::spawn(async move {
            while status_rx.changed().await.is_ok() {
                let status = status_rx.borrow_and_update().clone();
                debug!(
                    "📊 今日 {}/{}，连续失败 {}，休息中: {}",
                    status.applications_today,
                    status.daily_limit,
                    status.consecutive_errors,
                    status.paused
                );
            }
        });

        let stats = runner.run(&self.job_filter).await;
        drop(runner);
        status_task.abort();

        print_final_stats(&stats, &self.config.output_log_file);
        Ok(stats)
    }

    /// 清理资源
    pub async fn shutdown(mut self) -> Result<()> {
        if self.launched {
            info!("🧹 关闭浏览器");
            if let Err(e) = self.browser.close().await {
                warn!("关闭浏览器失败: {}", e);
            }
        }
        Ok(())
    }

    fn credentials(&self) -> Option<Credentials> {
        match (&self.config.linkedin_username, &self.config.linkedin_password) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }
}

/// 个人资料里的搜索条件优先，并保存到数据库；否则使用上次保存的
async fn resolve_job_filter(
    store: &dyn ApplicationStore,
    from_profile: Option<JobFilter>,
) -> Result<JobFilter> {
    if let Some(filter) = from_profile.filter(JobFilter::is_configured) {
        store.save_job_filter(&filter).await?;
        return Ok(filter);
    }

    match store.get_job_filter().await? {
        Some(filter) if filter.is_configured() => {
            info!("使用上次保存的搜索条件");
            Ok(filter)
        }
        _ => bail!("没有配置搜索条件，请在个人资料的 [job_filter] 中填写关键词"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn profile_filter_is_saved_and_reused() {
        let store = SqliteStore::open_in_memory().unwrap();
        let filter = JobFilter::new(["rust engineer"], "Berlin", true);

        let chosen = resolve_job_filter(&store, Some(filter.clone())).await.unwrap();
        assert_eq!(chosen, filter);

        let reused = resolve_job_filter(&store, None).await.unwrap();
        assert_eq!(reused, filter);
    }

    #[tokio::test]
    async fn missing_filter_is_an_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(resolve_job_filter(&store, None).await.is_err());

        let empty = JobFilter::new(Vec::<String>::new(), "", false);
        assert!(resolve_job_filter(&store, Some(empty)).await.is_err());
    }
}
