//! 投递流程 - 流程层
//!
//! 核心职责：定义"一个职位"的完整投递流程
//!
//! 状态顺序：
//! 1. 职位已打开 → 点击 Easy Apply
//! 2. 表单第 n 页：提取字段 → 解析答案 → 填写 → 按 Submit / Review / Next 的优先级点击
//! 3. 终态：已提交 / 失败 / 跳过
//!
//! 任何驱动错误都在这里转成失败结果，不会越过单个职位的边界。

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::DriverError;
use crate::infrastructure::selectors;
use crate::infrastructure::AutomationDriver;
use crate::models::{ApplicationStatus, FieldKind, FormField, JobListing};
use crate::services::field_filler::DropdownOption;
use crate::services::{
    AnswerResolver, ApplicationStore, FieldFiller, FillReport, FormExtractor, Pacer,
};
use crate::utils::truncate_text;
use crate::workflow::apply_ctx::ApplyCtx;
use crate::workflow::stop_signal::StopSignal;

pub const ALREADY_APPLIED: &str = "已申请过";
pub const APPLY_CONTROL_NOT_FOUND: &str = "找不到 Easy Apply 按钮";
pub const FLOW_NOT_COMPLETED: &str = "表单流程未完成（找不到下一步按钮）";
pub const FORM_TOO_COMPLEX: &str = "表单过于复杂或超时";
pub const STOPPED_BEFORE_COMPLETION: &str = "投递完成前收到停止请求";

/// 提交后等待确认弹窗出现的时间
const POST_SUBMIT_WAIT: Duration = Duration::from_secs(2);

/// 单次投递的状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    ListingOpened,
    EasyApplyClicked,
    /// 第 n 页表单（从 1 开始）
    FormPage(usize),
    /// 第 n 页点了 Review，等待提交
    Review(usize),
    Submitted,
    Failed(String),
    Skipped(String),
}

/// 投递结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyResult {
    pub status: ApplicationStatus,
    pub message: String,
    /// 本次投递所有 LLM 调用消耗的 token（无论结果如何）
    pub tokens_used: u32,
    /// 实际处理的表单页数
    pub pages: usize,
    pub report: FillReport,
    /// 数据库中已有成功记录而跳过（这种结果不需要再保存）
    pub already_applied: bool,
}

impl ApplyResult {
    fn new(status: ApplicationStatus, message: impl Into<String>, pages: usize, report: FillReport) -> Self {
        Self {
            status,
            message: message.into(),
            tokens_used: report.tokens_used,
            pages,
            report,
            already_applied: false,
        }
    }

    /// 还没进入投递流程就失败（例如职位页打不开）
    pub fn failed_before_start(message: impl Into<String>) -> Self {
        Self::new(ApplicationStatus::Failure, message, 0, FillReport::default())
    }

    fn already_applied() -> Self {
        Self {
            already_applied: true,
            ..Self::new(ApplicationStatus::Skipped, ALREADY_APPLIED, 0, FillReport::default())
        }
    }
}

/// 流程参数
#[derive(Debug, Clone, Copy)]
pub struct FlowSettings {
    /// 单个申请最多处理的表单页数
    pub max_form_pages: usize,
    /// 等待 Easy Apply 按钮出现的时间
    pub apply_button_wait: Duration,
}

impl From<&Config> for FlowSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_form_pages: config.max_form_pages,
            apply_button_wait: Duration::from_secs(config.apply_button_wait_secs),
        }
    }
}

/// 投递流程
///
/// - 编排单个职位的完整投递流程
/// - 决定何时提取、何时填写、何时提交或放弃
/// - 不持有任何资源，只借用驱动和能力层服务
pub struct ApplicationFlow<'a> {
    driver: &'a dyn AutomationDriver,
    resolver: &'a AnswerResolver,
    store: &'a dyn ApplicationStore,
    pacer: Pacer,
    stop: StopSignal,
    settings: FlowSettings,
}

impl<'a> ApplicationFlow<'a> {
    pub fn new(
        driver: &'a dyn AutomationDriver,
        resolver: &'a AnswerResolver,
        store: &'a dyn ApplicationStore,
        pacer: Pacer,
        stop: StopSignal,
        settings: FlowSettings,
    ) -> Self {
        Self {
            driver,
            resolver,
            store,
            pacer,
            stop,
            settings,
        }
    }

    /// 对已经打开的职位执行投递
    pub async fn run(&self, job: &JobListing, ctx: &ApplyCtx) -> ApplyResult {
        if self.recorded_as_applied(job, ctx).await {
            info!("{} ⏭️ 数据库中已有成功记录，跳过", ctx);
            return ApplyResult::already_applied();
        }
        if self.page_shows_applied(ctx).await {
            info!("{} ⏭️ 页面显示已申请，跳过", ctx);
            return ApplyResult::new(
                ApplicationStatus::Skipped,
                ALREADY_APPLIED,
                0,
                FillReport::default(),
            );
        }

        let mut report = FillReport::default();
        let mut pages = 0;
        let mut state = FlowState::ListingOpened;

        loop {
            debug!("{} 状态: {:?}", ctx, state);
            state = match state {
                FlowState::ListingOpened => match self.click_easy_apply().await {
                    Ok(true) => FlowState::EasyApplyClicked,
                    Ok(false) => FlowState::Skipped(APPLY_CONTROL_NOT_FOUND.to_string()),
                    Err(e) => FlowState::Failed(e.to_string()),
                },

                FlowState::EasyApplyClicked => FlowState::FormPage(1),

                FlowState::FormPage(n) if n > self.settings.max_form_pages => {
                    warn!("{} ⚠️ 超过 {} 页仍未提交", ctx, self.settings.max_form_pages);
                    FlowState::Failed(FORM_TOO_COMPLEX.to_string())
                }

                FlowState::FormPage(n) if n > 1 && self.stop.is_stopped() => {
                    FlowState::Skipped(STOPPED_BEFORE_COMPLETION.to_string())
                }

                FlowState::FormPage(n) => {
                    pages = n;
                    match self.process_page(n, job, ctx, &mut report).await {
                        Ok(next) => next,
                        Err(e) => FlowState::Failed(e.to_string()),
                    }
                }

                FlowState::Review(n) => {
                    self.pacer.wait_before_action().await;
                    match self.click_control(selectors::SUBMIT_BUTTON).await {
                        Ok(true) => FlowState::Submitted,
                        Ok(false) => FlowState::FormPage(n + 1),
                        Err(e) => FlowState::Failed(e.to_string()),
                    }
                }

                FlowState::Submitted => {
                    self.dismiss_after_submit(ctx).await;
                    info!("{} ✅ 投递成功 ({})", ctx, report);
                    return ApplyResult::new(
                        ApplicationStatus::Success,
                        format!("投递成功，共 {} 页", pages),
                        pages,
                        report,
                    );
                }

                FlowState::Failed(message) => {
                    warn!("{} ❌ 投递失败: {}", ctx, message);
                    self.discard_application(ctx).await;
                    return ApplyResult::new(ApplicationStatus::Failure, message, pages, report);
                }

                FlowState::Skipped(message) => {
                    info!("{} ⏭️ 跳过: {}", ctx, message);
                    if pages > 0 {
                        self.discard_application(ctx).await;
                    }
                    return ApplyResult::new(ApplicationStatus::Skipped, message, pages, report);
                }
            };
        }
    }

    /// 数据库中已有成功记录
    async fn recorded_as_applied(&self, job: &JobListing, ctx: &ApplyCtx) -> bool {
        if job.job_id.is_empty() {
            return false;
        }
        match self.store.is_already_applied(&job.job_id).await {
            Ok(applied) => applied,
            Err(e) => {
                warn!("{} 查询投递记录失败: {}", ctx, e);
                false
            }
        }
    }

    /// 页面上显示"已申请"
    async fn page_shows_applied(&self, ctx: &ApplyCtx) -> bool {
        match self.driver.find_element(selectors::APPLIED_INDICATOR).await {
            Ok(found) => found.is_some(),
            Err(e) => {
                debug!("{} 检查已申请标记失败: {}", ctx, e);
                false
            }
        }
    }

    async fn click_easy_apply(&self) -> Result<bool, DriverError> {
        let Some(button) = self
            .driver
            .wait_for_element(selectors::EASY_APPLY_BUTTON, self.settings.apply_button_wait)
            .await?
        else {
            return Ok(false);
        };
        self.pacer.wait_before_action().await;
        self.driver.click(&button).await?;
        self.pacer.wait_before_action().await;
        Ok(true)
    }

    /// 处理一页表单，返回下一个状态
    async fn process_page(
        &self,
        n: usize,
        job: &JobListing,
        ctx: &ApplyCtx,
        report: &mut FillReport,
    ) -> Result<FlowState, DriverError> {
        info!("{} 📄 第 {} 页表单", ctx, n);

        let container = self.driver.find_element(selectors::MODAL_CONTENT).await?;
        let extraction = FormExtractor::new(self.driver)
            .extract(container.as_ref())
            .await?;

        let mut page_report = FillReport {
            discarded: extraction.discarded,
            ..FillReport::default()
        };
        let filler = FieldFiller::new(self.driver, self.pacer);
        for field in &extraction.fields {
            self.fill_field(&filler, field, job, ctx, &mut page_report).await;
        }
        debug!("{} 第 {} 页: {}", ctx, n, page_report);
        *report += page_report;

        self.pacer.wait_before_action().await;
        if self.click_control(selectors::SUBMIT_BUTTON).await? {
            return Ok(FlowState::Submitted);
        }
        if self.click_control(selectors::REVIEW_BUTTON).await? {
            return Ok(FlowState::Review(n));
        }
        if self.click_control(selectors::NEXT_BUTTON).await? {
            return Ok(FlowState::FormPage(n + 1));
        }
        Ok(FlowState::Failed(FLOW_NOT_COMPLETED.to_string()))
    }

    /// 解析并填写单个字段，结果只计入统计，不会中断本页
    async fn fill_field(
        &self,
        filler: &FieldFiller<'_>,
        field: &FormField,
        job: &JobListing,
        ctx: &ApplyCtx,
        report: &mut FillReport,
    ) {
        let dropdown: Vec<DropdownOption> = if field.kind() == FieldKind::Dropdown {
            match filler.expand_dropdown(field).await {
                Ok(options) => options,
                Err(e) => {
                    warn!("{} 展开下拉框 '{}' 失败: {}", ctx, field.label, e);
                    report.errored += 1;
                    return;
                }
            }
        } else {
            Vec::new()
        };
        let options: Vec<String> = match field.kind() {
            FieldKind::Dropdown => dropdown.iter().map(|o| o.text.clone()).collect(),
            _ => field.options(),
        };

        let resolution = self.resolver.resolve(field, &options, Some(job)).await;
        report.tokens_used += resolution.tokens_used;

        let Some(value) = resolution.value else {
            if resolution.oracle_error.is_some() {
                report.errored += 1;
            } else {
                report.skipped += 1;
            }
            debug!("{} 跳过字段 '{}'", ctx, field.label);
            return;
        };

        match filler.fill(field, &value, &dropdown).await {
            Ok(true) => {
                report.filled += 1;
                info!(
                    "{}     ✓ {}: {}",
                    ctx,
                    truncate_text(&field.label, 40),
                    truncate_text(&value.to_string(), 50)
                );
            }
            Ok(false) => {
                report.skipped += 1;
                debug!("{} 字段 '{}' 未能写入", ctx, field.label);
            }
            Err(e) => {
                report.errored += 1;
                warn!("{} 填写字段 '{}' 失败: {}", ctx, field.label, e);
            }
        }
    }

    /// 找到控件就点击，找不到返回 `false`
    async fn click_control(&self, selector: &str) -> Result<bool, DriverError> {
        match self.driver.find_element(selector).await? {
            Some(button) => {
                self.driver.click(&button).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// 关闭提交后的确认弹窗，保证下一个职位从干净的页面开始
    async fn dismiss_after_submit(&self, ctx: &ApplyCtx) {
        self.pacer.wait_before_action().await;
        let dismissed = match self
            .driver
            .wait_for_element(selectors::DISMISS_BUTTON, POST_SUBMIT_WAIT)
            .await
        {
            Ok(Some(button)) => self.driver.click(&button).await,
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };
        if let Err(e) = dismissed {
            debug!("{} 关闭确认弹窗失败: {}", ctx, e);
        }
    }

    /// 关闭申请弹窗并确认放弃
    async fn discard_application(&self, ctx: &ApplyCtx) {
        let result: Result<(), DriverError> = async {
            if self.click_control(selectors::DISMISS_BUTTON).await? {
                self.pacer.wait_before_action().await;
                self.click_control(selectors::DISCARD_BUTTON).await?;
            }
            Ok(())
        }
        .await;
        if let Err(e) = result {
            debug!("{} 关闭申请弹窗失败: {}", ctx, e);
        }
    }
}
