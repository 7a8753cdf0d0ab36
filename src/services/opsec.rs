//! 操作安全（频率控制）服务 - 业务能力层
//!
//! 只负责"现在能不能投递、要等多久"的判断，不关心流程
//!
//! 所有计数状态都封装在 `Governor` 内部，外部只能通过它的查询/修改方法访问。
//! `can_apply` 永远返回结构化结果，不会报错；由调用方决定拒绝是暂时的还是致命的。

use std::fmt;

use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDate};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;

/// 新账号预热阶段：账号年龄（天） → 当日上限
static WARMUP_TIERS: phf::Map<u32, u32> = phf::phf_map! {
    1u32 => 10u32,
    2u32 => 20u32,
    3u32 => 30u32,
};

/// 预热启用但不在预热阶段时的上限
const WARMUP_DEFAULT_LIMIT: u32 = 40;

/// 频率控制参数
#[derive(Debug, Clone, PartialEq)]
pub struct OpsecConfig {
    pub daily_limit: u32,
    pub warmup_enabled: bool,
    /// 单次操作延迟区间（秒）
    pub min_action_delay: f64,
    pub max_action_delay: f64,
    /// 两次投递之间的延迟区间（秒）
    pub min_application_delay: f64,
    pub max_application_delay: f64,
    pub pause_after_applications: u32,
    /// 强制休息时长区间（分钟）
    pub pause_duration_min: u32,
    pub pause_duration_max: u32,
    pub max_consecutive_errors: u32,
}

impl Default for OpsecConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for OpsecConfig {
    fn from(config: &Config) -> Self {
        Self {
            daily_limit: config.daily_limit,
            warmup_enabled: config.warmup_enabled,
            min_action_delay: config.min_action_delay,
            max_action_delay: config.max_action_delay,
            min_application_delay: config.min_application_delay,
            max_application_delay: config.max_application_delay,
            pause_after_applications: config.pause_after_applications,
            pause_duration_min: config.pause_duration_min,
            pause_duration_max: config.pause_duration_max,
            max_consecutive_errors: config.max_consecutive_errors,
        }
    }
}

/// 频率控制的内部状态
#[derive(Debug, Clone, PartialEq)]
pub struct OpsecState {
    /// 计数所属的日期，只在这一天有效
    pub current_day: NaiveDate,
    pub applications_today: u32,
    pub consecutive_errors: u32,
    pub account_age_days: u32,
    pub pause_until: Option<DateTime<Local>>,
    pub last_activity: Option<DateTime<Local>>,
    /// 上一次触发定时休息时的投递数
    pub last_pause_at_count: Option<u32>,
}

impl OpsecState {
    pub fn fresh(today: NaiveDate, account_age_days: u32) -> Self {
        Self {
            current_day: today,
            applications_today: 0,
            consecutive_errors: 0,
            account_age_days,
            pause_until: None,
            last_activity: None,
            last_pause_at_count: None,
        }
    }
}

/// 拒绝投递的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    /// 正在休息中
    Paused { remaining_minutes: i64 },
    /// 已达每日上限
    DailyLimit { limit: u32 },
    /// 连续失败过多，会话中止
    TooManyErrors { count: u32 },
    /// 刚触发定时休息
    ScheduledPause { minutes: u32, after: u32 },
}

impl BlockReason {
    /// 本次运行内无法恢复（需要停止会话）
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            BlockReason::DailyLimit { .. } | BlockReason::TooManyErrors { .. }
        )
    }

    /// 等待一段时间后会自动恢复
    pub fn is_transient(self) -> bool {
        !self.is_fatal()
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::Paused { remaining_minutes } => {
                write!(f, "休息中，还剩 {} 分钟", remaining_minutes)
            }
            BlockReason::DailyLimit { limit } => write!(f, "已达到每日上限 ({})", limit),
            BlockReason::TooManyErrors { count } => {
                write!(f, "连续失败 {} 次，会话已中止", count)
            }
            BlockReason::ScheduledPause { minutes, after } => {
                write!(f, "已投递 {} 次，强制休息 {} 分钟", after, minutes)
            }
        }
    }
}

/// `can_apply` 的判断结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyDecision {
    Allowed,
    Denied(BlockReason),
}

impl ApplyDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, ApplyDecision::Allowed)
    }

    pub fn block_reason(&self) -> Option<BlockReason> {
        match self {
            ApplyDecision::Allowed => None,
            ApplyDecision::Denied(reason) => Some(*reason),
        }
    }

    /// 给用户看的原因（允许时为空串）
    pub fn reason(&self) -> String {
        match self {
            ApplyDecision::Allowed => String::new(),
            ApplyDecision::Denied(reason) => reason.to_string(),
        }
    }
}

/// 状态快照，供界面/日志展示
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpsecStatus {
    pub applications_today: u32,
    pub daily_limit: u32,
    pub remaining_today: u32,
    pub consecutive_errors: u32,
    pub max_consecutive_errors: u32,
    pub paused: bool,
    pub pause_remaining_minutes: Option<i64>,
    pub account_age_days: u32,
    pub warmup_active: bool,
    pub aborted: bool,
}

/// 随机延迟
///
/// 只持有延迟区间，可以在不借用 `Governor` 的情况下传给流程层。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pacer {
    action: (f64, f64),
    application: (f64, f64),
}

impl Pacer {
    pub fn new(action: (f64, f64), application: (f64, f64)) -> Self {
        Self {
            action,
            application,
        }
    }

    /// 不等待（测试用）
    pub fn instant() -> Self {
        Self::new((0.0, 0.0), (0.0, 0.0))
    }

    /// 单次操作前的随机等待，返回实际等待的秒数
    pub async fn wait_before_action(&self) -> f64 {
        let delay = sample_seconds(self.action);
        sleep_seconds(delay).await;
        delay
    }

    /// 每次投递前的随机等待，返回实际等待的秒数
    pub async fn wait_before_application(&self) -> f64 {
        let delay = sample_seconds(self.application);
        if delay > 0.0 {
            info!("⏳ 投递前等待 {:.0} 秒...", delay);
        }
        sleep_seconds(delay).await;
        delay
    }
}

fn sample_seconds((min, max): (f64, f64)) -> f64 {
    if max <= min {
        return min.max(0.0);
    }
    rand::thread_rng().gen_range(min..=max)
}

async fn sleep_seconds(seconds: f64) {
    if seconds > 0.0 {
        tokio::time::sleep(std::time::Duration::from_secs_f64(seconds)).await;
    }
}

/// 频率控制器
pub struct Governor {
    config: OpsecConfig,
    state: OpsecState,
}

impl Governor {
    pub fn new(config: OpsecConfig, account_age_days: u32) -> Self {
        let state = OpsecState::fresh(Local::now().date_naive(), account_age_days);
        Self::with_state(config, state)
    }

    /// 使用已有状态创建（测试或恢复会话用）
    pub fn with_state(config: OpsecConfig, state: OpsecState) -> Self {
        Self { config, state }
    }

    /// 当前生效的每日上限
    pub fn daily_limit(&self) -> u32 {
        if !self.config.warmup_enabled {
            return self.config.daily_limit;
        }
        match WARMUP_TIERS.get(&self.state.account_age_days) {
            Some(tier) => (*tier).min(self.config.daily_limit),
            None => WARMUP_DEFAULT_LIMIT.min(self.config.daily_limit),
        }
    }

    pub fn can_apply(&mut self) -> ApplyDecision {
        self.can_apply_at(Local::now())
    }

    /// 按固定顺序判断：休息 → 每日上限 → 连续失败 → 定时休息
    pub fn can_apply_at(&mut self, now: DateTime<Local>) -> ApplyDecision {
        self.roll_day(now.date_naive());

        if let Some(until) = self.state.pause_until {
            if until > now {
                let remaining_minutes = minutes_left(until, now);
                return ApplyDecision::Denied(BlockReason::Paused { remaining_minutes });
            }
            debug!("休息结束，恢复投递");
            self.state.pause_until = None;
        }

        let limit = self.daily_limit();
        if self.state.applications_today >= limit {
            return ApplyDecision::Denied(BlockReason::DailyLimit { limit });
        }

        if self.state.consecutive_errors >= self.config.max_consecutive_errors {
            return ApplyDecision::Denied(BlockReason::TooManyErrors {
                count: self.state.consecutive_errors,
            });
        }

        let count = self.state.applications_today;
        let interval = self.config.pause_after_applications;
        if count > 0
            && interval > 0
            && count % interval == 0
            && self.state.last_pause_at_count != Some(count)
        {
            let minutes = self.sample_pause_minutes();
            self.state.pause_until = Some(now + ChronoDuration::minutes(i64::from(minutes)));
            self.state.last_pause_at_count = Some(count);
            info!("☕ 已投递 {} 次，强制休息 {} 分钟", count, minutes);
            return ApplyDecision::Denied(BlockReason::ScheduledPause {
                minutes,
                after: count,
            });
        }

        ApplyDecision::Allowed
    }

    pub fn pacer(&self) -> Pacer {
        Pacer::new(
            (self.config.min_action_delay, self.config.max_action_delay),
            (
                self.config.min_application_delay,
                self.config.max_application_delay,
            ),
        )
    }

    pub async fn wait_before_action(&self) -> f64 {
        self.pacer().wait_before_action().await
    }

    pub async fn wait_before_application(&self) -> f64 {
        self.pacer().wait_before_application().await
    }

    pub fn record_success(&mut self) {
        let now = Local::now();
        self.roll_day(now.date_naive());
        self.state.applications_today += 1;
        self.state.consecutive_errors = 0;
        self.state.last_activity = Some(now);
        debug!(
            "投递成功计数: {}/{}",
            self.state.applications_today,
            self.daily_limit()
        );
    }

    /// 失败只计入连续失败次数，不占用每日额度
    pub fn record_failure(&mut self) {
        self.state.consecutive_errors += 1;
        self.state.last_activity = Some(Local::now());
        if self.state.consecutive_errors >= self.config.max_consecutive_errors {
            warn!(
                "⚠️ 连续失败 {} 次，达到中止阈值",
                self.state.consecutive_errors
            );
        }
    }

    pub fn record_skip(&mut self) {
        self.state.consecutive_errors = 0;
    }

    pub fn force_pause(&mut self, minutes: u32) {
        self.state.pause_until = Some(Local::now() + ChronoDuration::minutes(i64::from(minutes)));
        info!("⏸️ 手动暂停 {} 分钟", minutes);
    }

    pub fn reset_daily(&mut self) {
        self.state.current_day = Local::now().date_naive();
        self.clear_counters();
        info!("🔄 已重置当日计数");
    }

    pub fn set_account_age(&mut self, days: u32) {
        self.state.account_age_days = days;
    }

    /// 用数据库中今天已成功的数量初始化计数
    pub fn seed_applications_today(&mut self, count: u32) {
        self.state.applications_today = count;
    }

    /// 连续失败已达阈值（本次运行不再投递）
    pub fn is_aborted(&self) -> bool {
        self.state.consecutive_errors >= self.config.max_consecutive_errors
    }

    pub fn status(&self) -> OpsecStatus {
        self.status_at(Local::now())
    }

    pub fn status_at(&self, now: DateTime<Local>) -> OpsecStatus {
        let daily_limit = self.daily_limit();
        let pause_remaining_minutes = self
            .state
            .pause_until
            .filter(|until| *until > now)
            .map(|until| minutes_left(until, now));
        OpsecStatus {
            applications_today: self.state.applications_today,
            daily_limit,
            remaining_today: daily_limit.saturating_sub(self.state.applications_today),
            consecutive_errors: self.state.consecutive_errors,
            max_consecutive_errors: self.config.max_consecutive_errors,
            paused: pause_remaining_minutes.is_some(),
            pause_remaining_minutes,
            account_age_days: self.state.account_age_days,
            warmup_active: self.config.warmup_enabled
                && WARMUP_TIERS.contains_key(&self.state.account_age_days),
            aborted: self.is_aborted(),
        }
    }

    fn roll_day(&mut self, today: NaiveDate) {
        if self.state.current_day != today {
            info!("📅 日期变更 ({} → {})，重置当日计数", self.state.current_day, today);
            self.state.current_day = today;
            self.clear_counters();
        }
    }

    fn clear_counters(&mut self) {
        self.state.applications_today = 0;
        self.state.consecutive_errors = 0;
        self.state.last_pause_at_count = None;
    }

    fn sample_pause_minutes(&self) -> u32 {
        let (min, max) = (self.config.pause_duration_min, self.config.pause_duration_max);
        if max <= min {
            return min;
        }
        rand::thread_rng().gen_range(min..=max)
    }
}

/// 剩余分钟数，不足一分钟按一分钟算
fn minutes_left(until: DateTime<Local>, now: DateTime<Local>) -> i64 {
    ((until - now).num_seconds() + 59) / 60
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OpsecConfig {
        OpsecConfig {
            daily_limit: 50,
            warmup_enabled: true,
            min_action_delay: 0.0,
            max_action_delay: 0.0,
            min_application_delay: 0.0,
            max_application_delay: 0.0,
            pause_after_applications: 10,
            pause_duration_min: 15,
            pause_duration_max: 30,
            max_consecutive_errors: 3,
        }
    }

    fn governor_with(config: OpsecConfig, edit: impl FnOnce(&mut OpsecState)) -> Governor {
        let mut state = OpsecState::fresh(Local::now().date_naive(), 30);
        edit(&mut state);
        Governor::with_state(config, state)
    }

    #[test]
    fn warmup_tiers_apply_for_first_three_days() {
        for (age, expected) in [(1, 10), (2, 20), (3, 30)] {
            let governor = governor_with(config(), |s| s.account_age_days = age);
            assert_eq!(governor.daily_limit(), expected, "age {}", age);
        }
    }

    #[test]
    fn warmup_outside_tiers_caps_at_forty() {
        for age in [0, 4, 30, 365] {
            let governor = governor_with(config(), |s| s.account_age_days = age);
            assert_eq!(governor.daily_limit(), 40);
        }

        let low = OpsecConfig {
            daily_limit: 25,
            ..config()
        };
        let governor = governor_with(low, |s| s.account_age_days = 10);
        assert_eq!(governor.daily_limit(), 25);
    }

    #[test]
    fn warmup_tier_never_exceeds_configured_limit() {
        let low = OpsecConfig {
            daily_limit: 5,
            ..config()
        };
        let governor = governor_with(low.clone(), |s| s.account_age_days = 1);
        assert_eq!(governor.daily_limit(), 5);

        let governor = governor_with(low, |s| s.account_age_days = 3);
        assert_eq!(governor.status().daily_limit, 5);
    }

    #[test]
    fn pause_under_a_minute_reports_one_minute() {
        let now = Local::now();
        let mut governor = governor_with(config(), |s| {
            s.pause_until = Some(now + ChronoDuration::seconds(20));
        });
        assert_eq!(
            governor.can_apply_at(now),
            ApplyDecision::Denied(BlockReason::Paused {
                remaining_minutes: 1
            })
        );
        assert_eq!(governor.status_at(now).pause_remaining_minutes, Some(1));
    }

    #[test]
    fn warmup_disabled_uses_configured_limit() {
        let cfg = OpsecConfig {
            warmup_enabled: false,
            ..config()
        };
        let governor = governor_with(cfg, |s| s.account_age_days = 1);
        assert_eq!(governor.daily_limit(), 50);
    }

    #[test]
    fn allows_one_below_the_limit() {
        let cfg = OpsecConfig {
            warmup_enabled: false,
            ..config()
        };
        let mut governor = governor_with(cfg, |s| {
            s.applications_today = 49;
            s.last_pause_at_count = None;
        });
        let decision = governor.can_apply();
        assert_eq!(decision, ApplyDecision::Allowed);
        assert_eq!(decision.reason(), "");
    }

    #[test]
    fn denies_at_or_over_daily_limit() {
        for count in [40, 41, 99] {
            let mut governor = governor_with(config(), |s| s.applications_today = count);
            let decision = governor.can_apply();
            assert_eq!(
                decision,
                ApplyDecision::Denied(BlockReason::DailyLimit { limit: 40 })
            );
            assert!(decision.block_reason().is_some_and(BlockReason::is_fatal));
        }
    }

    #[test]
    fn consecutive_errors_abort_even_under_limit() {
        let mut governor = governor_with(config(), |s| {
            s.applications_today = 3;
            s.consecutive_errors = 3;
        });
        let decision = governor.can_apply();
        assert_eq!(
            decision,
            ApplyDecision::Denied(BlockReason::TooManyErrors { count: 3 })
        );
        assert!(decision.block_reason().is_some_and(BlockReason::is_fatal));
        assert!(governor.is_aborted());
    }

    #[test]
    fn limit_is_checked_before_errors() {
        let mut governor = governor_with(config(), |s| {
            s.applications_today = 40;
            s.consecutive_errors = 5;
        });
        assert!(matches!(
            governor.can_apply().block_reason(),
            Some(BlockReason::DailyLimit { .. })
        ));
    }

    #[test]
    fn active_pause_is_checked_first() {
        let now = Local::now();
        let mut governor = governor_with(config(), |s| {
            s.applications_today = 40;
            s.pause_until = Some(now + ChronoDuration::minutes(5) + ChronoDuration::seconds(30));
        });
        let decision = governor.can_apply_at(now);
        assert_eq!(
            decision,
            ApplyDecision::Denied(BlockReason::Paused {
                remaining_minutes: 6
            })
        );
        assert!(decision.block_reason().is_some_and(BlockReason::is_transient));
    }

    #[test]
    fn expired_pause_is_cleared() {
        let now = Local::now();
        let mut governor = governor_with(config(), |s| {
            s.applications_today = 10;
            s.last_pause_at_count = Some(10);
            s.pause_until = Some(now - ChronoDuration::seconds(1));
        });
        assert_eq!(governor.can_apply_at(now), ApplyDecision::Allowed);
        assert_eq!(governor.state.pause_until, None);
    }

    #[test]
    fn day_rollover_resets_counters_idempotently() {
        let today = Local::now().date_naive();
        let mut governor = governor_with(config(), |s| {
            s.current_day = today.pred_opt().unwrap();
            s.applications_today = 12;
            s.consecutive_errors = 2;
        });

        governor.can_apply();
        assert_eq!(governor.state.current_day, today);
        assert_eq!(governor.state.applications_today, 0);
        assert_eq!(governor.state.consecutive_errors, 0);

        let snapshot = governor.state.clone();
        governor.can_apply();
        assert_eq!(governor.state, snapshot);
    }

    #[test]
    fn success_resets_errors_and_counts() {
        let mut governor = governor_with(config(), |s| {
            s.applications_today = 4;
            s.consecutive_errors = 2;
        });
        governor.record_success();
        assert_eq!(governor.state.applications_today, 5);
        assert_eq!(governor.state.consecutive_errors, 0);
        assert!(governor.state.last_activity.is_some());
    }

    #[test]
    fn failure_does_not_consume_daily_budget() {
        let mut governor = governor_with(config(), |s| s.applications_today = 7);
        governor.record_failure();
        assert_eq!(governor.state.applications_today, 7);
        assert_eq!(governor.state.consecutive_errors, 1);
        assert!(governor.state.last_activity.is_some());
    }

    #[test]
    fn skip_clears_error_streak_only() {
        let mut governor = governor_with(config(), |s| {
            s.applications_today = 7;
            s.consecutive_errors = 2;
        });
        governor.record_skip();
        assert_eq!(governor.state.applications_today, 7);
        assert_eq!(governor.state.consecutive_errors, 0);
    }

    #[test]
    fn interval_pause_is_scheduled_within_bounds() {
        let now = Local::now();
        let mut governor = governor_with(config(), |s| s.applications_today = 20);

        let decision = governor.can_apply_at(now);
        let Some(BlockReason::ScheduledPause { minutes, after }) = decision.block_reason() else {
            panic!("期望定时休息，实际: {:?}", decision);
        };
        assert_eq!(after, 20);
        assert!((15..=30).contains(&minutes));
        assert!(decision.block_reason().is_some_and(BlockReason::is_transient));

        let until = governor.state.pause_until.unwrap();
        assert!(until > now);
        assert!(until >= now + ChronoDuration::minutes(15));
        assert!(until <= now + ChronoDuration::minutes(30));
    }

    #[test]
    fn interval_pause_fires_once_per_multiple() {
        let now = Local::now();
        let mut governor = governor_with(config(), |s| s.applications_today = 10);
        assert!(matches!(
            governor.can_apply_at(now).block_reason(),
            Some(BlockReason::ScheduledPause { .. })
        ));

        let after_pause = now + ChronoDuration::minutes(31);
        assert_eq!(governor.can_apply_at(after_pause), ApplyDecision::Allowed);
        assert_eq!(governor.state.pause_until, None);
    }

    #[test]
    fn force_pause_blocks_and_reset_daily_clears() {
        let mut governor = governor_with(config(), |s| {
            s.applications_today = 5;
            s.consecutive_errors = 3;
        });
        governor.force_pause(10);
        assert!(matches!(
            governor.can_apply().block_reason(),
            Some(BlockReason::Paused { .. })
        ));

        governor.reset_daily();
        assert_eq!(governor.state.applications_today, 0);
        assert_eq!(governor.state.consecutive_errors, 0);
        assert!(governor.status().paused);
    }

    #[test]
    fn status_reports_remaining_budget() {
        let mut governor = governor_with(config(), |s| s.applications_today = 8);
        governor.set_account_age(2);
        let status = governor.status();
        assert_eq!(status.daily_limit, 20);
        assert_eq!(status.remaining_today, 12);
        assert!(status.warmup_active);
        assert!(!status.paused);
        assert!(!status.aborted);
    }

    #[test]
    fn pacer_samples_inside_window() {
        let pacer = Pacer::new((0.0, 0.01), (0.0, 0.0));
        let waited = tokio_test::block_on(pacer.wait_before_action());
        assert!((0.0..=0.01).contains(&waited));
        assert_eq!(tokio_test::block_on(pacer.wait_before_application()), 0.0);
    }
}
