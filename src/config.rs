use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    // --- 浏览器配置 ---
    /// 浏览器调试端口（连接已有浏览器时使用）
    pub browser_debug_port: u16,
    /// 是否连接已经打开的浏览器（否则自行启动）
    pub use_existing_browser: bool,
    /// 自行启动时是否使用无头模式
    pub headless: bool,
    /// 自行启动时使用的浏览器路径
    pub chrome_executable: Option<String>,
    /// 站点根地址
    pub target_url: String,

    // --- 文件配置 ---
    /// 运行数据目录（数据库等）
    pub data_dir: String,
    /// 候选人资料 TOML 文件
    pub profile_path: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,

    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,

    // --- 登录凭据 ---
    pub linkedin_username: Option<String>,
    pub linkedin_password: Option<String>,

    // --- 操作安全（频率控制） ---
    /// 每日投递上限
    pub daily_limit: u32,
    /// 是否启用新账号预热
    pub warmup_enabled: bool,
    /// 账号年龄（天）
    pub account_age_days: u32,
    /// 单次操作之间的延迟区间（秒）
    pub min_action_delay: f64,
    pub max_action_delay: f64,
    /// 两次投递之间的延迟区间（秒）
    pub min_application_delay: f64,
    pub max_application_delay: f64,
    /// 每投递多少次强制休息
    pub pause_after_applications: u32,
    /// 强制休息时长区间（分钟）
    pub pause_duration_min: u32,
    pub pause_duration_max: u32,
    /// 连续失败多少次后中止会话
    pub max_consecutive_errors: u32,

    // --- 流程配置 ---
    /// 单个申请最多处理的表单页数
    pub max_form_pages: usize,
    /// 等待 Easy Apply 按钮出现的秒数
    pub apply_button_wait_secs: u64,
    /// 强制休息期间的轮询间隔（秒）
    pub pause_poll_secs: u64,
    /// 最多翻阅的搜索结果页数
    pub max_search_pages: usize,
    /// 职位描述送入 LLM 的最大字符数
    pub description_char_budget: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser_debug_port: 9222,
            use_existing_browser: true,
            headless: false,
            chrome_executable: None,
            target_url: "https://www.linkedin.com".to_string(),
            data_dir: "./data".to_string(),
            profile_path: "profile.toml".to_string(),
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o".to_string(),
            linkedin_username: None,
            linkedin_password: None,
            daily_limit: 50,
            warmup_enabled: true,
            account_age_days: 0,
            min_action_delay: 1.5,
            max_action_delay: 4.0,
            min_application_delay: 120.0,
            max_application_delay: 600.0,
            pause_after_applications: 10,
            pause_duration_min: 15,
            pause_duration_max: 30,
            max_consecutive_errors: 3,
            max_form_pages: 10,
            apply_button_wait_secs: 5,
            pause_poll_secs: 60,
            max_search_pages: 5,
            description_char_budget: 2000,
        }
    }
}

impl Config {
    /// 从环境变量加载配置，未设置的项使用默认值
    ///
    /// 设置了但无法解析的值会直接报错，不会悄悄回退到默认值。
    pub fn from_env() -> Result<Self, ConfigError> {
        let default = Self::default();
        let config = Self {
            browser_debug_port: env_parse("BROWSER_DEBUG_PORT", default.browser_debug_port)?,
            use_existing_browser: env_parse("USE_EXISTING_BROWSER", default.use_existing_browser)?,
            headless: env_parse("HEADLESS", default.headless)?,
            chrome_executable: env_opt("CHROME_EXECUTABLE").or(default.chrome_executable),
            target_url: env_opt("TARGET_URL").unwrap_or(default.target_url),
            data_dir: env_opt("DATA_DIR").unwrap_or(default.data_dir),
            profile_path: env_opt("PROFILE_PATH").unwrap_or(default.profile_path),
            verbose_logging: env_parse("VERBOSE_LOGGING", default.verbose_logging)?,
            output_log_file: env_opt("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            llm_api_key: env_opt("OPENAI_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: env_opt("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: env_opt("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            linkedin_username: env_opt("LINKEDIN_USERNAME"),
            linkedin_password: env_opt("LINKEDIN_PASSWORD"),
            daily_limit: env_parse("DAILY_LIMIT", default.daily_limit)?,
            warmup_enabled: env_parse("WARMUP_ENABLED", default.warmup_enabled)?,
            account_age_days: env_parse("ACCOUNT_AGE_DAYS", default.account_age_days)?,
            min_action_delay: env_parse("MIN_ACTION_DELAY", default.min_action_delay)?,
            max_action_delay: env_parse("MAX_ACTION_DELAY", default.max_action_delay)?,
            min_application_delay: env_parse("MIN_APPLICATION_DELAY", default.min_application_delay)?,
            max_application_delay: env_parse("MAX_APPLICATION_DELAY", default.max_application_delay)?,
            pause_after_applications: env_parse(
                "PAUSE_AFTER_APPLICATIONS",
                default.pause_after_applications,
            )?,
            pause_duration_min: env_parse("PAUSE_DURATION_MIN", default.pause_duration_min)?,
            pause_duration_max: env_parse("PAUSE_DURATION_MAX", default.pause_duration_max)?,
            max_consecutive_errors: env_parse("MAX_CONSECUTIVE_ERRORS", default.max_consecutive_errors)?,
            max_form_pages: env_parse("MAX_FORM_PAGES", default.max_form_pages)?,
            apply_button_wait_secs: env_parse("APPLY_BUTTON_WAIT_SECS", default.apply_button_wait_secs)?,
            pause_poll_secs: env_parse("PAUSE_POLL_SECS", default.pause_poll_secs)?,
            max_search_pages: env_parse("MAX_SEARCH_PAGES", default.max_search_pages)?,
            description_char_budget: env_parse(
                "DESCRIPTION_CHAR_BUDGET",
                default.description_char_budget,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    /// 校验配置取值范围
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.daily_limit) {
            return Err(ConfigError::invalid("DAILY_LIMIT", "必须在 1..=100 之间"));
        }
        check_window("ACTION_DELAY", self.min_action_delay, self.max_action_delay)?;
        check_window(
            "APPLICATION_DELAY",
            self.min_application_delay,
            self.max_application_delay,
        )?;
        if self.pause_duration_min > self.pause_duration_max {
            return Err(ConfigError::invalid(
                "PAUSE_DURATION",
                format!(
                    "最小值 {} 大于最大值 {}",
                    self.pause_duration_min, self.pause_duration_max
                ),
            ));
        }
        if self.pause_after_applications == 0 {
            return Err(ConfigError::invalid("PAUSE_AFTER_APPLICATIONS", "不能为 0"));
        }
        if self.max_consecutive_errors == 0 {
            return Err(ConfigError::invalid("MAX_CONSECUTIVE_ERRORS", "不能为 0"));
        }
        if self.max_form_pages == 0 {
            return Err(ConfigError::invalid("MAX_FORM_PAGES", "不能为 0"));
        }
        Ok(())
    }

    /// SQLite 数据库路径
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("easy_apply.db")
    }
}

fn check_window(field: &str, min: f64, max: f64) -> Result<(), ConfigError> {
    if !min.is_finite() || !max.is_finite() || min < 0.0 {
        return Err(ConfigError::invalid(field, "必须是非负有限数"));
    }
    if min > max {
        return Err(ConfigError::invalid(
            field,
            format!("最小值 {} 大于最大值 {}", min, max),
        ));
    }
    Ok(())
}

fn env_opt(var_name: &str) -> Option<String> {
    std::env::var(var_name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(var_name: &str, default: T) -> Result<T, ConfigError> {
    match env_opt(var_name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value: raw.clone(),
                expected_type: std::any::type_name::<T>().to_string(),
            }),
    }
}
