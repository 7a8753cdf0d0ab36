//! 业务能力层（Services Layer）
//!
//! 每个服务只提供一种能力，不关心流程顺序：
//!
//! - `opsec`: 投递频率控制与随机延迟
//! - `form_extractor`: 识别表单页上的待填字段
//! - `answer_resolver` / `prompt_builder` / `llm_service`: 决定字段的值
//! - `field_filler`: 把值写进页面
//! - `job_board`: 登录、搜索、打开职位
//! - `storage` / `failure_log`: 记录投递结果

pub mod answer_resolver;
pub mod failure_log;
pub mod field_filler;
pub mod form_extractor;
pub mod job_board;
pub mod llm_service;
pub mod opsec;
pub mod prompt_builder;
pub mod storage;

pub use answer_resolver::{match_option, AnswerResolver, Resolution, ResolvedValue};
pub use failure_log::FailureLog;
pub use field_filler::{DropdownOption, FieldFiller, FillReport};
pub use form_extractor::{ExtractionReport, FormExtractor};
pub use job_board::{Credentials, JobBoard};
pub use llm_service::{AnswerOracle, LlmService, OracleAnswer};
pub use opsec::{
    ApplyDecision, BlockReason, Governor, OpsecConfig, OpsecState, OpsecStatus, Pacer,
};
pub use prompt_builder::{Prompt, PromptBuilder};
pub use storage::{ApplicationStore, DailyStats, SqliteStore};
