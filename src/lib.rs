//! # Easy Apply Submit
//!
//! 自动完成职位站点 Easy Apply 表单投递的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `AutomationDriver` - 浏览器自动化能力的抽象
//! - `CdpDriver` - 基于 `JsExecutor` 的实现
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个字段或单个职位
//! - `Governor` - 投递频率控制
//! - `FormExtractor` / `FieldFiller` - 表单识别和填写
//! - `AnswerResolver` - 个人资料 + LLM 决定答案
//! - `SqliteStore` - 投递记录
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个职位"的完整投递流程
//! - `ApplyCtx` - 上下文封装（序号 + job_id）
//! - `ApplicationFlow` - 状态机（Easy Apply → 表单页 → 审核 → 提交）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/app` - 应用入口，管理资源
//! - `orchestrator/runner` - 翻页、频率控制、保存结果
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::{connect_to_browser_and_page, launch_browser};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{AutomationDriver, CdpDriver, JsExecutor};
pub use models::{ApplicationOutcome, ApplicationStatus, Candidate, JobFilter, JobListing};
pub use orchestrator::{App, BotRunner, RunStats};
pub use services::{AnswerResolver, ApplicationStore, Governor, SqliteStore};
pub use workflow::{ApplicationFlow, ApplyCtx, ApplyResult, StopSignal};
