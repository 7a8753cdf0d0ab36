//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责资源管理和职位调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 管理应用生命周期（初始化、运行、清理）
//! - 持有浏览器、数据库、LLM 客户端
//! - 读取个人资料和搜索条件
//! - 输出全局统计信息
//!
//! ### `runner` - 投递调度器
//! - 逐页读取搜索结果（Vec<url>）
//! - 每个职位前询问频率控制
//! - 为每个职位创建 ApplicationFlow
//! - 保存结果并更新统计
//!
//! ## 层次关系
//!
//! ```text
//! app (资源 + 生命周期)
//!     ↓
//! runner (处理 Vec<职位>)
//!     ↓
//! workflow::ApplicationFlow (处理单个职位)
//!     ↓
//! services (能力层：opsec / extractor / resolver / filler / storage)
//!     ↓
//! infrastructure (基础设施：AutomationDriver)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：app 管资源，runner 管调度
//! 2. **资源隔离**：只有编排层持有 Browser 和数据库连接
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure
//! 4. **无业务逻辑**：只做调度和统计，不做具体业务判断

pub mod app;
pub mod runner;

// 重新导出主要类型
pub use app::App;
pub use runner::{BotRunner, RunStats, RunnerSettings};
