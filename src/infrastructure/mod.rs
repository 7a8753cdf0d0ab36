//! 基础设施层
//!
//! 持有稀缺资源（Page），只暴露能力

pub mod cdp_driver;
pub mod driver;
pub mod js_executor;
pub mod selectors;

pub use cdp_driver::CdpDriver;
pub use driver::{AutomationDriver, ElementHandle};
pub use js_executor::JsExecutor;
