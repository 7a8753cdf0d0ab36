pub mod application_flow;
pub mod apply_ctx;
pub mod stop_signal;

pub use application_flow::{ApplicationFlow, ApplyResult, FlowSettings, FlowState};
pub use apply_ctx::ApplyCtx;
pub use stop_signal::StopSignal;
