use tracing_subscriber::{fmt, EnvFilter};

/// 初始化日志系统
///
/// 优先使用 `RUST_LOG`，未设置时根据 `verbose` 使用 info / debug 级别。
pub fn init(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    // 重复初始化（例如测试中）时忽略错误
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
