use anyhow::Result;
use easy_apply_submit::{logger, App, Config, StopSignal};
use tracing::warn;

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env()?;

    // 初始化日志
    logger::init(config.verbose_logging);

    // Ctrl+C 只请求停止，当前职位处理完再退出
    let stop = StopSignal::new();
    let ctrl_c = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⛔ 收到 Ctrl+C，处理完当前职位后停止");
            ctrl_c.stop();
        }
    });

    // 初始化并运行应用
    let mut app = App::initialize(config, stop).await?;
    let result = app.run().await;
    app.shutdown().await?;
    result?;

    Ok(())
}
