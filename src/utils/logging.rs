use anyhow::Result;
/// 日志工具模块
///
/// 提供日志格式化和输出的辅助函数
use std::fs;
use tracing::info;

use crate::orchestrator::RunStats;

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n自动投递日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
///
/// # 参数
/// - `daily_limit`: 当前生效的每日上限
/// - `applied_today`: 今天已成功投递的数量
pub fn log_startup(daily_limit: u32, applied_today: u32) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - Easy Apply 自动投递模式");
    info!("📊 今日上限: {} | 今日已投递: {}", daily_limit, applied_today);
    info!("{}", "=".repeat(60));
}

/// 记录搜索结果页加载信息
pub fn log_jobs_loaded(page: usize, found: usize) {
    info!("\n{}", "─".repeat(60));
    info!("📄 第 {} 页搜索结果: 找到 {} 个职位", page + 1, found);
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `stats`: 本次运行的统计
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(stats: &RunStats, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", stats.success, stats.attempted());
    info!("❌ 失败: {}", stats.failure);
    info!("⏭️ 跳过: {}", stats.skipped);
    info!("🪙 消耗 token: {}", stats.tokens_used);
    if let Some(reason) = &stats.halt_reason {
        info!("⛔ 停止原因: {}", reason);
    }
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
