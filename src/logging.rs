// ==========================================
// 日志系统初始化
// ==========================================
// 使用 tracing 和 tracing-subscriber
// RUST_LOG 控制过滤器，默认 info
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// 初始化日志系统（人类可读格式）
///
/// # 示例
/// ```no_run
/// use academy_scheduler::logging;
/// logging::init();
/// ```
pub fn init() {
    let _ = fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_line_number(true)
        .try_init();
}

/// 初始化 JSON 日志（部署到日志采集环境时使用）
///
/// 例如: RUST_LOG=academy_scheduler=debug,perf=info
pub fn init_json() {
    let _ = fmt()
        .json()
        .with_env_filter(env_filter())
        .with_current_span(true)
        .try_init();
}

/// 初始化测试环境的日志系统
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
