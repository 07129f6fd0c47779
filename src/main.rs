// ==========================================
// 教务排课核心 - 启动入口
// ==========================================
// 职责: 初始化日志 → 打开并迁移数据库 → 读取生效配置 → 输出摘要
// HTTP 宿主在启动时执行同样的装配
// ==========================================

use academy_scheduler::app::{get_default_db_path, AppState};
use academy_scheduler::config::SchedulingConfigReader;
use academy_scheduler::logging;
use anyhow::{anyhow, Context};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match std::env::var("ACADEMY_SCHED_LOG_FORMAT").as_deref() {
        Ok("json") => logging::init_json(),
        _ => logging::init(),
    }

    tracing::info!("==================================================");
    tracing::info!("{} v{}", academy_scheduler::APP_NAME, academy_scheduler::VERSION);
    tracing::info!("==================================================");

    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path).map_err(|e| anyhow!(e))?;

    let config = &state.config_manager;
    let binding_policy = config
        .get_binding_policy()
        .await
        .context("读取 binding_policy 失败")?;
    let retry_limit = config
        .get_conflict_retry_limit()
        .await
        .context("读取 conflict_retry_limit 失败")?;
    let min_minutes = config.get_min_class_minutes().await?;
    let max_minutes = config.get_max_class_minutes().await?;
    let default_tz = config.get_default_timezone().await?;

    tracing::info!(
        binding_policy = %binding_policy,
        conflict_retry_limit = retry_limit,
        class_minutes = %format!("{}..={}", min_minutes, max_minutes),
        default_timezone = %default_tz.name(),
        "生效配置"
    );

    match config.get_config_snapshot() {
        Ok(snapshot) => tracing::debug!(snapshot = %snapshot, "config_kv 快照"),
        Err(e) => tracing::warn!("读取配置快照失败: {}", e),
    }

    tracing::info!("初始化完成，等待宿主挂载 SchedulingApi");
    Ok(())
}
