// ==========================================
// 教务排课核心 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享连接、配置与 API 实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::SchedulingApi;
use crate::config::ConfigManager;
use crate::db::{ensure_schema, open_sqlite_connection, read_schema_version};
use crate::perf::{install_sqlite_tracing, PerfSettings};
use crate::repository::SqliteSchedulingStore;

/// 数据库路径环境变量
pub const ENV_DB_PATH: &str = "ACADEMY_SCHED_DB_PATH";

/// 应用状态
///
/// 同一进程内所有组件共享一个 SQLite 连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 仓储（事务入口）
    pub store: Arc<SqliteSchedulingStore>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 调度 API
    pub scheduling_api: Arc<SchedulingApi<SqliteSchedulingStore, ConfigManager>>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 说明
    /// 1. 打开连接并应用统一 PRAGMA
    /// 2. 安装 SQL 统计（按环境变量）
    /// 3. 初始化 / 校验 schema
    /// 4. 创建仓储、配置与 API
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let mut conn =
            open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        install_sqlite_tracing(&mut conn, PerfSettings::from_env());
        ensure_schema(&conn).map_err(|e| format!("schema 初始化失败: {}", e))?;

        match read_schema_version(&conn) {
            Ok(Some(version)) => tracing::info!(schema_version = version, "数据库 schema 就绪"),
            Ok(None) => tracing::warn!("schema_version 缺失"),
            Err(e) => tracing::warn!("读取 schema_version 失败: {}", e),
        }

        let conn = Arc::new(Mutex::new(conn));
        let store = Arc::new(SqliteSchedulingStore::new(conn.clone()));
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn)
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let scheduling_api = Arc::new(SchedulingApi::new(store.clone(), config_manager.clone()));

        tracing::info!("AppState初始化完成");
        Ok(Self {
            db_path,
            store,
            config_manager,
            scheduling_api,
        })
    }
}

/// 默认数据库路径
///
/// 优先级: ACADEMY_SCHED_DB_PATH > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var(ENV_DB_PATH) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./academy.db");
    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        let dir = if cfg!(debug_assertions) {
            data_dir.join("academy-scheduler-dev")
        } else {
            data_dir.join("academy-scheduler")
        };
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("academy.db");
        }
    }

    path.to_string_lossy().to_string()
}
