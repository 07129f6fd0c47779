// ==========================================
// 教务排课核心 - 应用层
// ==========================================
// 职责: 进程级装配，连接 HTTP 宿主与后端
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState, ENV_DB_PATH};
