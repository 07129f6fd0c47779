// ==========================================
// 教务排课核心 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::scheduling_config_trait::{ConfigError, ConfigResult, SchedulingConfigReader};
use crate::db::open_sqlite_connection;
use crate::domain::BindingPolicy;
use async_trait::async_trait;
use chrono_tz::Tz;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// 重试次数上限（防止配置错误导致无限重试）
pub const MAX_CONFLICT_RETRY_LIMIT: u32 = 3;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        crate::db::ensure_schema(&conn).map_err(|e| ConfigError::Schema(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn
                .lock()
                .map_err(|e| ConfigError::Lock(e.to_string()))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    fn get_conn(&self) -> ConfigResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ConfigError::Lock(e.to_string()))
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
            ON CONFLICT(scope_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
            "#,
            params![key, value],
        )?;
        tracing::info!(key = key, value = value, "配置已更新");
        Ok(())
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self
            .get_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 获取所有 global 配置的快照（JSON格式，按键排序）
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    fn get_parsed_or_default<T: std::str::FromStr + Copy + std::fmt::Display>(
        &self,
        key: &str,
        default: T,
    ) -> ConfigResult<T> {
        let raw = self.get_config_or_default(key, &default.to_string())?;
        match raw.trim().parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => {
                tracing::warn!(key = key, value = %raw, default = %default, "配置值无效，使用默认值");
                Ok(default)
            }
        }
    }
}

// ==========================================
// SchedulingConfigReader 实现
// ==========================================
#[async_trait]
impl SchedulingConfigReader for ConfigManager {
    async fn get_binding_policy(&self) -> ConfigResult<BindingPolicy> {
        let default = BindingPolicy::default();
        let value = self.get_config_or_default(config_keys::BINDING_POLICY, default.to_db_str())?;
        match BindingPolicy::parse(&value) {
            Some(policy) => Ok(policy),
            None => {
                tracing::warn!(value = %value, "binding_policy 无效，使用 {}", default);
                Ok(default)
            }
        }
    }

    async fn get_conflict_retry_limit(&self) -> ConfigResult<u32> {
        let limit = self.get_parsed_or_default(config_keys::CONFLICT_RETRY_LIMIT, 1u32)?;
        Ok(limit.min(MAX_CONFLICT_RETRY_LIMIT))
    }

    async fn get_min_class_minutes(&self) -> ConfigResult<i64> {
        let value = self.get_parsed_or_default(config_keys::MIN_CLASS_MINUTES, 15i64)?;
        Ok(value.max(1))
    }

    async fn get_max_class_minutes(&self) -> ConfigResult<i64> {
        self.get_parsed_or_default(config_keys::MAX_CLASS_MINUTES, 240i64)
    }

    async fn get_default_timezone(&self) -> ConfigResult<Tz> {
        let value = self.get_config_or_default(config_keys::DEFAULT_TIMEZONE, "UTC")?;
        match value.trim().parse::<Tz>() {
            Ok(tz) => Ok(tz),
            Err(_) => {
                tracing::warn!(value = %value, "default_timezone 无法识别，使用 UTC");
                Ok(chrono_tz::UTC)
            }
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 师生绑定
    pub const BINDING_POLICY: &str = "binding_policy";

    // 调课并发
    pub const CONFLICT_RETRY_LIMIT: &str = "conflict_retry_limit";

    // 课次时长
    pub const MIN_CLASS_MINUTES: &str = "min_class_minutes";
    pub const MAX_CLASS_MINUTES: &str = "max_class_minutes";

    // 时区
    pub const DEFAULT_TIMEZONE: &str = "default_timezone";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[tokio::test]
    async fn test_defaults_when_table_empty() {
        let config = manager();
        assert_eq!(
            config.get_binding_policy().await.unwrap(),
            BindingPolicy::ReviveOnRebind
        );
        assert_eq!(config.get_conflict_retry_limit().await.unwrap(), 1);
        assert_eq!(config.get_min_class_minutes().await.unwrap(), 15);
        assert_eq!(config.get_max_class_minutes().await.unwrap(), 240);
        assert_eq!(config.get_default_timezone().await.unwrap(), chrono_tz::UTC);
    }

    #[tokio::test]
    async fn test_invalid_values_fall_back() {
        let config = manager();
        config
            .set_global_value(config_keys::CONFLICT_RETRY_LIMIT, "many")
            .unwrap();
        config
            .set_global_value(config_keys::DEFAULT_TIMEZONE, "Nowhere/City")
            .unwrap();
        config
            .set_global_value(config_keys::BINDING_POLICY, "sometimes")
            .unwrap();

        assert_eq!(config.get_conflict_retry_limit().await.unwrap(), 1);
        assert_eq!(config.get_default_timezone().await.unwrap(), chrono_tz::UTC);
        assert_eq!(
            config.get_binding_policy().await.unwrap(),
            BindingPolicy::ReviveOnRebind
        );
    }

    #[tokio::test]
    async fn test_retry_limit_is_clamped() {
        let config = manager();
        config
            .set_global_value(config_keys::CONFLICT_RETRY_LIMIT, "50")
            .unwrap();
        assert_eq!(
            config.get_conflict_retry_limit().await.unwrap(),
            MAX_CONFLICT_RETRY_LIMIT
        );
    }

    #[test]
    fn test_snapshot_is_sorted_json() {
        let config = manager();
        config.set_global_value("b_key", "2").unwrap();
        config.set_global_value("a_key", "1").unwrap();
        config.set_global_value("a_key", "3").unwrap();
        assert_eq!(
            config.get_config_snapshot().unwrap(),
            r#"{"a_key":"3","b_key":"2"}"#
        );
    }
}
