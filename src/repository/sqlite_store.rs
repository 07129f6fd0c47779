// ==========================================
// 教务排课核心 - SQLite 仓储实现
// ==========================================
// 职责: 基于 rusqlite 实现 SchedulingStore
// 并发: 每个事务以 BEGIN IMMEDIATE 开启，写锁在检查前获取，
//       同库多连接的并发写入由 SQLite 串行化 (busy_timeout 等待)
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

mod bindings;
mod classes;
mod directory;
mod exams;

use crate::db::{ensure_schema, open_sqlite_connection};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::store::{SchedulingStore, SchedulingTx};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use chrono_tz::Tz;
use rusqlite::{Connection, TransactionBehavior};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// SqliteSchedulingStore - 事务入口
// ==========================================
pub struct SqliteSchedulingStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSchedulingStore {
    /// 从共享连接创建（调用方负责 schema 初始化）
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 打开数据库文件并确保 schema 存在
    pub fn open(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        ensure_schema(&conn)?;
        Ok(Self::new(Arc::new(Mutex::new(conn))))
    }

    /// 共享连接（供 ConfigManager 等复用）
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

impl SchedulingStore for SqliteSchedulingStore {
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn SchedulingTx) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let mut conn = self.get_conn().map_err(E::from)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| E::from(RepositoryError::from(e)))?;

        let value = f(&SqliteTx { conn: &tx })?;

        tx.commit()
            .map_err(|e| E::from(RepositoryError::DatabaseTransactionError(e.to_string())))?;
        Ok(value)
    }
}

// ==========================================
// SqliteTx - 事务内视图
// ==========================================
// 各仓储接口的实现分布在 classes / bindings / exams / directory 子模块
pub(crate) struct SqliteTx<'c> {
    conn: &'c Connection,
}

// ==========================================
// 列格式转换
// ==========================================
// 时间统一存为定宽 RFC3339 (微秒, Z 结尾)，保证字符串比较与时间顺序一致

pub(crate) fn fmt_instant(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn fmt_date(d: &NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        Box::<dyn std::error::Error + Send + Sync>::from(message),
    )
}

pub(crate) fn parse_instant(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, format!("时间格式错误 '{}': {}", raw, e)))
}

pub(crate) fn parse_opt_instant(
    idx: usize,
    raw: Option<String>,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|s| parse_instant(idx, &s)).transpose()
}

pub(crate) fn parse_date(idx: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| conversion_error(idx, format!("日期格式错误 '{}': {}", raw, e)))
}

pub(crate) fn parse_tz(idx: usize, raw: &str) -> rusqlite::Result<Tz> {
    raw.trim()
        .parse::<Tz>()
        .map_err(|e| conversion_error(idx, format!("时区无法识别 '{}': {}", raw, e)))
}

pub(crate) fn parse_enum<T>(
    idx: usize,
    raw: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    parse(raw).ok_or_else(|| conversion_error(idx, format!("未知的枚举取值 '{}'", raw)))
}

pub(crate) fn invalid_row(idx: usize, message: String) -> rusqlite::Error {
    conversion_error(idx, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_instant_format_is_fixed_width_and_sortable() {
        let a = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 3, 4, 10, 30, 0).unwrap();
        let sa = fmt_instant(&a);
        let sb = fmt_instant(&b);
        assert_eq!(sa, "2024-03-04T09:00:00.000000Z");
        assert_eq!(sa.len(), sb.len());
        assert!(sa < sb);
        assert_eq!(parse_instant(0, &sa).unwrap(), a);
    }

    #[test]
    fn test_parse_tz_rejects_unknown() {
        assert_eq!(parse_tz(0, "Asia/Shanghai").unwrap(), chrono_tz::Asia::Shanghai);
        assert!(parse_tz(0, "Mars/Olympus").is_err());
    }
}
