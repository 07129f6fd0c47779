// ==========================================
// 教务排课核心 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为 (外键 + busy_timeout)
// - 提供幂等的 ensure_schema，库文件缺表时自动建表
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL DEFAULT 'global',
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS teachers (
    teacher_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    working_days TEXT NOT NULL DEFAULT '',
    work_hours_json TEXT NOT NULL,
    max_students_per_day INTEGER NOT NULL CHECK (max_students_per_day >= 0),
    active INTEGER NOT NULL DEFAULT 1,
    is_coordinator INTEGER NOT NULL DEFAULT 0,
    timezone TEXT NOT NULL DEFAULT 'UTC'
);

CREATE TABLE IF NOT EXISTS students (
    student_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    package_id INTEGER,
    allow_different_teacher INTEGER NOT NULL DEFAULT 0,
    timezone TEXT NOT NULL DEFAULT 'UTC'
);

CREATE TABLE IF NOT EXISTS packages (
    package_id INTEGER PRIMARY KEY,
    student_id INTEGER NOT NULL REFERENCES students(student_id),
    name TEXT NOT NULL,
    total_classes INTEGER NOT NULL CHECK (total_classes >= 0),
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    CHECK (end_date >= start_date)
);

CREATE TABLE IF NOT EXISTS scheduled_classes (
    class_id INTEGER PRIMARY KEY,
    student_id INTEGER NOT NULL REFERENCES students(student_id),
    teacher_id INTEGER NOT NULL REFERENCES teachers(teacher_id),
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL,
    duration_minutes INTEGER NOT NULL CHECK (duration_minutes > 0),
    timezone TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'scheduled'
        CHECK (status IN ('scheduled', 'completed', 'cancelled')),
    revision INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_classes_teacher_start
    ON scheduled_classes(teacher_id, start_time);
CREATE INDEX IF NOT EXISTS idx_classes_student_start
    ON scheduled_classes(student_id, start_time);

CREATE TABLE IF NOT EXISTS rescheduled_classes (
    reschedule_id TEXT PRIMARY KEY,
    class_id INTEGER NOT NULL REFERENCES scheduled_classes(class_id),
    student_id INTEGER NOT NULL,
    old_teacher_id INTEGER NOT NULL,
    new_teacher_id INTEGER NOT NULL,
    different_teacher INTEGER NOT NULL,
    old_start_time TEXT NOT NULL,
    old_end_time TEXT NOT NULL,
    new_start_time TEXT NOT NULL,
    new_end_time TEXT NOT NULL,
    timezone TEXT NOT NULL,
    requested_by TEXT,
    created_at TEXT NOT NULL,
    CHECK (different_teacher = (old_teacher_id <> new_teacher_id))
);

CREATE INDEX IF NOT EXISTS idx_rescheduled_class
    ON rescheduled_classes(class_id, created_at);

CREATE TRIGGER IF NOT EXISTS trg_rescheduled_no_update
BEFORE UPDATE ON rescheduled_classes
BEGIN
    SELECT RAISE(ABORT, 'rescheduled_classes is append-only');
END;

CREATE TRIGGER IF NOT EXISTS trg_rescheduled_no_delete
BEFORE DELETE ON rescheduled_classes
BEGIN
    SELECT RAISE(ABORT, 'rescheduled_classes is append-only');
END;

CREATE TABLE IF NOT EXISTS teacher_students (
    binding_id TEXT PRIMARY KEY,
    teacher_id INTEGER NOT NULL REFERENCES teachers(teacher_id),
    student_id INTEGER NOT NULL REFERENCES students(student_id),
    active INTEGER NOT NULL DEFAULT 1,
    bound_at TEXT NOT NULL,
    unbound_at TEXT,
    UNIQUE (teacher_id, student_id)
);

CREATE UNIQUE INDEX IF NOT EXISTS uq_teacher_students_live_student
    ON teacher_students(student_id) WHERE active = 1;

CREATE TABLE IF NOT EXISTS exams (
    exam_id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'unassigned'
        CHECK (status IN ('unassigned', 'assigned', 'completed', 'approved', 'rejected')),
    assigned_to INTEGER REFERENCES teachers(teacher_id),
    completed_at TEXT,
    reviewed_at TEXT,
    review_notes TEXT
);

CREATE TABLE IF NOT EXISTS exam_assignments (
    assignment_id TEXT PRIMARY KEY,
    exam_id INTEGER NOT NULL REFERENCES exams(exam_id),
    teacher_id INTEGER NOT NULL REFERENCES teachers(teacher_id),
    status TEXT NOT NULL DEFAULT 'assigned'
        CHECK (status IN ('assigned', 'completed', 'approved', 'rejected')),
    assigned_at TEXT NOT NULL,
    completed_at TEXT,
    reviewed_at TEXT,
    review_notes TEXT,
    UNIQUE (exam_id, teacher_id)
);
"#;

/// 幂等建表（所有语句均为 IF NOT EXISTS）
///
/// 已存在且版本更高的库只告警，不做降级
pub fn ensure_schema(conn: &Connection) -> RepositoryResult<()> {
    conn.execute_batch(SCHEMA_SQL)
        .map_err(|e| RepositoryError::DatabaseQueryError(format!("建表失败: {}", e)))?;

    match read_schema_version(conn)? {
        None => {
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [CURRENT_SCHEMA_VERSION],
            )?;
            tracing::info!(version = CURRENT_SCHEMA_VERSION, "schema 初始化完成");
        }
        Some(v) if v > CURRENT_SCHEMA_VERSION => {
            tracing::warn!(
                db_version = v,
                code_version = CURRENT_SCHEMA_VERSION,
                "数据库 schema 版本高于当前程序"
            );
        }
        Some(_) => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        conn
    }

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let conn = conn();
        ensure_schema(&conn).unwrap();
        ensure_schema(&conn).unwrap();
        assert_eq!(
            read_schema_version(&conn).unwrap(),
            Some(CURRENT_SCHEMA_VERSION)
        );
    }

    #[test]
    fn test_reschedule_log_is_append_only() {
        let conn = conn();
        ensure_schema(&conn).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO teachers (teacher_id, name, work_hours_json, max_students_per_day)
                VALUES (1, 't', '{}', 8);
            INSERT INTO students (student_id, name) VALUES (9, 's');
            INSERT INTO scheduled_classes
                (class_id, student_id, teacher_id, start_time, end_time, duration_minutes, timezone)
                VALUES (100, 9, 1, '2024-03-04T09:00:00.000000Z', '2024-03-04T10:00:00.000000Z', 60, 'UTC');
            INSERT INTO rescheduled_classes
                (reschedule_id, class_id, student_id, old_teacher_id, new_teacher_id,
                 different_teacher, old_start_time, old_end_time, new_start_time, new_end_time,
                 timezone, created_at)
                VALUES ('r1', 100, 9, 1, 1, 0, 'a', 'b', 'c', 'd', 'UTC', 'e');
            "#,
        )
        .unwrap();

        assert!(conn
            .execute("UPDATE rescheduled_classes SET requested_by = 'x'", [])
            .is_err());
        assert!(conn.execute("DELETE FROM rescheduled_classes", []).is_err());
    }

    #[test]
    fn test_different_teacher_flag_must_match_ids() {
        let conn = conn();
        ensure_schema(&conn).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO teachers (teacher_id, name, work_hours_json, max_students_per_day)
                VALUES (1, 't', '{}', 8);
            INSERT INTO students (student_id, name) VALUES (9, 's');
            INSERT INTO scheduled_classes
                (class_id, student_id, teacher_id, start_time, end_time, duration_minutes, timezone)
                VALUES (100, 9, 1, 'a', 'b', 60, 'UTC');
            "#,
        )
        .unwrap();

        let result = conn.execute(
            r#"
            INSERT INTO rescheduled_classes
                (reschedule_id, class_id, student_id, old_teacher_id, new_teacher_id,
                 different_teacher, old_start_time, old_end_time, new_start_time, new_end_time,
                 timezone, created_at)
                VALUES ('r1', 100, 9, 1, 2, 0, 'a', 'b', 'c', 'd', 'UTC', 'e')
            "#,
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_one_live_binding_per_student() {
        let conn = conn();
        ensure_schema(&conn).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO teachers (teacher_id, name, work_hours_json, max_students_per_day)
                VALUES (1, 'a', '{}', 8), (2, 'b', '{}', 8);
            INSERT INTO students (student_id, name) VALUES (9, 's');
            INSERT INTO teacher_students (binding_id, teacher_id, student_id, active, bound_at)
                VALUES ('b1', 1, 9, 1, 'x');
            "#,
        )
        .unwrap();

        let second_live = conn.execute(
            "INSERT INTO teacher_students (binding_id, teacher_id, student_id, active, bound_at) VALUES ('b2', 2, 9, 1, 'x')",
            [],
        );
        assert!(second_live.is_err());

        let second_inactive = conn.execute(
            "INSERT INTO teacher_students (binding_id, teacher_id, student_id, active, bound_at) VALUES ('b3', 2, 9, 0, 'x')",
            [],
        );
        assert!(second_inactive.is_ok());
    }
}
