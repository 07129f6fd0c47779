// ==========================================
// SQLite 仓储 - 课次与调课记录
// ==========================================
// 对齐: scheduled_classes / rescheduled_classes 表
// 红线: rescheduled_classes 只追加（表级触发器拒绝 UPDATE/DELETE）
// ==========================================

use super::{fmt_instant, parse_enum, parse_instant, parse_tz, SqliteTx};
use crate::domain::{ClassStatus, RescheduledClass, ScheduledClass, TeacherChange};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::store::ClassLedger;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use rusqlite::{params, OptionalExtension, Result as SqliteResult, Row};

const CLASS_COLUMNS: &str = r#"
    class_id, student_id, teacher_id, start_time, duration_minutes, timezone, status, revision
"#;

impl ClassLedger for SqliteTx<'_> {
    fn find_class(&self, class_id: i64) -> RepositoryResult<Option<ScheduledClass>> {
        let sql = format!(
            "SELECT {} FROM scheduled_classes WHERE class_id = ?1",
            CLASS_COLUMNS
        );
        let class = self
            .conn
            .query_row(&sql, params![class_id], map_class_row)
            .optional()?;
        Ok(class)
    }

    fn list_teacher_classes_between(
        &self,
        teacher_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepositoryResult<Vec<ScheduledClass>> {
        let sql = format!(
            r#"
            SELECT {} FROM scheduled_classes
            WHERE teacher_id = ?1
              AND status <> 'cancelled'
              AND start_time < ?3
              AND end_time > ?2
            ORDER BY start_time
            "#,
            CLASS_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let classes = stmt
            .query_map(
                params![teacher_id, fmt_instant(&from), fmt_instant(&to)],
                map_class_row,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(classes)
    }

    fn count_student_classes_between(
        &self,
        student_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepositoryResult<u32> {
        let count: u32 = self.conn.query_row(
            r#"
            SELECT COUNT(*) FROM scheduled_classes
            WHERE student_id = ?1
              AND status <> 'cancelled'
              AND start_time >= ?2
              AND start_time < ?3
            "#,
            params![student_id, fmt_instant(&from), fmt_instant(&to)],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn update_class_slot(
        &self,
        class_id: i64,
        expected_revision: i64,
        teacher_id: i64,
        start_time: DateTime<Utc>,
        duration_minutes: i64,
        timezone: Tz,
    ) -> RepositoryResult<()> {
        let end_time = start_time + Duration::minutes(duration_minutes);
        let rows = self.conn.execute(
            r#"
            UPDATE scheduled_classes
            SET teacher_id = ?1,
                start_time = ?2,
                end_time = ?3,
                duration_minutes = ?4,
                timezone = ?5,
                revision = revision + 1
            WHERE class_id = ?6 AND revision = ?7
            "#,
            params![
                teacher_id,
                fmt_instant(&start_time),
                fmt_instant(&end_time),
                duration_minutes,
                timezone.name(),
                class_id,
                expected_revision,
            ],
        )?;

        if rows == 0 {
            // 区分: 记录不存在 vs revision 已变化
            let actual: Option<i64> = self
                .conn
                .query_row(
                    "SELECT revision FROM scheduled_classes WHERE class_id = ?1",
                    params![class_id],
                    |row| row.get(0),
                )
                .optional()?;
            return Err(match actual {
                Some(actual) => RepositoryError::OptimisticLockFailure {
                    entity: "ScheduledClass".to_string(),
                    id: class_id.to_string(),
                    expected: expected_revision,
                    actual,
                },
                None => RepositoryError::not_found("ScheduledClass", class_id),
            });
        }
        Ok(())
    }

    fn insert_reschedule(&self, record: &RescheduledClass) -> RepositoryResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO rescheduled_classes (
                reschedule_id, class_id, student_id, old_teacher_id, new_teacher_id,
                different_teacher, old_start_time, old_end_time, new_start_time, new_end_time,
                timezone, requested_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                record.reschedule_id,
                record.class_id,
                record.student_id,
                record.old_teacher_id,
                record.new_teacher_id,
                record.different_teacher(),
                fmt_instant(&record.old_start_time),
                fmt_instant(&record.old_end_time),
                fmt_instant(&record.new_start_time),
                fmt_instant(&record.new_end_time),
                record.timezone.name(),
                record.requested_by,
                fmt_instant(&record.created_at),
            ],
        )?;
        Ok(())
    }

    fn list_reschedules(&self, class_id: i64) -> RepositoryResult<Vec<RescheduledClass>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT reschedule_id, class_id, student_id, old_teacher_id, new_teacher_id,
                   different_teacher, old_start_time, old_end_time, new_start_time, new_end_time,
                   timezone, requested_by, created_at
            FROM rescheduled_classes
            WHERE class_id = ?1
            ORDER BY created_at, rowid
            "#,
        )?;
        let records = stmt
            .query_map(params![class_id], map_reschedule_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(records)
    }
}

fn map_class_row(row: &Row) -> rusqlite::Result<ScheduledClass> {
    let start_time: String = row.get(3)?;
    let timezone: String = row.get(5)?;
    let status: String = row.get(6)?;
    Ok(ScheduledClass {
        class_id: row.get(0)?,
        student_id: row.get(1)?,
        teacher_id: row.get(2)?,
        start_time: parse_instant(3, &start_time)?,
        duration_minutes: row.get(4)?,
        timezone: parse_tz(5, &timezone)?,
        status: parse_enum(6, &status, ClassStatus::parse)?,
        revision: row.get(7)?,
    })
}

fn map_reschedule_row(row: &Row) -> rusqlite::Result<RescheduledClass> {
    let old_start: String = row.get(6)?;
    let old_end: String = row.get(7)?;
    let new_start: String = row.get(8)?;
    let new_end: String = row.get(9)?;
    let timezone: String = row.get(10)?;
    let created_at: String = row.get(12)?;
    let different_teacher: bool = row.get(5)?;
    Ok(RescheduledClass {
        reschedule_id: row.get(0)?,
        class_id: row.get(1)?,
        student_id: row.get(2)?,
        old_teacher_id: row.get(3)?,
        new_teacher_id: row.get(4)?,
        teacher_change: TeacherChange::from_flag(different_teacher),
        old_start_time: parse_instant(6, &old_start)?,
        old_end_time: parse_instant(7, &old_end)?,
        new_start_time: parse_instant(8, &new_start)?,
        new_end_time: parse_instant(9, &new_end)?,
        timezone: parse_tz(10, &timezone)?,
        requested_by: row.get(11)?,
        created_at: parse_instant(12, &created_at)?,
    })
}
