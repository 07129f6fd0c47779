// ==========================================
// SQLite 仓储 - 师生绑定
// ==========================================
// 对齐: teacher_students 表
// 约束: UNIQUE(teacher_id, student_id)；部分唯一索引保证每个学生至多一个生效绑定
// ==========================================

use super::{fmt_instant, parse_instant, parse_opt_instant, SqliteTx};
use crate::domain::TeacherStudentBinding;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::store::BindingLedger;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

const BINDING_COLUMNS: &str =
    "binding_id, teacher_id, student_id, active, bound_at, unbound_at";

impl BindingLedger for SqliteTx<'_> {
    fn find_binding(
        &self,
        teacher_id: i64,
        student_id: i64,
    ) -> RepositoryResult<Option<TeacherStudentBinding>> {
        let sql = format!(
            "SELECT {} FROM teacher_students WHERE teacher_id = ?1 AND student_id = ?2",
            BINDING_COLUMNS
        );
        let binding = self
            .conn
            .query_row(&sql, params![teacher_id, student_id], map_binding_row)
            .optional()?;
        Ok(binding)
    }

    fn find_live_binding_for_student(
        &self,
        student_id: i64,
    ) -> RepositoryResult<Option<TeacherStudentBinding>> {
        let sql = format!(
            "SELECT {} FROM teacher_students WHERE student_id = ?1 AND active = 1",
            BINDING_COLUMNS
        );
        let binding = self
            .conn
            .query_row(&sql, params![student_id], map_binding_row)
            .optional()?;
        Ok(binding)
    }

    fn insert_binding(&self, binding: &TeacherStudentBinding) -> RepositoryResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO teacher_students (
                binding_id, teacher_id, student_id, active, bound_at, unbound_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                binding.binding_id,
                binding.teacher_id,
                binding.student_id,
                binding.active,
                fmt_instant(&binding.bound_at),
                binding.unbound_at.as_ref().map(fmt_instant),
            ],
        )?;
        Ok(())
    }

    fn set_binding_active(
        &self,
        binding_id: &str,
        active: bool,
        at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let rows = if active {
            self.conn.execute(
                r#"
                UPDATE teacher_students
                SET active = 1, bound_at = ?1, unbound_at = NULL
                WHERE binding_id = ?2
                "#,
                params![fmt_instant(&at), binding_id],
            )?
        } else {
            self.conn.execute(
                "UPDATE teacher_students SET active = 0, unbound_at = ?1 WHERE binding_id = ?2",
                params![fmt_instant(&at), binding_id],
            )?
        };

        if rows == 0 {
            return Err(RepositoryError::not_found("TeacherStudentBinding", binding_id));
        }
        Ok(())
    }
}

fn map_binding_row(row: &Row) -> rusqlite::Result<TeacherStudentBinding> {
    let bound_at: String = row.get(4)?;
    Ok(TeacherStudentBinding {
        binding_id: row.get(0)?,
        teacher_id: row.get(1)?,
        student_id: row.get(2)?,
        active: row.get(3)?,
        bound_at: parse_instant(4, &bound_at)?,
        unbound_at: parse_opt_instant(5, row.get(5)?)?,
    })
}
