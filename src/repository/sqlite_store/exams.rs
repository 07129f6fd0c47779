// ==========================================
// SQLite 仓储 - 试卷委派
// ==========================================
// 对齐: exam_assignments / exams 表
// 并发: 状态迁移为比较并设置 (WHERE status = expected)
// ==========================================

use super::{fmt_instant, invalid_row, parse_enum, parse_instant, parse_opt_instant, SqliteTx};
use crate::domain::{AssignmentState, AssignmentStatus, ExamAssignment, ExamStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::store::ExamLedger;
use rusqlite::{params, OptionalExtension, Row};

impl ExamLedger for SqliteTx<'_> {
    fn find_assignment(&self, assignment_id: &str) -> RepositoryResult<Option<ExamAssignment>> {
        let assignment = self
            .conn
            .query_row(
                r#"
                SELECT assignment_id, exam_id, teacher_id, status,
                       assigned_at, completed_at, reviewed_at, review_notes
                FROM exam_assignments
                WHERE assignment_id = ?1
                "#,
                params![assignment_id],
                map_assignment_row,
            )
            .optional()?;
        Ok(assignment)
    }

    fn insert_assignment(&self, assignment: &ExamAssignment) -> RepositoryResult<()> {
        let state = &assignment.state;
        self.conn.execute(
            r#"
            INSERT INTO exam_assignments (
                assignment_id, exam_id, teacher_id, status,
                assigned_at, completed_at, reviewed_at, review_notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                assignment.assignment_id,
                assignment.exam_id,
                assignment.teacher_id,
                state.status().to_db_str(),
                fmt_instant(&state.assigned_at()),
                state.completed_at().as_ref().map(fmt_instant),
                state.reviewed_at().as_ref().map(fmt_instant),
                state.review_notes(),
            ],
        )?;
        Ok(())
    }

    fn transition_assignment(
        &self,
        assignment_id: &str,
        expected: AssignmentStatus,
        next: &AssignmentState,
    ) -> RepositoryResult<usize> {
        let rows = self.conn.execute(
            r#"
            UPDATE exam_assignments
            SET status = ?1, completed_at = ?2, reviewed_at = ?3, review_notes = ?4
            WHERE assignment_id = ?5 AND status = ?6
            "#,
            params![
                next.status().to_db_str(),
                next.completed_at().as_ref().map(fmt_instant),
                next.reviewed_at().as_ref().map(fmt_instant),
                next.review_notes(),
                assignment_id,
                expected.to_db_str(),
            ],
        )?;
        Ok(rows)
    }

    fn mirror_exam_state(
        &self,
        exam_id: i64,
        teacher_id: i64,
        state: &AssignmentState,
    ) -> RepositoryResult<()> {
        let rows = self.conn.execute(
            r#"
            UPDATE exams
            SET status = ?1, assigned_to = ?2, completed_at = ?3, reviewed_at = ?4, review_notes = ?5
            WHERE exam_id = ?6
            "#,
            params![
                ExamStatus::from(state.status()).to_db_str(),
                teacher_id,
                state.completed_at().as_ref().map(fmt_instant),
                state.reviewed_at().as_ref().map(fmt_instant),
                state.review_notes(),
                exam_id,
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Exam", exam_id));
        }
        Ok(())
    }
}

fn map_assignment_row(row: &Row) -> rusqlite::Result<ExamAssignment> {
    let status: String = row.get(3)?;
    let assigned_at: String = row.get(4)?;
    let status = parse_enum(3, &status, AssignmentStatus::parse)?;
    let state = AssignmentState::from_columns(
        status,
        parse_instant(4, &assigned_at)?,
        parse_opt_instant(5, row.get(5)?)?,
        parse_opt_instant(6, row.get(6)?)?,
        row.get(7)?,
    )
    .ok_or_else(|| invalid_row(3, format!("委派状态与时间戳不一致: status={}", status.to_db_str())))?;

    Ok(ExamAssignment {
        assignment_id: row.get(0)?,
        exam_id: row.get(1)?,
        teacher_id: row.get(2)?,
        state,
    })
}
