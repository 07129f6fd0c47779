// ==========================================
// SQLite 仓储 - 目录数据（教师/学生/课时包/试卷）
// ==========================================
// 读: 事务内 DirectoryReader
// 写: 目录同步入口（外部 CRUD 系统导入），不经过引擎
// ==========================================

use super::{
    fmt_date, fmt_instant, invalid_row, parse_date, parse_enum, parse_opt_instant, parse_tz,
    SqliteSchedulingStore, SqliteTx,
};
use crate::domain::teacher::{format_working_days, parse_working_days};
use crate::domain::{
    ClassStatus, Exam, ExamStatus, Package, ScheduledClass, Student, Teacher, WorkHours,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::store::DirectoryReader;
use rusqlite::{params, OptionalExtension, Row};

impl DirectoryReader for SqliteTx<'_> {
    fn find_teacher(&self, teacher_id: i64) -> RepositoryResult<Option<Teacher>> {
        let teacher = self
            .conn
            .query_row(
                r#"
                SELECT teacher_id, name, working_days, work_hours_json,
                       max_students_per_day, active, is_coordinator, timezone
                FROM teachers
                WHERE teacher_id = ?1
                "#,
                params![teacher_id],
                map_teacher_row,
            )
            .optional()?;
        Ok(teacher)
    }

    fn find_student(&self, student_id: i64) -> RepositoryResult<Option<Student>> {
        let student = self
            .conn
            .query_row(
                r#"
                SELECT student_id, name, package_id, allow_different_teacher, timezone
                FROM students
                WHERE student_id = ?1
                "#,
                params![student_id],
                map_student_row,
            )
            .optional()?;
        Ok(student)
    }

    fn find_package(&self, package_id: i64) -> RepositoryResult<Option<Package>> {
        let package = self
            .conn
            .query_row(
                r#"
                SELECT package_id, student_id, name, total_classes, start_date, end_date
                FROM packages
                WHERE package_id = ?1
                "#,
                params![package_id],
                map_package_row,
            )
            .optional()?;
        Ok(package)
    }

    fn find_exam(&self, exam_id: i64) -> RepositoryResult<Option<Exam>> {
        let exam = self
            .conn
            .query_row(
                r#"
                SELECT exam_id, title, status, assigned_to, completed_at, reviewed_at, review_notes
                FROM exams
                WHERE exam_id = ?1
                "#,
                params![exam_id],
                map_exam_row,
            )
            .optional()?;
        Ok(exam)
    }
}

// ==========================================
// 行映射
// ==========================================

fn map_teacher_row(row: &Row) -> rusqlite::Result<Teacher> {
    let working_days: String = row.get(2)?;
    let work_hours_json: String = row.get(3)?;
    let timezone: String = row.get(7)?;

    let working_days = parse_working_days(&working_days).map_err(|e| invalid_row(2, e))?;
    let work_hours: WorkHours = serde_json::from_str(&work_hours_json)
        .map_err(|e| invalid_row(3, format!("work_hours_json 解析失败: {}", e)))?;

    Ok(Teacher {
        teacher_id: row.get(0)?,
        name: row.get(1)?,
        working_days,
        work_hours,
        max_students_per_day: row.get(4)?,
        active: row.get(5)?,
        is_coordinator: row.get(6)?,
        timezone: parse_tz(7, &timezone)?,
    })
}

fn map_student_row(row: &Row) -> rusqlite::Result<Student> {
    let timezone: String = row.get(4)?;
    Ok(Student {
        student_id: row.get(0)?,
        name: row.get(1)?,
        package_id: row.get(2)?,
        allow_different_teacher: row.get(3)?,
        timezone: parse_tz(4, &timezone)?,
    })
}

fn map_package_row(row: &Row) -> rusqlite::Result<Package> {
    let start_date: String = row.get(4)?;
    let end_date: String = row.get(5)?;
    Ok(Package {
        package_id: row.get(0)?,
        student_id: row.get(1)?,
        name: row.get(2)?,
        total_classes: row.get(3)?,
        start_date: parse_date(4, &start_date)?,
        end_date: parse_date(5, &end_date)?,
    })
}

fn map_exam_row(row: &Row) -> rusqlite::Result<Exam> {
    let status: String = row.get(2)?;
    Ok(Exam {
        exam_id: row.get(0)?,
        title: row.get(1)?,
        status: parse_enum(2, &status, ExamStatus::parse)?,
        assigned_to: row.get(3)?,
        completed_at: parse_opt_instant(4, row.get(4)?)?,
        reviewed_at: parse_opt_instant(5, row.get(5)?)?,
        review_notes: row.get(6)?,
    })
}

// ==========================================
// 目录同步入口
// ==========================================
impl SqliteSchedulingStore {
    /// 导入或更新教师
    pub fn upsert_teacher(&self, teacher: &Teacher) -> RepositoryResult<()> {
        teacher.validate().map_err(|message| RepositoryError::FieldValueError {
            field: "teacher".to_string(),
            message,
        })?;
        let work_hours_json = serde_json::to_string(&teacher.work_hours)
            .map_err(|e| RepositoryError::InternalError(e.to_string()))?;

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO teachers (
                teacher_id, name, working_days, work_hours_json,
                max_students_per_day, active, is_coordinator, timezone
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(teacher_id) DO UPDATE SET
                name = excluded.name,
                working_days = excluded.working_days,
                work_hours_json = excluded.work_hours_json,
                max_students_per_day = excluded.max_students_per_day,
                active = excluded.active,
                is_coordinator = excluded.is_coordinator,
                timezone = excluded.timezone
            "#,
            params![
                teacher.teacher_id,
                teacher.name,
                format_working_days(&teacher.working_days),
                work_hours_json,
                teacher.max_students_per_day,
                teacher.active,
                teacher.is_coordinator,
                teacher.timezone.name(),
            ],
        )?;
        Ok(())
    }

    /// 导入或更新学生
    pub fn upsert_student(&self, student: &Student) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO students (student_id, name, package_id, allow_different_teacher, timezone)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(student_id) DO UPDATE SET
                name = excluded.name,
                package_id = excluded.package_id,
                allow_different_teacher = excluded.allow_different_teacher,
                timezone = excluded.timezone
            "#,
            params![
                student.student_id,
                student.name,
                student.package_id,
                student.allow_different_teacher,
                student.timezone.name(),
            ],
        )?;
        Ok(())
    }

    /// 导入或更新课时包
    pub fn upsert_package(&self, package: &Package) -> RepositoryResult<()> {
        package.validate().map_err(|message| RepositoryError::FieldValueError {
            field: "package".to_string(),
            message,
        })?;

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO packages (package_id, student_id, name, total_classes, start_date, end_date)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(package_id) DO UPDATE SET
                student_id = excluded.student_id,
                name = excluded.name,
                total_classes = excluded.total_classes,
                start_date = excluded.start_date,
                end_date = excluded.end_date
            "#,
            params![
                package.package_id,
                package.student_id,
                package.name,
                package.total_classes,
                fmt_date(&package.start_date),
                fmt_date(&package.end_date),
            ],
        )?;
        Ok(())
    }

    /// 导入课次（外部预约系统创建）
    pub fn insert_class(&self, class: &ScheduledClass) -> RepositoryResult<()> {
        if class.duration_minutes <= 0 {
            return Err(RepositoryError::FieldValueError {
                field: "duration_minutes".to_string(),
                message: format!("class_id={} 时长必须为正: {}", class.class_id, class.duration_minutes),
            });
        }

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO scheduled_classes (
                class_id, student_id, teacher_id, start_time, end_time,
                duration_minutes, timezone, status, revision
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                class.class_id,
                class.student_id,
                class.teacher_id,
                fmt_instant(&class.start_time),
                fmt_instant(&class.end_time()),
                class.duration_minutes,
                class.timezone.name(),
                class.status.to_db_str(),
                class.revision,
            ],
        )?;
        Ok(())
    }

    /// 外部系统标记课次完成/取消（revision + 1）
    pub fn set_class_status(&self, class_id: i64, status: ClassStatus) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE scheduled_classes SET status = ?1, revision = revision + 1 WHERE class_id = ?2",
            params![status.to_db_str(), class_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("ScheduledClass", class_id));
        }
        Ok(())
    }

    /// 导入试卷（初始为未委派）
    pub fn insert_exam(&self, exam: &Exam) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO exams (exam_id, title, status, assigned_to, completed_at, reviewed_at, review_notes)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                exam.exam_id,
                exam.title,
                exam.status.to_db_str(),
                exam.assigned_to,
                exam.completed_at.as_ref().map(fmt_instant),
                exam.reviewed_at.as_ref().map(fmt_instant),
                exam.review_notes,
            ],
        )?;
        Ok(())
    }
}
