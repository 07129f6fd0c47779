// ==========================================
// 教务排课核心 - 内存仓储实现
// ==========================================
// 用途: 引擎单元测试 / 无持久化场景
// 事务: 整体互斥锁 + 工作副本，Ok 时替换、Err 时丢弃
// 约束: 与 SQLite 表的唯一约束保持一致
// ==========================================

use crate::domain::{
    AssignmentState, AssignmentStatus, ClassStatus, Exam, ExamAssignment, ExamStatus, Package,
    RescheduledClass, ScheduledClass, Student, Teacher, TeacherStudentBinding,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::store::{
    BindingLedger, ClassLedger, DirectoryReader, ExamLedger, SchedulingStore, SchedulingTx,
};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    teachers: HashMap<i64, Teacher>,
    students: HashMap<i64, Student>,
    packages: HashMap<i64, Package>,
    exams: HashMap<i64, Exam>,
    classes: BTreeMap<i64, ScheduledClass>,
    reschedules: Vec<RescheduledClass>,
    bindings: Vec<TeacherStudentBinding>,
    assignments: Vec<ExamAssignment>,
}

// ==========================================
// InMemorySchedulingStore
// ==========================================
#[derive(Debug, Default)]
pub struct InMemorySchedulingStore {
    state: Mutex<MemoryState>,
}

impl InMemorySchedulingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> RepositoryResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ===== 目录数据装载 =====

    pub fn upsert_teacher(&self, teacher: Teacher) -> RepositoryResult<()> {
        teacher.validate().map_err(|message| RepositoryError::FieldValueError {
            field: "teacher".to_string(),
            message,
        })?;
        self.lock()?.teachers.insert(teacher.teacher_id, teacher);
        Ok(())
    }

    pub fn upsert_student(&self, student: Student) -> RepositoryResult<()> {
        self.lock()?.students.insert(student.student_id, student);
        Ok(())
    }

    pub fn upsert_package(&self, package: Package) -> RepositoryResult<()> {
        package.validate().map_err(|message| RepositoryError::FieldValueError {
            field: "package".to_string(),
            message,
        })?;
        self.lock()?.packages.insert(package.package_id, package);
        Ok(())
    }

    pub fn insert_class(&self, class: ScheduledClass) -> RepositoryResult<()> {
        if class.duration_minutes <= 0 {
            return Err(RepositoryError::FieldValueError {
                field: "duration_minutes".to_string(),
                message: format!("class_id={} 时长必须为正: {}", class.class_id, class.duration_minutes),
            });
        }
        let mut state = self.lock()?;
        if state.classes.contains_key(&class.class_id) {
            return Err(RepositoryError::UniqueConstraintViolation(format!(
                "scheduled_classes.class_id={}",
                class.class_id
            )));
        }
        state.classes.insert(class.class_id, class);
        Ok(())
    }

    pub fn set_class_status(&self, class_id: i64, status: ClassStatus) -> RepositoryResult<()> {
        let mut state = self.lock()?;
        let class = state
            .classes
            .get_mut(&class_id)
            .ok_or_else(|| RepositoryError::not_found("ScheduledClass", class_id))?;
        class.status = status;
        class.revision += 1;
        Ok(())
    }

    pub fn insert_exam(&self, exam: Exam) -> RepositoryResult<()> {
        let mut state = self.lock()?;
        if state.exams.contains_key(&exam.exam_id) {
            return Err(RepositoryError::UniqueConstraintViolation(format!(
                "exams.exam_id={}",
                exam.exam_id
            )));
        }
        state.exams.insert(exam.exam_id, exam);
        Ok(())
    }
}

impl SchedulingStore for InMemorySchedulingStore {
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn SchedulingTx) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let mut guard = self.lock().map_err(E::from)?;
        let tx = MemoryTx {
            state: RefCell::new(guard.clone()),
        };
        let value = f(&tx)?;
        *guard = tx.state.into_inner();
        Ok(value)
    }
}

// ==========================================
// MemoryTx - 事务工作副本
// ==========================================
struct MemoryTx {
    state: RefCell<MemoryState>,
}

impl DirectoryReader for MemoryTx {
    fn find_teacher(&self, teacher_id: i64) -> RepositoryResult<Option<Teacher>> {
        Ok(self.state.borrow().teachers.get(&teacher_id).cloned())
    }

    fn find_student(&self, student_id: i64) -> RepositoryResult<Option<Student>> {
        Ok(self.state.borrow().students.get(&student_id).cloned())
    }

    fn find_package(&self, package_id: i64) -> RepositoryResult<Option<Package>> {
        Ok(self.state.borrow().packages.get(&package_id).cloned())
    }

    fn find_exam(&self, exam_id: i64) -> RepositoryResult<Option<Exam>> {
        Ok(self.state.borrow().exams.get(&exam_id).cloned())
    }
}

impl ClassLedger for MemoryTx {
    fn find_class(&self, class_id: i64) -> RepositoryResult<Option<ScheduledClass>> {
        Ok(self.state.borrow().classes.get(&class_id).cloned())
    }

    fn list_teacher_classes_between(
        &self,
        teacher_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepositoryResult<Vec<ScheduledClass>> {
        let mut classes: Vec<ScheduledClass> = self
            .state
            .borrow()
            .classes
            .values()
            .filter(|c| c.teacher_id == teacher_id && c.status != ClassStatus::Cancelled)
            .filter(|c| c.start_time < to && c.end_time() > from)
            .cloned()
            .collect();
        classes.sort_by_key(|c| c.start_time);
        Ok(classes)
    }

    fn count_student_classes_between(
        &self,
        student_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepositoryResult<u32> {
        let count = self
            .state
            .borrow()
            .classes
            .values()
            .filter(|c| c.student_id == student_id && c.status != ClassStatus::Cancelled)
            .filter(|c| c.start_time >= from && c.start_time < to)
            .count();
        Ok(count as u32)
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
        let mut state = self.state.borrow_mut();
        let class = state
            .classes
            .get_mut(&class_id)
            .ok_or_else(|| RepositoryError::not_found("ScheduledClass", class_id))?;
        if class.revision != expected_revision {
            return Err(RepositoryError::OptimisticLockFailure {
                entity: "ScheduledClass".to_string(),
                id: class_id.to_string(),
                expected: expected_revision,
                actual: class.revision,
            });
        }
        class.teacher_id = teacher_id;
        class.start_time = start_time;
        class.duration_minutes = duration_minutes;
        class.timezone = timezone;
        class.revision += 1;
        Ok(())
    }

    fn insert_reschedule(&self, record: &RescheduledClass) -> RepositoryResult<()> {
        if record.different_teacher() != (record.old_teacher_id != record.new_teacher_id) {
            return Err(RepositoryError::DatabaseQueryError(
                "CHECK constraint failed: different_teacher".to_string(),
            ));
        }
        let mut state = self.state.borrow_mut();
        if !state.classes.contains_key(&record.class_id) {
            return Err(RepositoryError::ForeignKeyViolation(format!(
                "rescheduled_classes.class_id={}",
                record.class_id
            )));
        }
        state.reschedules.push(record.clone());
        Ok(())
    }

    fn list_reschedules(&self, class_id: i64) -> RepositoryResult<Vec<RescheduledClass>> {
        let mut records: Vec<RescheduledClass> = self
            .state
            .borrow()
            .reschedules
            .iter()
            .filter(|r| r.class_id == class_id)
            .cloned()
            .collect();
        // 稳定排序，同一时刻按插入顺序
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }
}

impl BindingLedger for MemoryTx {
    fn find_binding(
        &self,
        teacher_id: i64,
        student_id: i64,
    ) -> RepositoryResult<Option<TeacherStudentBinding>> {
        Ok(self
            .state
            .borrow()
            .bindings
            .iter()
            .find(|b| b.teacher_id == teacher_id && b.student_id == student_id)
            .cloned())
    }

    fn find_live_binding_for_student(
        &self,
        student_id: i64,
    ) -> RepositoryResult<Option<TeacherStudentBinding>> {
        Ok(self
            .state
            .borrow()
            .bindings
            .iter()
            .find(|b| b.student_id == student_id && b.active)
            .cloned())
    }

    fn insert_binding(&self, binding: &TeacherStudentBinding) -> RepositoryResult<()> {
        let mut state = self.state.borrow_mut();
        if state
            .bindings
            .iter()
            .any(|b| b.teacher_id == binding.teacher_id && b.student_id == binding.student_id)
        {
            return Err(RepositoryError::UniqueConstraintViolation(format!(
                "teacher_students(teacher_id={}, student_id={})",
                binding.teacher_id, binding.student_id
            )));
        }
        if binding.active
            && state
                .bindings
                .iter()
                .any(|b| b.student_id == binding.student_id && b.active)
        {
            return Err(RepositoryError::UniqueConstraintViolation(format!(
                "teacher_students.student_id={} (active)",
                binding.student_id
            )));
        }
        state.bindings.push(binding.clone());
        Ok(())
    }

    fn set_binding_active(
        &self,
        binding_id: &str,
        active: bool,
        at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let mut state = self.state.borrow_mut();
        let index = state
            .bindings
            .iter()
            .position(|b| b.binding_id == binding_id)
            .ok_or_else(|| RepositoryError::not_found("TeacherStudentBinding", binding_id))?;

        if active {
            let student_id = state.bindings[index].student_id;
            let other_live = state
                .bindings
                .iter()
                .enumerate()
                .any(|(i, b)| i != index && b.student_id == student_id && b.active);
            if other_live {
                return Err(RepositoryError::UniqueConstraintViolation(format!(
                    "teacher_students.student_id={} (active)",
                    student_id
                )));
            }
        }

        let binding = &mut state.bindings[index];
        binding.active = active;
        if active {
            binding.bound_at = at;
            binding.unbound_at = None;
        } else {
            binding.unbound_at = Some(at);
        }
        Ok(())
    }
}

impl ExamLedger for MemoryTx {
    fn find_assignment(&self, assignment_id: &str) -> RepositoryResult<Option<ExamAssignment>> {
        Ok(self
            .state
            .borrow()
            .assignments
            .iter()
            .find(|a| a.assignment_id == assignment_id)
            .cloned())
    }

    fn insert_assignment(&self, assignment: &ExamAssignment) -> RepositoryResult<()> {
        let mut state = self.state.borrow_mut();
        if state
            .assignments
            .iter()
            .any(|a| a.exam_id == assignment.exam_id && a.teacher_id == assignment.teacher_id)
        {
            return Err(RepositoryError::UniqueConstraintViolation(format!(
                "exam_assignments(exam_id={}, teacher_id={})",
                assignment.exam_id, assignment.teacher_id
            )));
        }
        state.assignments.push(assignment.clone());
        Ok(())
    }

    fn transition_assignment(
        &self,
        assignment_id: &str,
        expected: AssignmentStatus,
        next: &AssignmentState,
    ) -> RepositoryResult<usize> {
        let mut state = self.state.borrow_mut();
        match state
            .assignments
            .iter_mut()
            .find(|a| a.assignment_id == assignment_id && a.status() == expected)
        {
            Some(assignment) => {
                assignment.state = next.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn mirror_exam_state(
        &self,
        exam_id: i64,
        teacher_id: i64,
        assignment_state: &AssignmentState,
    ) -> RepositoryResult<()> {
        let mut state = self.state.borrow_mut();
        let exam = state
            .exams
            .get_mut(&exam_id)
            .ok_or_else(|| RepositoryError::not_found("Exam", exam_id))?;
        exam.status = ExamStatus::from(assignment_state.status());
        exam.assigned_to = Some(teacher_id);
        exam.completed_at = assignment_state.completed_at();
        exam.reviewed_at = assignment_state.reviewed_at();
        exam.review_notes = assignment_state.review_notes().map(str::to_string);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn class(id: i64, teacher_id: i64, h: u32) -> ScheduledClass {
        ScheduledClass {
            class_id: id,
            student_id: 9,
            teacher_id,
            start_time: Utc.with_ymd_and_hms(2024, 3, 4, h, 0, 0).unwrap(),
            duration_minutes: 60,
            timezone: chrono_tz::UTC,
            status: ClassStatus::Scheduled,
            revision: 0,
        }
    }

    #[test]
    fn test_failed_transaction_discards_writes() {
        let store = InMemorySchedulingStore::new();
        store.insert_class(class(1, 5, 9)).unwrap();

        let result: Result<(), RepositoryError> = store.transaction(|tx| {
            let start = Utc.with_ymd_and_hms(2024, 3, 4, 11, 0, 0).unwrap();
            tx.update_class_slot(1, 0, 6, start, 60, chrono_tz::UTC)?;
            Err(RepositoryError::InternalError("abort".to_string()))
        });
        assert!(result.is_err());

        let loaded = store.transaction(|tx| tx.find_class(1)).unwrap().unwrap();
        assert_eq!(loaded.teacher_id, 5);
        assert_eq!(loaded.revision, 0);
    }

    #[test]
    fn test_stale_revision_reports_actual() {
        let store = InMemorySchedulingStore::new();
        store.insert_class(class(1, 5, 9)).unwrap();
        store.set_class_status(1, ClassStatus::Scheduled).unwrap();

        let err = store
            .transaction(|tx| {
                let start = Utc.with_ymd_and_hms(2024, 3, 4, 11, 0, 0).unwrap();
                tx.update_class_slot(1, 0, 5, start, 60, chrono_tz::UTC)
            })
            .unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::OptimisticLockFailure { expected: 0, actual: 1, .. }
        ));
    }

    #[test]
    fn test_cancelled_classes_not_listed() {
        let store = InMemorySchedulingStore::new();
        store.insert_class(class(1, 5, 9)).unwrap();
        store.insert_class(class(2, 5, 10)).unwrap();
        store.set_class_status(2, ClassStatus::Cancelled).unwrap();

        let from = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();
        let to = from + Duration::days(1);
        let listed = store
            .transaction(|tx| tx.list_teacher_classes_between(5, from, to))
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].class_id, 1);
    }
}
