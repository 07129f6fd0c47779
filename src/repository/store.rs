// ==========================================
// 教务排课核心 - 仓储接口
// ==========================================
// 职责: 定义引擎所需的数据访问接口（不包含实现）
// 约定: 所有读写都发生在 SchedulingStore::transaction 的事务内，
//       检查与写入同处一个事务 (check-then-act)
// 实现者: SqliteSchedulingStore / InMemorySchedulingStore
// ==========================================

use crate::domain::{
    AssignmentState, AssignmentStatus, Exam, ExamAssignment, Package, RescheduledClass,
    ScheduledClass, Student, Teacher, TeacherStudentBinding,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

// ==========================================
// DirectoryReader - 外部目录数据（只读）
// ==========================================
pub trait DirectoryReader {
    fn find_teacher(&self, teacher_id: i64) -> RepositoryResult<Option<Teacher>>;

    fn find_student(&self, student_id: i64) -> RepositoryResult<Option<Student>>;

    fn find_package(&self, package_id: i64) -> RepositoryResult<Option<Package>>;

    fn find_exam(&self, exam_id: i64) -> RepositoryResult<Option<Exam>>;
}

// ==========================================
// ClassLedger - 课次与调课记录
// ==========================================
pub trait ClassLedger {
    fn find_class(&self, class_id: i64) -> RepositoryResult<Option<ScheduledClass>>;

    /// 教师在 [from, to) 内有交集的未取消课次
    fn list_teacher_classes_between(
        &self,
        teacher_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepositoryResult<Vec<ScheduledClass>>;

    /// 学生开始时间落在 [from, to) 内的未取消课次数量
    fn count_student_classes_between(
        &self,
        student_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepositoryResult<u32>;

    /// 更新课次的教师与时段（带 revision 检查，成功后 revision + 1）
    ///
    /// # 错误
    /// - `RepositoryError::OptimisticLockFailure`: revision 不匹配
    /// - `RepositoryError::NotFound`: class_id 不存在
    fn update_class_slot(
        &self,
        class_id: i64,
        expected_revision: i64,
        teacher_id: i64,
        start_time: DateTime<Utc>,
        duration_minutes: i64,
        timezone: Tz,
    ) -> RepositoryResult<()>;

    /// 追加调课审计记录
    fn insert_reschedule(&self, record: &RescheduledClass) -> RepositoryResult<()>;

    /// 按时间顺序列出课次的调课记录
    fn list_reschedules(&self, class_id: i64) -> RepositoryResult<Vec<RescheduledClass>>;
}

// ==========================================
// BindingLedger - 师生绑定
// ==========================================
pub trait BindingLedger {
    /// 查询师生对的绑定记录（含已解绑）
    fn find_binding(
        &self,
        teacher_id: i64,
        student_id: i64,
    ) -> RepositoryResult<Option<TeacherStudentBinding>>;

    /// 学生当前生效的绑定
    fn find_live_binding_for_student(
        &self,
        student_id: i64,
    ) -> RepositoryResult<Option<TeacherStudentBinding>>;

    /// 新增绑定；师生对已存在时返回 UniqueConstraintViolation
    fn insert_binding(&self, binding: &TeacherStudentBinding) -> RepositoryResult<()>;

    /// 激活/解绑；解绑时记录 unbound_at，激活时清空 unbound_at 并刷新 bound_at
    fn set_binding_active(
        &self,
        binding_id: &str,
        active: bool,
        at: DateTime<Utc>,
    ) -> RepositoryResult<()>;
}

// ==========================================
// ExamLedger - 试卷委派
// ==========================================
pub trait ExamLedger {
    fn find_assignment(&self, assignment_id: &str) -> RepositoryResult<Option<ExamAssignment>>;

    /// 新增委派；(exam_id, teacher_id) 已存在时返回 UniqueConstraintViolation
    fn insert_assignment(&self, assignment: &ExamAssignment) -> RepositoryResult<()>;

    /// 比较并设置: 仅当当前状态为 expected 时写入 next，返回受影响行数
    fn transition_assignment(
        &self,
        assignment_id: &str,
        expected: AssignmentStatus,
        next: &AssignmentState,
    ) -> RepositoryResult<usize>;

    /// 将委派状态镜像到 exams 表
    fn mirror_exam_state(
        &self,
        exam_id: i64,
        teacher_id: i64,
        state: &AssignmentState,
    ) -> RepositoryResult<()>;
}

/// 事务内可用的全部仓储能力
pub trait SchedulingTx: DirectoryReader + ClassLedger + BindingLedger + ExamLedger {}

impl<T> SchedulingTx for T where T: DirectoryReader + ClassLedger + BindingLedger + ExamLedger {}

// ==========================================
// SchedulingStore - 事务边界
// ==========================================
// f 返回 Ok 时提交，返回 Err 时整体回滚（不会观察到部分状态）
pub trait SchedulingStore: Send + Sync {
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn SchedulingTx) -> Result<T, E>,
        E: From<RepositoryError>;
}
