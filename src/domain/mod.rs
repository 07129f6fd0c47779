// ==========================================
// 教务排课核心 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、状态迁移规则
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod binding;
pub mod class;
pub mod exam;
pub mod student;
pub mod teacher;
pub mod types;

// 重导出核心类型
pub use binding::TeacherStudentBinding;
pub use class::{NewSlot, RescheduledClass, ScheduledClass, TimeWindow};
pub use exam::{AssignmentState, Exam, ExamAssignment, TransitionRejected};
pub use student::{Package, Student};
pub use teacher::{DayHours, Teacher, WorkHours, WorkInterval};
pub use types::{
    AssignmentStatus, BindingPolicy, ClassStatus, ExamAction, ExamStatus, ReviewDecision,
    TeacherChange,
};
