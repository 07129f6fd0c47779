// ==========================================
// 教务排课核心 - 引擎层错误类型
// ==========================================
// 分类: 输入校验 / 记录缺失 / 业务拒绝 / 并发冲突 / 持久化故障
// 红线: 业务拒绝 (Policy) 不重试；只有 Conflict 可重试
// ==========================================

use crate::config::ConfigError;
use crate::domain::{AssignmentStatus, ClassStatus, ExamAction};
use crate::repository::RepositoryError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

// ==========================================
// 不可用原因 (Availability)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Unavailability {
    TeacherInactive,
    /// 时段跨越教师本地的两个日历日
    SpansMultipleDays,
    NotAWorkingDay { day: String },
    OutsideWorkingHours,
    OverlapsBookedClass { class_id: i64 },
    DailyLimitReached { booked: u32, max: u32 },
}

impl fmt::Display for Unavailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unavailability::TeacherInactive => write!(f, "教师已停用"),
            Unavailability::SpansMultipleDays => write!(f, "时段跨越多个自然日"),
            Unavailability::NotAWorkingDay { day } => write!(f, "{} 非工作日", day),
            Unavailability::OutsideWorkingHours => write!(f, "时段超出工作时间"),
            Unavailability::OverlapsBookedClass { class_id } => {
                write!(f, "与已排课次冲突 (class_id={})", class_id)
            }
            Unavailability::DailyLimitReached { booked, max } => {
                write!(f, "当日课次已满 ({}/{})", booked, max)
            }
        }
    }
}

// ==========================================
// 课时包拒绝原因 (Entitlement)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntitlementDenial {
    NoActivePackage,
    PackageExpired,
    NoCreditsRemaining,
}

impl EntitlementDenial {
    pub fn reason_code(&self) -> &'static str {
        match self {
            EntitlementDenial::NoActivePackage => "NO_ACTIVE_PACKAGE",
            EntitlementDenial::PackageExpired => "PACKAGE_EXPIRED",
            EntitlementDenial::NoCreditsRemaining => "NO_CREDITS_REMAINING",
        }
    }
}

impl fmt::Display for EntitlementDenial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntitlementDenial::NoActivePackage => write!(f, "无有效课时包"),
            EntitlementDenial::PackageExpired => write!(f, "课时包不在有效期内"),
            EntitlementDenial::NoCreditsRemaining => write!(f, "课时已用完"),
        }
    }
}

// ==========================================
// 业务规则拒绝 (Policy Violation)
// ==========================================
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyViolation {
    #[error("学生 {student_id} 不允许更换教师")]
    TeacherChangeNotPermitted { student_id: i64 },

    #[error("课时包不可用: {reason}")]
    PackageNotEligible { reason: EntitlementDenial },

    #[error("教师 {teacher_id} 该时段不可用: {reason}")]
    SlotUnavailable {
        teacher_id: i64,
        reason: Unavailability,
    },

    #[error("教师 {teacher_id} 与学生 {student_id} 已绑定")]
    DuplicateBinding { teacher_id: i64, student_id: i64 },

    #[error("教师 {teacher_id} 与学生 {student_id} 的绑定已退役，不可再次绑定")]
    BindingRetired { teacher_id: i64, student_id: i64 },

    #[error("教师 {teacher_id} 已停用")]
    TeacherInactive { teacher_id: i64 },

    #[error("课次 {class_id} 当前状态 {status} 不可调课")]
    ClassNotReschedulable { class_id: i64, status: ClassStatus },

    #[error("试卷 {exam_id} 已委派给教师 {teacher_id}")]
    DuplicateAssignment { exam_id: i64, teacher_id: i64 },

    #[error("委派 {assignment_id} 状态 {from} 不允许执行 {action}")]
    InvalidTransition {
        assignment_id: String,
        from: AssignmentStatus,
        action: ExamAction,
    },
}

impl PolicyViolation {
    pub fn reason_code(&self) -> &'static str {
        match self {
            PolicyViolation::TeacherChangeNotPermitted { .. } => "TEACHER_CHANGE_NOT_PERMITTED",
            PolicyViolation::PackageNotEligible { .. } => "PACKAGE_NOT_ELIGIBLE",
            PolicyViolation::SlotUnavailable { .. } => "SLOT_UNAVAILABLE",
            PolicyViolation::DuplicateBinding { .. } => "DUPLICATE_BINDING",
            PolicyViolation::BindingRetired { .. } => "BINDING_RETIRED",
            PolicyViolation::TeacherInactive { .. } => "TEACHER_INACTIVE",
            PolicyViolation::ClassNotReschedulable { .. } => "CLASS_NOT_RESCHEDULABLE",
            PolicyViolation::DuplicateAssignment { .. } => "DUPLICATE_ASSIGNMENT",
            PolicyViolation::InvalidTransition { .. } => "INVALID_TRANSITION",
        }
    }
}

// ==========================================
// EngineError - 引擎层错误
// ==========================================
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("输入校验失败 (field={field}): {message}")]
    Validation { field: String, message: String },

    #[error("记录未找到: {entity} id={id}")]
    NotFound { entity: String, id: String },

    #[error(transparent)]
    Policy(#[from] PolicyViolation),

    #[error("并发冲突: {entity} id={id}, expected_revision={expected}, actual_revision={actual}")]
    Conflict {
        entity: String,
        id: String,
        expected: i64,
        actual: i64,
    },

    #[error("持久化失败: {0}")]
    Persistence(RepositoryError),

    #[error("配置读取失败: {0}")]
    Configuration(#[from] ConfigError),
}

impl EngineError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        EngineError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        EngineError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// 是否可通过重新读取后重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Conflict { .. })
    }

    pub fn policy(&self) -> Option<&PolicyViolation> {
        match self {
            EngineError::Policy(v) => Some(v),
            _ => None,
        }
    }
}

impl From<RepositoryError> for EngineError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::OptimisticLockFailure {
                entity,
                id,
                expected,
                actual,
            } => EngineError::Conflict {
                entity,
                id,
                expected,
                actual,
            },
            RepositoryError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            other => EngineError::Persistence(other),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
