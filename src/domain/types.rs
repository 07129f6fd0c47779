// ==========================================
// 教务排课核心 - 领域类型定义
// ==========================================
// 依据: 排课/调课引擎 3. 数据模型
// 约定: 状态一律使用显式枚举，不使用裸布尔标记
// 序列化格式: 小写 (与业务库字段取值一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 课次状态 (Class Status)
// ==========================================
// 取消是状态，不是删除
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassStatus {
    Scheduled, // 已排课
    Completed, // 已上课
    Cancelled, // 已取消
}

impl ClassStatus {
    /// 从数据库字符串解析（未知取值返回 None）
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "scheduled" => Some(ClassStatus::Scheduled),
            "completed" => Some(ClassStatus::Completed),
            "cancelled" | "canceled" => Some(ClassStatus::Cancelled),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ClassStatus::Scheduled => "scheduled",
            ClassStatus::Completed => "completed",
            ClassStatus::Cancelled => "cancelled",
        }
    }

    /// 是否占用课时额度
    pub fn consumes_credit(&self) -> bool {
        !matches!(self, ClassStatus::Cancelled)
    }
}

impl fmt::Display for ClassStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 换教师标记 (Teacher Change)
// ==========================================
// 对应 rescheduled_classes.different_teacher 列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TeacherChange {
    SameTeacher,      // 原教师调课
    DifferentTeacher, // 换教师调课
}

impl TeacherChange {
    /// 根据新旧教师ID推导
    pub fn between(old_teacher_id: i64, new_teacher_id: i64) -> Self {
        if old_teacher_id == new_teacher_id {
            TeacherChange::SameTeacher
        } else {
            TeacherChange::DifferentTeacher
        }
    }

    pub fn is_different(&self) -> bool {
        matches!(self, TeacherChange::DifferentTeacher)
    }

    /// 从 different_teacher 列还原
    pub fn from_flag(different_teacher: bool) -> Self {
        if different_teacher {
            TeacherChange::DifferentTeacher
        } else {
            TeacherChange::SameTeacher
        }
    }
}

impl fmt::Display for TeacherChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeacherChange::SameTeacher => write!(f, "SAME_TEACHER"),
            TeacherChange::DifferentTeacher => write!(f, "DIFFERENT_TEACHER"),
        }
    }
}

// ==========================================
// 师生绑定唯一性策略 (Binding Policy)
// ==========================================
// teacher_students 的唯一约束在 (teacher_id, student_id) 上，不含 active 条件。
// 解绑后再绑定同一对师生，必须显式选择一种行为。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BindingPolicy {
    /// 解绑为软删除，再次绑定复用并激活原记录
    #[default]
    ReviveOnRebind,
    /// 解绑为软删除，该师生对永久退役，再次绑定被拒绝
    PermanentPair,
}

impl BindingPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "REVIVE_ON_REBIND" | "REVIVE" => Some(BindingPolicy::ReviveOnRebind),
            "PERMANENT_PAIR" | "PERMANENT" => Some(BindingPolicy::PermanentPair),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            BindingPolicy::ReviveOnRebind => "REVIVE_ON_REBIND",
            BindingPolicy::PermanentPair => "PERMANENT_PAIR",
        }
    }
}

impl fmt::Display for BindingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 试卷委派状态 (Assignment Status)
// ==========================================
// assigned → completed → approved | rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Assigned,
    Completed,
    Approved,
    Rejected,
}

impl AssignmentStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "assigned" => Some(AssignmentStatus::Assigned),
            "completed" => Some(AssignmentStatus::Completed),
            "approved" => Some(AssignmentStatus::Approved),
            "rejected" => Some(AssignmentStatus::Rejected),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Assigned => "assigned",
            AssignmentStatus::Completed => "completed",
            AssignmentStatus::Approved => "approved",
            AssignmentStatus::Rejected => "rejected",
        }
    }

    /// 终态不允许再迁移
    pub fn is_terminal(&self) -> bool {
        matches!(self, AssignmentStatus::Approved | AssignmentStatus::Rejected)
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 审核结论 (Review Decision)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

impl ReviewDecision {
    pub fn resulting_status(&self) -> AssignmentStatus {
        match self {
            ReviewDecision::Approved => AssignmentStatus::Approved,
            ReviewDecision::Rejected => AssignmentStatus::Rejected,
        }
    }
}

// ==========================================
// 试卷动作 (Exam Action)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamAction {
    Complete,
    Review,
}

impl fmt::Display for ExamAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExamAction::Complete => write!(f, "complete"),
            ExamAction::Review => write!(f, "review"),
        }
    }
}

// ==========================================
// 试卷状态 (Exam Status)
// ==========================================
// exams 表上的镜像字段，跟随最近一次委派迁移
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamStatus {
    Unassigned,
    Assigned,
    Completed,
    Approved,
    Rejected,
}

impl ExamStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "unassigned" | "draft" | "pending" => Some(ExamStatus::Unassigned),
            other => AssignmentStatus::parse(other).map(ExamStatus::from),
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ExamStatus::Unassigned => "unassigned",
            ExamStatus::Assigned => "assigned",
            ExamStatus::Completed => "completed",
            ExamStatus::Approved => "approved",
            ExamStatus::Rejected => "rejected",
        }
    }
}

impl From<AssignmentStatus> for ExamStatus {
    fn from(status: AssignmentStatus) -> Self {
        match status {
            AssignmentStatus::Assigned => ExamStatus::Assigned,
            AssignmentStatus::Completed => ExamStatus::Completed,
            AssignmentStatus::Approved => ExamStatus::Approved,
            AssignmentStatus::Rejected => ExamStatus::Rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_teacher_change_between() {
        assert_eq!(TeacherChange::between(5, 5), TeacherChange::SameTeacher);
        assert_eq!(TeacherChange::between(5, 7), TeacherChange::DifferentTeacher);
        assert!(TeacherChange::from_flag(true).is_different());
    }

    #[test]
    fn test_status_db_strings() {
        assert_eq!(ClassStatus::parse("canceled"), Some(ClassStatus::Cancelled));
        assert_eq!(ClassStatus::parse("unknown"), None);
        assert_eq!(AssignmentStatus::parse("Approved"), Some(AssignmentStatus::Approved));
        assert!(AssignmentStatus::Rejected.is_terminal());
        assert!(!AssignmentStatus::Completed.is_terminal());
        assert_eq!(ExamStatus::parse("completed"), Some(ExamStatus::Completed));
    }

    #[test]
    fn test_binding_policy_parse() {
        assert_eq!(BindingPolicy::parse("permanent_pair"), Some(BindingPolicy::PermanentPair));
        assert_eq!(BindingPolicy::parse(" REVIVE "), Some(BindingPolicy::ReviveOnRebind));
        assert_eq!(BindingPolicy::parse("soft"), None);
        assert_eq!(BindingPolicy::default(), BindingPolicy::ReviveOnRebind);
    }
}
