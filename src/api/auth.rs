// ==========================================
// 教务排课核心 - 调用方身份与权限
// ==========================================
// 职责: 从已验签的 JWT claims 构造调用方身份，并按角色放行操作
// 红线: 本模块不验签，只信任上游传入的 claims
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::{ExamAssignment, ScheduledClass};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Coordinator,
    Student,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Coordinator => "coordinator",
            Role::Student => "student",
        };
        write!(f, "{}", s)
    }
}

/// 上游网关解析出的 JWT claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JwtClaims {
    /// 用户ID（教师 / 学生角色时即 teacher_id / student_id）
    pub id: i64,
    pub role: Role,
    #[serde(default)]
    pub is_coordinator: bool,
}

/// 调用方身份
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: i64,
    pub role: Role,
    pub is_coordinator: bool,
}

impl From<JwtClaims> for CallerIdentity {
    fn from(claims: JwtClaims) -> Self {
        Self {
            user_id: claims.id,
            role: claims.role,
            is_coordinator: claims.is_coordinator,
        }
    }
}

impl CallerIdentity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// 协调员角色，或带 isCoordinator 标记的教师
    pub fn is_coordinator(&self) -> bool {
        self.role == Role::Coordinator || (self.role == Role::Teacher && self.is_coordinator)
    }

    fn is_staff_manager(&self) -> bool {
        self.is_admin() || self.is_coordinator()
    }

    /// 写入审计记录的 requested_by
    pub fn audit_tag(&self) -> String {
        format!("{}:{}", self.role, self.user_id)
    }

    fn deny(&self, action: &str) -> ApiError {
        ApiError::Forbidden(format!("{} 无权执行 {}", self.audit_tag(), action))
    }

    // ==========================================
    // 权限检查
    // ==========================================

    /// 调课: 管理员 / 协调员 / 该课次的教师 / 该课次的学生
    pub fn authorize_reschedule(&self, class: &ScheduledClass) -> ApiResult<()> {
        let allowed = self.is_staff_manager()
            || (self.role == Role::Teacher && self.user_id == class.teacher_id)
            || (self.role == Role::Student && self.user_id == class.student_id);
        if allowed {
            Ok(())
        } else {
            Err(self.deny("reschedule"))
        }
    }

    /// 绑定 / 解绑: 管理员 / 协调员
    pub fn authorize_binding(&self) -> ApiResult<()> {
        if self.is_staff_manager() {
            Ok(())
        } else {
            Err(self.deny("teacher-binding"))
        }
    }

    /// 委派 / 评审试卷: 管理员 / 协调员
    pub fn authorize_exam_management(&self) -> ApiResult<()> {
        if self.is_staff_manager() {
            Ok(())
        } else {
            Err(self.deny("exam-assignment"))
        }
    }

    /// 完成试卷: 管理员 / 被委派的教师
    pub fn authorize_exam_completion(&self, assignment: &ExamAssignment) -> ApiResult<()> {
        let allowed = self.is_admin()
            || (self.role == Role::Teacher && self.user_id == assignment.teacher_id);
        if allowed {
            Ok(())
        } else {
            Err(self.deny("exam-assignment/complete"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ClassStatus;
    use chrono::{TimeZone, Utc};

    fn caller(id: i64, role: Role, is_coordinator: bool) -> CallerIdentity {
        CallerIdentity {
            user_id: id,
            role,
            is_coordinator,
        }
    }

    fn class() -> ScheduledClass {
        ScheduledClass {
            class_id: 1,
            student_id: 9,
            teacher_id: 5,
            start_time: Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap(),
            duration_minutes: 60,
            timezone: chrono_tz::UTC,
            status: ClassStatus::Scheduled,
            revision: 0,
        }
    }

    #[test]
    fn test_claims_deserialize() {
        let claims: JwtClaims =
            serde_json::from_str(r#"{"id":5,"role":"teacher","isCoordinator":true}"#).unwrap();
        let identity = CallerIdentity::from(claims);
        assert!(identity.is_coordinator());
        assert_eq!(identity.audit_tag(), "teacher:5");

        let claims: JwtClaims = serde_json::from_str(r#"{"id":9,"role":"student"}"#).unwrap();
        assert!(!claims.is_coordinator);
    }

    #[test]
    fn test_reschedule_gate() {
        let class = class();
        assert!(caller(1, Role::Admin, false).authorize_reschedule(&class).is_ok());
        assert!(caller(5, Role::Teacher, false).authorize_reschedule(&class).is_ok());
        assert!(caller(9, Role::Student, false).authorize_reschedule(&class).is_ok());
        assert!(caller(6, Role::Teacher, true).authorize_reschedule(&class).is_ok());

        let err = caller(6, Role::Teacher, false)
            .authorize_reschedule(&class)
            .unwrap_err();
        assert_eq!(err.reason_code(), "FORBIDDEN");
        assert!(caller(10, Role::Student, false).authorize_reschedule(&class).is_err());
    }

    #[test]
    fn test_binding_gate() {
        assert!(caller(1, Role::Coordinator, false).authorize_binding().is_ok());
        assert!(caller(5, Role::Teacher, false).authorize_binding().is_err());
        assert!(caller(9, Role::Student, true).authorize_binding().is_err());
    }
}
