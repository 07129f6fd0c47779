// ==========================================
// 教务排课核心 - API层错误类型
// ==========================================
// 职责: 将引擎错误转换为带 reason code 的接口错误
// 红线: 所有错误必须带显式原因码，供前端渲染
// ==========================================

use crate::engine::{EngineError, PolicyViolation};
use serde::Serialize;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 调用方错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("无权限: {0}")]
    Forbidden(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    /// 业务规则拒绝（调课 / 绑定 / 委派）
    #[error(transparent)]
    Policy(PolicyViolation),

    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("并发冲突: {0}")]
    Conflict(String),

    // ==========================================
    // 基础设施错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("内部错误: {0}")]
    InternalError(String),
}

impl ApiError {
    /// 稳定的原因码
    pub fn reason_code(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Policy(v) => v.reason_code(),
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// 建议的 HTTP 状态码
    pub fn http_status(&self) -> u16 {
        match self {
            ApiError::InvalidInput(_) => 400,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::Policy(v) => match v {
                PolicyViolation::DuplicateBinding { .. }
                | PolicyViolation::DuplicateAssignment { .. }
                | PolicyViolation::InvalidTransition { .. } => 409,
                _ => 422,
            },
            ApiError::DatabaseError(_) | ApiError::InternalError(_) => 500,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            code: self.reason_code().to_string(),
            message: self.to_string(),
            details: match self {
                ApiError::Policy(v) => serde_json::to_value(v).ok(),
                _ => None,
            },
        }
    }
}

/// 错误响应体
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Validation { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            EngineError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            EngineError::Policy(v) => ApiError::Policy(v),
            EngineError::Conflict {
                entity,
                id,
                expected,
                actual,
            } => ApiError::Conflict(format!(
                "{}(id={})已被其他用户修改（期望revision={}，实际revision={}）",
                entity, id, expected, actual
            )),
            EngineError::Persistence(e) => ApiError::DatabaseError(e.to_string()),
            EngineError::Configuration(e) => ApiError::InternalError(e.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EntitlementDenial, Unavailability};
    use crate::repository::RepositoryError;

    #[test]
    fn test_policy_codes_and_status() {
        let err: ApiError = EngineError::Policy(PolicyViolation::SlotUnavailable {
            teacher_id: 5,
            reason: Unavailability::DailyLimitReached { booked: 8, max: 8 },
        })
        .into();
        assert_eq!(err.reason_code(), "SLOT_UNAVAILABLE");
        assert_eq!(err.http_status(), 422);

        let body = err.body();
        assert_eq!(body.code, "SLOT_UNAVAILABLE");
        assert!(body.details.is_some());

        let err = ApiError::Policy(PolicyViolation::DuplicateBinding {
            teacher_id: 5,
            student_id: 9,
        });
        assert_eq!(err.http_status(), 409);
    }

    #[test]
    fn test_engine_error_conversion() {
        let err: ApiError = EngineError::from(RepositoryError::OptimisticLockFailure {
            entity: "ScheduledClass".to_string(),
            id: "100".to_string(),
            expected: 1,
            actual: 2,
        })
        .into();
        match &err {
            ApiError::Conflict(msg) => assert!(msg.contains("已被其他用户修改")),
            other => panic!("Expected Conflict, got {:?}", other),
        }
        assert_eq!(err.http_status(), 409);

        let err: ApiError = EngineError::Policy(PolicyViolation::PackageNotEligible {
            reason: EntitlementDenial::NoCreditsRemaining,
        })
        .into();
        assert_eq!(err.reason_code(), "PACKAGE_NOT_ELIGIBLE");
    }
}
