// ==========================================
// 教务排课核心 - 引擎层
// ==========================================
// 职责: 实现调课 / 绑定 / 试卷委派业务规则,不拼 SQL
// 红线: Engine 不拼 SQL, 所有拒绝必须输出 reason code
// ==========================================

pub mod availability;
pub mod availability_core;
pub mod binding_registry;
pub mod entitlement;
pub mod error;
pub mod exam_assignment;
pub mod reschedule;

use chrono::{DateTime, SubsecRound, Utc};

// 重导出核心引擎
pub use availability::AvailabilityCalculator;
pub use availability_core::{AvailabilityCore, AvailabilityVerdict};
pub use binding_registry::{BindOutcome, BindingRegistry};
pub use entitlement::{EntitlementCore, EntitlementDecision, PackageEntitlementChecker};
pub use error::{EngineError, EngineResult, EntitlementDenial, PolicyViolation, Unavailability};
pub use exam_assignment::{ExamAssignmentMachine, MAX_REVIEW_NOTES_CHARS};
pub use reschedule::{RescheduleEngine, RescheduleRequest};

/// 引擎统一时钟（微秒精度，与库内时间戳格式一致）
pub(crate) fn current_instant() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
