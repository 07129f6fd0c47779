// ==========================================
// 教务排课核心 - 课时包准入检查
// ==========================================
// 职责: 判定学生在目标日期能否排课（课时包有效期 + 剩余课时）
// 红线: 只读、幂等，可安全重试；不扣减课时
// 口径: 已消耗 = 开始时间（学生时区）落在有效期内的未取消课次数
// ==========================================

use crate::domain::{Package, Student};
use crate::engine::error::{EngineError, EngineResult, EntitlementDenial};
use crate::repository::{ClassLedger, DirectoryReader, SchedulingStore, SchedulingTx};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;

/// 准入判定结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementDecision {
    pub allowed: bool,
    pub reason: Option<EntitlementDenial>,
    /// 剩余课时；无有效课时包时为 None
    pub remaining_credits: Option<u32>,
}

impl EntitlementDecision {
    fn allowed(remaining: u32) -> Self {
        Self {
            allowed: true,
            reason: None,
            remaining_credits: Some(remaining),
        }
    }

    fn denied(reason: EntitlementDenial, remaining_credits: Option<u32>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            remaining_credits,
        }
    }
}

// ==========================================
// EntitlementCore - 纯函数
// ==========================================
pub struct EntitlementCore;

impl EntitlementCore {
    /// # 规则（按顺序）
    /// 1. 无课时包 / 课时包不属于该学生 → NoActivePackage
    /// 2. 有效期非法或不覆盖 date → PackageExpired
    /// 3. 剩余课时 (总课时 - 已消耗) 为 0 → NoCreditsRemaining
    pub fn evaluate(
        student_id: i64,
        package: Option<&Package>,
        consumed: u32,
        date: NaiveDate,
    ) -> EntitlementDecision {
        let package = match package {
            Some(p) if p.student_id == student_id => p,
            _ => return EntitlementDecision::denied(EntitlementDenial::NoActivePackage, None),
        };

        let remaining = package.total_classes.saturating_sub(consumed);
        if package.validate().is_err() || !package.covers(date) {
            return EntitlementDecision::denied(EntitlementDenial::PackageExpired, Some(remaining));
        }
        if remaining == 0 {
            return EntitlementDecision::denied(EntitlementDenial::NoCreditsRemaining, Some(0));
        }
        EntitlementDecision::allowed(remaining)
    }
}

// ==========================================
// PackageEntitlementChecker
// ==========================================
pub struct PackageEntitlementChecker<S>
where
    S: SchedulingStore,
{
    store: Arc<S>,
}

impl<S> PackageEntitlementChecker<S>
where
    S: SchedulingStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// 学生在 date（学生本地日期）能否排课
    pub fn can_schedule_on(
        &self,
        student_id: i64,
        date: NaiveDate,
    ) -> EngineResult<EntitlementDecision> {
        self.store.transaction(|tx| {
            let student = tx
                .find_student(student_id)?
                .ok_or_else(|| EngineError::not_found("Student", student_id))?;
            Self::check_in(tx, &student, date)
        })
    }

    /// 事务内判定
    ///
    /// 被调课次本身也计入已消耗课时：课时已全部排满的学生无法调动任何课次，即使目标日期仍在有效期内。
    pub fn check_in(
        tx: &dyn SchedulingTx,
        student: &Student,
        date: NaiveDate,
    ) -> EngineResult<EntitlementDecision> {
        let package = match student.package_id {
            Some(package_id) => tx.find_package(package_id)?,
            None => None,
        };

        let consumed = match &package {
            Some(p) if p.student_id == student.student_id => {
                let (from, to) = p.validity_instants(student.timezone);
                tx.count_student_classes_between(student.student_id, from, to)?
            }
            _ => 0,
        };

        let decision =
            EntitlementCore::evaluate(student.student_id, package.as_ref(), consumed, date);
        if !decision.allowed {
            tracing::debug!(
                student_id = student.student_id,
                date = %date,
                consumed,
                reason = ?decision.reason,
                "entitlement denied"
            );
        }
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn package(total: u32) -> Package {
        Package {
            package_id: 1,
            student_id: 9,
            name: "春季包".to_string(),
            total_classes: total,
            start_date: d(2024, 3, 1),
            end_date: d(2024, 3, 31),
        }
    }

    #[test]
    fn test_no_package() {
        let decision = EntitlementCore::evaluate(9, None, 0, d(2024, 3, 20));
        assert!(!decision.allowed);
        assert_eq!(decision.reason, Some(EntitlementDenial::NoActivePackage));
    }

    #[test]
    fn test_package_of_other_student_is_not_active() {
        let p = package(10);
        let decision = EntitlementCore::evaluate(10, Some(&p), 0, d(2024, 3, 20));
        assert_eq!(decision.reason, Some(EntitlementDenial::NoActivePackage));
    }

    #[test]
    fn test_validity_window_is_inclusive() {
        let p = package(10);
        assert!(EntitlementCore::evaluate(9, Some(&p), 0, d(2024, 3, 1)).allowed);
        assert!(EntitlementCore::evaluate(9, Some(&p), 0, d(2024, 3, 31)).allowed);
        assert_eq!(
            EntitlementCore::evaluate(9, Some(&p), 0, d(2024, 4, 1)).reason,
            Some(EntitlementDenial::PackageExpired)
        );
    }

    #[test]
    fn test_zero_credits_remaining() {
        let p = package(4);
        let decision = EntitlementCore::evaluate(9, Some(&p), 4, d(2024, 3, 20));
        assert_eq!(decision.reason, Some(EntitlementDenial::NoCreditsRemaining));
        assert_eq!(decision.remaining_credits, Some(0));

        let decision = EntitlementCore::evaluate(9, Some(&p), 3, d(2024, 3, 20));
        assert!(decision.allowed);
        assert_eq!(decision.remaining_credits, Some(1));
    }

    #[test]
    fn test_idempotent() {
        let p = package(4);
        let a = EntitlementCore::evaluate(9, Some(&p), 2, d(2024, 3, 20));
        let b = EntitlementCore::evaluate(9, Some(&p), 2, d(2024, 3, 20));
        assert_eq!(a, b);
    }
}
