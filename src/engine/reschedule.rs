// ==========================================
// 教务排课核心 - 调课引擎
// ==========================================
// 职责: 将课次移动到新时段（可换教师），并追加调课审计记录
// 流程: 输入校验 → 确定目标教师 → 课时包准入 → 教师可用性
//       → (换教师) 更新师生绑定 → 更新课次 → 追加审计 → 提交
// 并发: 预读 revision，再在单个 IMMEDIATE 事务内重读并校验；
//       冲突时按配置重试（调用方显式携带 revision 时不重试）
// 红线: 任一步失败整体回滚，课次保持原状
// ==========================================

use crate::config::SchedulingConfigReader;
use crate::domain::{
    BindingPolicy, ClassStatus, NewSlot, RescheduledClass, ScheduledClass, TeacherChange,
};
use crate::engine::availability::AvailabilityCalculator;
use crate::engine::availability_core::AvailabilityVerdict;
use crate::engine::binding_registry::BindingRegistry;
use crate::engine::current_instant;
use crate::engine::entitlement::PackageEntitlementChecker;
use crate::engine::error::{EngineError, EngineResult, EntitlementDenial, PolicyViolation};
use crate::repository::{ClassLedger, DirectoryReader, SchedulingStore, SchedulingTx};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::instrument;

/// 调课请求
#[derive(Debug, Clone, PartialEq)]
pub struct RescheduleRequest {
    pub class_id: i64,
    pub new_slot: NewSlot,
    /// 为空或等于当前教师时视为原教师调课
    pub requested_teacher_id: Option<i64>,
    /// 调用方读取到的 revision；为空时由引擎预读
    pub expected_revision: Option<i64>,
    pub requested_by: Option<String>,
}

/// 单次调课使用的配置（在进入事务前读取完毕）
#[derive(Debug, Clone, Copy)]
struct RescheduleSettings {
    binding_policy: BindingPolicy,
    conflict_retry_limit: u32,
    min_class_minutes: i64,
    max_class_minutes: i64,
}

// ==========================================
// RescheduleEngine
// ==========================================
pub struct RescheduleEngine<S, C>
where
    S: SchedulingStore,
    C: SchedulingConfigReader,
{
    store: Arc<S>,
    config: Arc<C>,
}

impl<S, C> RescheduleEngine<S, C>
where
    S: SchedulingStore,
    C: SchedulingConfigReader,
{
    pub fn new(store: Arc<S>, config: Arc<C>) -> Self {
        Self { store, config }
    }

    /// 调课
    ///
    /// # 返回
    /// - `Ok(RescheduledClass)`: 已提交的审计记录
    ///
    /// # 错误
    /// - `Validation`: 时长非整分钟或超出配置范围
    /// - `NotFound`: 课次 / 学生 / 目标教师不存在
    /// - `Policy(..)`: 业务规则拒绝（不重试）
    /// - `Conflict`: revision 冲突且重试耗尽，或调用方 revision 已过期
    #[instrument(skip(self, request), fields(class_id = request.class_id))]
    pub async fn reschedule(&self, request: RescheduleRequest) -> EngineResult<RescheduledClass> {
        let settings = self.load_settings().await?;
        let duration_minutes = Self::validate_slot(&request.new_slot, &settings)?;

        let mut attempt: u32 = 0;
        loop {
            let expected_revision = match request.expected_revision {
                Some(revision) => revision,
                None => self.preflight_revision(request.class_id)?,
            };
            let now = current_instant();

            let result = self.store.transaction(|tx| {
                Self::apply_in(tx, &request, expected_revision, duration_minutes, &settings, now)
            });

            match result {
                Ok(record) => {
                    tracing::info!(
                        class_id = record.class_id,
                        reschedule_id = %record.reschedule_id,
                        teacher_change = %record.teacher_change,
                        old_teacher_id = record.old_teacher_id,
                        new_teacher_id = record.new_teacher_id,
                        new_start = %record.new_start_time,
                        attempt,
                        "调课完成"
                    );
                    return Ok(record);
                }
                Err(err)
                    if err.is_retryable()
                        && request.expected_revision.is_none()
                        && attempt < settings.conflict_retry_limit =>
                {
                    attempt += 1;
                    tracing::warn!(
                        class_id = request.class_id,
                        attempt,
                        "调课并发冲突，基于最新状态重试: {}",
                        err
                    );
                }
                Err(err) => {
                    match &err {
                        EngineError::Policy(v) => tracing::warn!(
                            class_id = request.class_id,
                            code = v.reason_code(),
                            "调课被拒绝: {}",
                            v
                        ),
                        EngineError::Conflict { .. } => tracing::warn!(
                            class_id = request.class_id,
                            attempt,
                            "调课并发冲突: {}",
                            err
                        ),
                        _ => tracing::error!(class_id = request.class_id, "调课失败: {}", err),
                    }
                    return Err(err);
                }
            }
        }
    }

    /// 当前课次
    pub fn get_class(&self, class_id: i64) -> EngineResult<ScheduledClass> {
        self.store.transaction(|tx| {
            tx.find_class(class_id)?
                .ok_or_else(|| EngineError::not_found("ScheduledClass", class_id))
        })
    }

    /// 课次的调课记录（按时间顺序）
    pub fn history(&self, class_id: i64) -> EngineResult<Vec<RescheduledClass>> {
        self.store
            .transaction(|tx| Ok(tx.list_reschedules(class_id)?))
    }

    // ==========================================
    // 内部步骤
    // ==========================================

    async fn load_settings(&self) -> EngineResult<RescheduleSettings> {
        Ok(RescheduleSettings {
            binding_policy: self.config.get_binding_policy().await?,
            conflict_retry_limit: self.config.get_conflict_retry_limit().await?,
            min_class_minutes: self.config.get_min_class_minutes().await?,
            max_class_minutes: self.config.get_max_class_minutes().await?,
        })
    }

    /// 校验新时段，返回时长（分钟）
    fn validate_slot(slot: &NewSlot, settings: &RescheduleSettings) -> EngineResult<i64> {
        let duration = slot.window.duration();
        if duration != Duration::minutes(duration.num_minutes()) {
            return Err(EngineError::validation("new_slot", "课次时长必须为整分钟"));
        }
        let minutes = duration.num_minutes();
        if minutes < settings.min_class_minutes || minutes > settings.max_class_minutes {
            return Err(EngineError::validation(
                "new_slot",
                format!(
                    "课次时长 {} 分钟超出允许范围 [{}, {}]",
                    minutes, settings.min_class_minutes, settings.max_class_minutes
                ),
            ));
        }
        Ok(minutes)
    }

    fn preflight_revision(&self, class_id: i64) -> EngineResult<i64> {
        Ok(self.get_class(class_id)?.revision)
    }

    fn apply_in(
        tx: &dyn SchedulingTx,
        request: &RescheduleRequest,
        expected_revision: i64,
        duration_minutes: i64,
        settings: &RescheduleSettings,
        now: DateTime<Utc>,
    ) -> EngineResult<RescheduledClass> {
        let window = &request.new_slot.window;

        // === 步骤 1: 重读课次并校验 revision ===
        let class = tx
            .find_class(request.class_id)?
            .ok_or_else(|| EngineError::not_found("ScheduledClass", request.class_id))?;
        if class.revision != expected_revision {
            return Err(EngineError::Conflict {
                entity: "ScheduledClass".to_string(),
                id: class.class_id.to_string(),
                expected: expected_revision,
                actual: class.revision,
            });
        }
        if class.status != ClassStatus::Scheduled {
            return Err(PolicyViolation::ClassNotReschedulable {
                class_id: class.class_id,
                status: class.status,
            }
            .into());
        }

        // === 步骤 2: 确定目标教师 ===
        let student = tx
            .find_student(class.student_id)?
            .ok_or_else(|| EngineError::not_found("Student", class.student_id))?;
        let target_teacher_id = request.requested_teacher_id.unwrap_or(class.teacher_id);
        let teacher_change = TeacherChange::between(class.teacher_id, target_teacher_id);
        if teacher_change.is_different() && !student.allow_different_teacher {
            return Err(PolicyViolation::TeacherChangeNotPermitted {
                student_id: student.student_id,
            }
            .into());
        }
        let teacher = tx
            .find_teacher(target_teacher_id)?
            .ok_or_else(|| EngineError::not_found("Teacher", target_teacher_id))?;

        // === 步骤 3: 课时包准入（学生本地日期） ===
        let target_date = student.local_date_of(window.start());
        let decision = PackageEntitlementChecker::<S>::check_in(tx, &student, target_date)?;
        if !decision.allowed {
            let reason = decision
                .reason
                .unwrap_or(EntitlementDenial::NoActivePackage);
            return Err(PolicyViolation::PackageNotEligible { reason }.into());
        }

        // === 步骤 4: 教师可用性（排除课次自身） ===
        let verdict =
            AvailabilityCalculator::<S>::evaluate_in(tx, &teacher, window, Some(class.class_id))?;
        if let AvailabilityVerdict::Unavailable(reason) = verdict {
            return Err(PolicyViolation::SlotUnavailable {
                teacher_id: target_teacher_id,
                reason,
            }
            .into());
        }

        // === 步骤 5: 换教师时更新绑定 ===
        if teacher_change.is_different() {
            BindingRegistry::<S, C>::ensure_bound_in(
                tx,
                settings.binding_policy,
                target_teacher_id,
                student.student_id,
                now,
            )?;
        }

        // === 步骤 6: 更新课次 + 追加审计 ===
        tx.update_class_slot(
            class.class_id,
            expected_revision,
            target_teacher_id,
            window.start(),
            duration_minutes,
            request.new_slot.timezone,
        )?;

        let record = RescheduledClass {
            reschedule_id: uuid::Uuid::new_v4().to_string(),
            class_id: class.class_id,
            student_id: class.student_id,
            old_teacher_id: class.teacher_id,
            new_teacher_id: target_teacher_id,
            teacher_change,
            old_start_time: class.start_time,
            old_end_time: class.end_time(),
            new_start_time: window.start(),
            new_end_time: window.end(),
            timezone: request.new_slot.timezone,
            requested_by: request.requested_by.clone(),
            created_at: now,
        };
        tx.insert_reschedule(&record)?;
        Ok(record)
    }
}
