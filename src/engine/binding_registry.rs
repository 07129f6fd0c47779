// ==========================================
// 教务排课核心 - 师生绑定登记
// ==========================================
// 职责: 绑定 / 解绑 / 查询当前教师
// 红线: 每个学生至多一个生效绑定；UNIQUE(teacher_id, student_id) 为最终裁决
// 策略: BindingPolicy 决定解绑后再次绑定同一师生对的行为
// ==========================================

use crate::config::SchedulingConfigReader;
use crate::domain::{BindingPolicy, TeacherStudentBinding};
use crate::engine::current_instant;
use crate::engine::error::{EngineError, EngineResult, PolicyViolation};
use crate::repository::{BindingLedger, DirectoryReader, SchedulingStore, SchedulingTx};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

/// 绑定结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BindOutcome {
    pub binding: TeacherStudentBinding,
    /// 被替换（已解绑）的原绑定
    pub superseded: Option<TeacherStudentBinding>,
}

// ==========================================
// BindingRegistry
// ==========================================
pub struct BindingRegistry<S, C>
where
    S: SchedulingStore,
    C: SchedulingConfigReader,
{
    store: Arc<S>,
    config: Arc<C>,
}

impl<S, C> BindingRegistry<S, C>
where
    S: SchedulingStore,
    C: SchedulingConfigReader,
{
    pub fn new(store: Arc<S>, config: Arc<C>) -> Self {
        Self { store, config }
    }

    /// 绑定教师与学生
    ///
    /// # 错误
    /// - `NotFound`: 教师或学生不存在
    /// - `Policy(TeacherInactive)`: 教师已停用
    /// - `Policy(DuplicateBinding)`: 该师生对已生效
    /// - `Policy(BindingRetired)`: PermanentPair 策略下该师生对已解绑过
    #[instrument(skip(self))]
    pub async fn bind(&self, teacher_id: i64, student_id: i64) -> EngineResult<BindOutcome> {
        let policy = self.config.get_binding_policy().await?;
        let now = current_instant();

        let outcome = self
            .store
            .transaction(|tx| Self::bind_in(tx, policy, teacher_id, student_id, now));

        match &outcome {
            Ok(o) => tracing::info!(
                teacher_id,
                student_id,
                policy = %policy,
                superseded_teacher = ?o.superseded.as_ref().map(|b| b.teacher_id),
                "师生绑定完成"
            ),
            Err(EngineError::Policy(v)) => {
                tracing::warn!(teacher_id, student_id, code = v.reason_code(), "师生绑定被拒绝: {}", v)
            }
            Err(_) => {}
        }
        outcome
    }

    /// 解绑（软删除，保留历史记录）
    ///
    /// # 错误
    /// - `NotFound`: 该师生对没有生效绑定
    #[instrument(skip(self))]
    pub fn unbind(&self, teacher_id: i64, student_id: i64) -> EngineResult<TeacherStudentBinding> {
        let now = current_instant();
        let binding = self
            .store
            .transaction(|tx| Self::unbind_in(tx, teacher_id, student_id, now))?;
        tracing::info!(teacher_id, student_id, "师生解绑完成");
        Ok(binding)
    }

    /// 学生当前绑定的教师
    pub fn current_teacher_of(&self, student_id: i64) -> EngineResult<Option<i64>> {
        self.store.transaction(|tx| {
            Ok(tx
                .find_live_binding_for_student(student_id)?
                .map(|b| b.teacher_id))
        })
    }

    // ==========================================
    // 事务内操作
    // ==========================================

    pub fn bind_in(
        tx: &dyn SchedulingTx,
        policy: BindingPolicy,
        teacher_id: i64,
        student_id: i64,
        now: DateTime<Utc>,
    ) -> EngineResult<BindOutcome> {
        let teacher = tx
            .find_teacher(teacher_id)?
            .ok_or_else(|| EngineError::not_found("Teacher", teacher_id))?;
        if tx.find_student(student_id)?.is_none() {
            return Err(EngineError::not_found("Student", student_id));
        }
        if !teacher.active {
            return Err(PolicyViolation::TeacherInactive { teacher_id }.into());
        }

        match tx.find_binding(teacher_id, student_id)? {
            Some(existing) if existing.active => {
                Err(PolicyViolation::DuplicateBinding {
                    teacher_id,
                    student_id,
                }
                .into())
            }
            Some(retired) => match policy {
                BindingPolicy::PermanentPair => Err(PolicyViolation::BindingRetired {
                    teacher_id,
                    student_id,
                }
                .into()),
                BindingPolicy::ReviveOnRebind => {
                    let superseded = Self::supersede_live(tx, student_id, now)?;
                    tx.set_binding_active(&retired.binding_id, true, now)
                        .map_err(|e| Self::map_unique(e, teacher_id, student_id))?;
                    let binding = TeacherStudentBinding {
                        active: true,
                        bound_at: now,
                        unbound_at: None,
                        ..retired
                    };
                    Ok(BindOutcome {
                        binding,
                        superseded,
                    })
                }
            },
            None => {
                let superseded = Self::supersede_live(tx, student_id, now)?;
                let binding = TeacherStudentBinding::new(teacher_id, student_id, now);
                tx.insert_binding(&binding)
                    .map_err(|e| Self::map_unique(e, teacher_id, student_id))?;
                Ok(BindOutcome {
                    binding,
                    superseded,
                })
            }
        }
    }

    /// 调课换教师时使用: 已与目标教师生效绑定则不做任何变更
    pub fn ensure_bound_in(
        tx: &dyn SchedulingTx,
        policy: BindingPolicy,
        teacher_id: i64,
        student_id: i64,
        now: DateTime<Utc>,
    ) -> EngineResult<Option<BindOutcome>> {
        match tx.find_live_binding_for_student(student_id)? {
            Some(live) if live.teacher_id == teacher_id => Ok(None),
            _ => Self::bind_in(tx, policy, teacher_id, student_id, now).map(Some),
        }
    }

    pub fn unbind_in(
        tx: &dyn SchedulingTx,
        teacher_id: i64,
        student_id: i64,
        now: DateTime<Utc>,
    ) -> EngineResult<TeacherStudentBinding> {
        let binding = match tx.find_binding(teacher_id, student_id)? {
            Some(b) if b.active => b,
            _ => {
                return Err(EngineError::not_found(
                    "TeacherStudentBinding",
                    format!("teacher={},student={}", teacher_id, student_id),
                ))
            }
        };

        tx.set_binding_active(&binding.binding_id, false, now)?;
        Ok(TeacherStudentBinding {
            active: false,
            unbound_at: Some(now),
            ..binding
        })
    }

    /// 先解除学生的现有生效绑定，再激活新绑定
    fn supersede_live(
        tx: &dyn SchedulingTx,
        student_id: i64,
        now: DateTime<Utc>,
    ) -> EngineResult<Option<TeacherStudentBinding>> {
        match tx.find_live_binding_for_student(student_id)? {
            Some(live) => {
                tx.set_binding_active(&live.binding_id, false, now)?;
                Ok(Some(TeacherStudentBinding {
                    active: false,
                    unbound_at: Some(now),
                    ..live
                }))
            }
            None => Ok(None),
        }
    }

    fn map_unique(
        err: crate::repository::RepositoryError,
        teacher_id: i64,
        student_id: i64,
    ) -> EngineError {
        if err.is_unique_violation() {
            PolicyViolation::DuplicateBinding {
                teacher_id,
                student_id,
            }
            .into()
        } else {
            err.into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticConfig;
    use crate::domain::{Student, Teacher, WorkHours, WorkInterval};
    use crate::repository::InMemorySchedulingStore;
    use chrono::NaiveTime;

    fn teacher(id: i64, active: bool) -> Teacher {
        Teacher {
            teacher_id: id,
            name: format!("T{}", id),
            working_days: vec![chrono::Weekday::Mon],
            work_hours: WorkHours::uniform(
                WorkInterval::new(
                    NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                    NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
                )
                .unwrap(),
            ),
            max_students_per_day: 8,
            active,
            is_coordinator: false,
            timezone: chrono_tz::UTC,
        }
    }

    fn registry(policy: BindingPolicy) -> BindingRegistry<InMemorySchedulingStore, StaticConfig> {
        let store = InMemorySchedulingStore::new();
        store.upsert_teacher(teacher(5, true)).unwrap();
        store.upsert_teacher(teacher(6, true)).unwrap();
        store.upsert_teacher(teacher(7, false)).unwrap();
        store
            .upsert_student(Student {
                student_id: 9,
                name: "小明".to_string(),
                package_id: None,
                allow_different_teacher: true,
                timezone: chrono_tz::UTC,
            })
            .unwrap();
        BindingRegistry::new(
            Arc::new(store),
            Arc::new(StaticConfig::default().with_binding_policy(policy)),
        )
    }

    #[tokio::test]
    async fn test_second_bind_of_same_pair_rejected() {
        let registry = registry(BindingPolicy::ReviveOnRebind);
        registry.bind(5, 9).await.unwrap();
        let err = registry.bind(5, 9).await.unwrap_err();
        assert_eq!(
            err.policy(),
            Some(&PolicyViolation::DuplicateBinding {
                teacher_id: 5,
                student_id: 9
            })
        );
    }

    #[tokio::test]
    async fn test_bind_elsewhere_supersedes() {
        let registry = registry(BindingPolicy::ReviveOnRebind);
        registry.bind(5, 9).await.unwrap();
        let outcome = registry.bind(6, 9).await.unwrap();
        assert_eq!(outcome.superseded.map(|b| b.teacher_id), Some(5));
        assert_eq!(registry.current_teacher_of(9).unwrap(), Some(6));
    }

    #[tokio::test]
    async fn test_inactive_teacher_cannot_bind() {
        let registry = registry(BindingPolicy::ReviveOnRebind);
        let err = registry.bind(7, 9).await.unwrap_err();
        assert_eq!(
            err.policy(),
            Some(&PolicyViolation::TeacherInactive { teacher_id: 7 })
        );
    }

    #[tokio::test]
    async fn test_unbind_without_live_binding_is_not_found() {
        let registry = registry(BindingPolicy::ReviveOnRebind);
        assert!(matches!(
            registry.unbind(5, 9),
            Err(EngineError::NotFound { .. })
        ));
    }
}
