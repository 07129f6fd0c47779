// ==========================================
// 教务排课核心 - 试卷委派状态机
// ==========================================
// 状态: Assigned → Completed → Approved | Rejected
// 并发: 每次迁移为比较并设置 (WHERE status = 读取时的状态)
// 红线: 迁移与 exams 表镜像在同一事务内完成
// ==========================================

use crate::domain::{
    AssignmentState, ExamAction, ExamAssignment, ReviewDecision, TransitionRejected,
};
use crate::engine::current_instant;
use crate::engine::error::{EngineError, EngineResult, PolicyViolation};
use crate::repository::{DirectoryReader, ExamLedger, SchedulingStore, SchedulingTx};
use std::sync::Arc;
use tracing::instrument;

/// 评审意见最大长度（字符）
pub const MAX_REVIEW_NOTES_CHARS: usize = 2000;

// ==========================================
// ExamAssignmentMachine
// ==========================================
pub struct ExamAssignmentMachine<S>
where
    S: SchedulingStore,
{
    store: Arc<S>,
}

impl<S> ExamAssignmentMachine<S>
where
    S: SchedulingStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// 将试卷委派给教师
    ///
    /// # 错误
    /// - `NotFound`: 试卷或教师不存在
    /// - `Policy(TeacherInactive)`: 教师已停用
    /// - `Policy(DuplicateAssignment)`: 该试卷已委派给该教师
    #[instrument(skip(self))]
    pub fn assign(&self, exam_id: i64, teacher_id: i64) -> EngineResult<ExamAssignment> {
        let now = current_instant();
        let assignment = self.store.transaction(|tx| {
            if tx.find_exam(exam_id)?.is_none() {
                return Err(EngineError::not_found("Exam", exam_id));
            }
            let teacher = tx
                .find_teacher(teacher_id)?
                .ok_or_else(|| EngineError::not_found("Teacher", teacher_id))?;
            if !teacher.active {
                return Err(PolicyViolation::TeacherInactive { teacher_id }.into());
            }

            let assignment = ExamAssignment::new(exam_id, teacher_id, now);
            tx.insert_assignment(&assignment).map_err(|e| {
                if e.is_unique_violation() {
                    EngineError::from(PolicyViolation::DuplicateAssignment {
                        exam_id,
                        teacher_id,
                    })
                } else {
                    EngineError::from(e)
                }
            })?;
            tx.mirror_exam_state(exam_id, teacher_id, &assignment.state)?;
            Ok(assignment)
        });

        self.log_outcome("assign", &assignment);
        assignment
    }

    /// 教师完成试卷 (assigned → completed)
    #[instrument(skip(self))]
    pub fn complete(&self, assignment_id: &str) -> EngineResult<ExamAssignment> {
        Self::validate_id(assignment_id)?;
        let now = current_instant();
        let result = self.store.transaction(|tx| {
            Self::transition_in(tx, assignment_id, ExamAction::Complete, |state| {
                state.complete(now)
            })
        });
        self.log_outcome("complete", &result);
        result
    }

    /// 评审试卷 (completed → approved | rejected)
    #[instrument(skip(self, notes))]
    pub fn review(
        &self,
        assignment_id: &str,
        decision: ReviewDecision,
        notes: Option<String>,
    ) -> EngineResult<ExamAssignment> {
        Self::validate_id(assignment_id)?;
        let notes = match notes.map(|n| n.trim().to_string()) {
            Some(n) if n.is_empty() => None,
            Some(n) if n.chars().count() > MAX_REVIEW_NOTES_CHARS => {
                return Err(EngineError::validation(
                    "review_notes",
                    format!("评审意见超过 {} 字符", MAX_REVIEW_NOTES_CHARS),
                ))
            }
            other => other,
        };

        let now = current_instant();
        let result = self.store.transaction(|tx| {
            Self::transition_in(tx, assignment_id, ExamAction::Review, |state| {
                state.review(decision, notes.clone(), now)
            })
        });
        self.log_outcome("review", &result);
        result
    }

    /// 查询委派
    pub fn get(&self, assignment_id: &str) -> EngineResult<ExamAssignment> {
        Self::validate_id(assignment_id)?;
        self.store.transaction(|tx| {
            tx.find_assignment(assignment_id)?
                .ok_or_else(|| EngineError::not_found("ExamAssignment", assignment_id))
        })
    }

    fn transition_in<F>(
        tx: &dyn SchedulingTx,
        assignment_id: &str,
        action: ExamAction,
        step: F,
    ) -> EngineResult<ExamAssignment>
    where
        F: FnOnce(&AssignmentState) -> Result<AssignmentState, TransitionRejected>,
    {
        let current = tx
            .find_assignment(assignment_id)?
            .ok_or_else(|| EngineError::not_found("ExamAssignment", assignment_id))?;

        let next = step(&current.state).map_err(|rejected| PolicyViolation::InvalidTransition {
            assignment_id: assignment_id.to_string(),
            from: rejected.from,
            action: rejected.action,
        })?;

        let rows = tx.transition_assignment(assignment_id, current.status(), &next)?;
        if rows == 0 {
            // 读取之后状态已被他人推进
            let from = tx
                .find_assignment(assignment_id)?
                .map(|a| a.status())
                .unwrap_or(current.status());
            return Err(PolicyViolation::InvalidTransition {
                assignment_id: assignment_id.to_string(),
                from,
                action,
            }
            .into());
        }

        tx.mirror_exam_state(current.exam_id, current.teacher_id, &next)?;
        Ok(ExamAssignment {
            state: next,
            ..current
        })
    }

    fn validate_id(assignment_id: &str) -> EngineResult<()> {
        if assignment_id.trim().is_empty() {
            return Err(EngineError::validation("assignment_id", "不能为空"));
        }
        Ok(())
    }

    fn log_outcome(&self, op: &str, result: &EngineResult<ExamAssignment>) {
        match result {
            Ok(a) => tracing::info!(
                op,
                assignment_id = %a.assignment_id,
                exam_id = a.exam_id,
                teacher_id = a.teacher_id,
                status = %a.status(),
                "试卷委派状态已更新"
            ),
            Err(EngineError::Policy(v)) => {
                tracing::warn!(op, code = v.reason_code(), "试卷委派操作被拒绝: {}", v)
            }
            Err(_) => {}
        }
    }
}
