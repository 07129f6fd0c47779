// ==========================================
// 教务排课核心 - 教师可用性计算
// ==========================================
// 职责: 加载教师与当日课次，调用 AvailabilityCore 判定
// 红线: 只读查询，不写库
// 输入错误 (教师不存在 / 时段非法) 返回 Err，规则不满足返回 false
// ==========================================

use crate::domain::{Teacher, TimeWindow};
use crate::engine::availability_core::{AvailabilityCore, AvailabilityVerdict};
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::{ClassLedger, DirectoryReader, SchedulingStore, SchedulingTx};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::instrument;

// ==========================================
// AvailabilityCalculator
// ==========================================
pub struct AvailabilityCalculator<S>
where
    S: SchedulingStore,
{
    store: Arc<S>,
}

impl<S> AvailabilityCalculator<S>
where
    S: SchedulingStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// 教师在 [window_start, window_end) 是否可用
    pub fn is_available(
        &self,
        teacher_id: i64,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> EngineResult<bool> {
        Ok(self
            .evaluate(teacher_id, window_start, window_end)?
            .is_available())
    }

    /// 同 is_available，但返回具体不可用原因
    #[instrument(skip(self))]
    pub fn evaluate(
        &self,
        teacher_id: i64,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> EngineResult<AvailabilityVerdict> {
        let window = TimeWindow::new(window_start, window_end)
            .map_err(|message| EngineError::validation("window", message))?;

        self.store.transaction(|tx| {
            let teacher = tx
                .find_teacher(teacher_id)?
                .ok_or_else(|| EngineError::not_found("Teacher", teacher_id))?;
            Self::evaluate_in(tx, &teacher, &window, None)
        })
    }

    /// 事务内判定（供调课引擎在同一事务中 check-then-act）
    pub fn evaluate_in(
        tx: &dyn SchedulingTx,
        teacher: &Teacher,
        window: &TimeWindow,
        exclude_class_id: Option<i64>,
    ) -> EngineResult<AvailabilityVerdict> {
        let date = AvailabilityCore::teacher_local_date(teacher, window.start());
        let (day_start, day_end) = AvailabilityCore::local_day_bounds(teacher.timezone, date);
        let from = day_start.min(window.start());
        let to = day_end.max(window.end());

        let booked = tx.list_teacher_classes_between(teacher.teacher_id, from, to)?;
        let verdict = AvailabilityCore::evaluate(teacher, window, &booked, exclude_class_id);

        tracing::debug!(
            teacher_id = teacher.teacher_id,
            window_start = %window.start(),
            window_end = %window.end(),
            booked = booked.len(),
            verdict = ?verdict,
            "availability evaluated"
        );
        Ok(verdict)
    }
}
