// ==========================================
// 教务排课核心 - 课次与调课记录领域模型
// ==========================================
// 依据: 3. 数据模型 - ScheduledClass / RescheduledClass
// 红线: 课次只能由调课引擎修改；调课记录只追加不修改
// ==========================================

use crate::domain::types::{ClassStatus, TeacherChange};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

// ==========================================
// TimeWindow - 绝对时间窗口
// ==========================================
// 约束: end > start（零长度/负长度窗口无法构造）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, String> {
        if end <= start {
            return Err(format!("时间窗口无效: start={} end={}", start, end));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// 开区间重叠: start1 < end2 且 start2 < end1（首尾相接不算重叠）
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && start < self.end
    }
}

/// 调课目标时段（绝对时间 + 时区标识）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSlot {
    pub window: TimeWindow,
    pub timezone: Tz,
}

// ==========================================
// ScheduledClass - 课次
// ==========================================
// revision: 乐观锁版本号，每次调课 +1
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledClass {
    pub class_id: i64,
    pub student_id: i64,
    pub teacher_id: i64,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub timezone: Tz,
    pub status: ClassStatus,
    pub revision: i64,
}

impl ScheduledClass {
    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + Duration::minutes(self.duration_minutes)
    }

    pub fn is_booked(&self) -> bool {
        self.status.consumes_credit()
    }
}

// ==========================================
// RescheduledClass - 调课审计记录
// ==========================================
// 对齐: rescheduled_classes 表 (append-only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduledClass {
    pub reschedule_id: String,
    pub class_id: i64,
    pub student_id: i64,
    pub old_teacher_id: i64,
    pub new_teacher_id: i64,
    pub teacher_change: TeacherChange,
    pub old_start_time: DateTime<Utc>,
    pub old_end_time: DateTime<Utc>,
    pub new_start_time: DateTime<Utc>,
    pub new_end_time: DateTime<Utc>,
    pub timezone: Tz,
    pub requested_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RescheduledClass {
    /// different_teacher 列的取值
    pub fn different_teacher(&self) -> bool {
        self.teacher_change.is_different()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, h, m, 0).unwrap()
    }

    #[test]
    fn test_time_window_rejects_empty() {
        assert!(TimeWindow::new(at(10, 0), at(10, 0)).is_err());
        assert!(TimeWindow::new(at(10, 0), at(9, 0)).is_err());
        assert_eq!(
            TimeWindow::new(at(9, 0), at(10, 30)).unwrap().duration(),
            Duration::minutes(90)
        );
    }

    #[test]
    fn test_touching_windows_do_not_overlap() {
        let w = TimeWindow::new(at(9, 0), at(10, 0)).unwrap();
        assert!(!w.overlaps(at(10, 0), at(11, 0)));
        assert!(!w.overlaps(at(8, 0), at(9, 0)));
        assert!(w.overlaps(at(9, 59), at(11, 0)));
        assert!(w.overlaps(at(8, 0), at(12, 0)));
    }
}
