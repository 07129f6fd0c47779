// ==========================================
// 教务排课核心 - Availability Core 纯函数库
// ==========================================
// 职责: 教师时段可用性判定的纯逻辑
// 红线: 无状态、无副作用、无 I/O 操作
// 时间: 所有比较在绝对时刻 (UTC) 上进行，本地时间只用于确定日期与工作时段
// ==========================================

use crate::domain::student::local_midnight;
use crate::domain::{ScheduledClass, Teacher, TimeWindow};
use crate::engine::error::Unavailability;
use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;

/// 可用性判定结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", content = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AvailabilityVerdict {
    Available,
    Unavailable(Unavailability),
}

impl AvailabilityVerdict {
    pub fn is_available(&self) -> bool {
        matches!(self, AvailabilityVerdict::Available)
    }
}

// ==========================================
// AvailabilityCore - 纯函数工具类
// ==========================================
pub struct AvailabilityCore;

impl AvailabilityCore {
    /// 本地日期 + 本地时刻 → 绝对时刻
    ///
    /// # 规则
    /// - 夏令时跳变缺口内的时刻顺延 1 小时
    /// - 重复时刻: prefer_latest=false 取较早者，true 取较晚者
    pub fn resolve_local(
        tz: Tz,
        date: NaiveDate,
        time: NaiveTime,
        prefer_latest: bool,
    ) -> DateTime<Utc> {
        let naive = date.and_time(time);
        let resolved = match tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => Some(dt),
            LocalResult::Ambiguous(earliest, latest) => {
                Some(if prefer_latest { latest } else { earliest })
            }
            LocalResult::None => tz
                .from_local_datetime(&(naive + Duration::hours(1)))
                .earliest(),
        };
        resolved
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
    }

    /// 某本地日期在时区下的绝对区间 [当日零点, 次日零点)
    pub fn local_day_bounds(tz: Tz, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let next = date.succ_opt().unwrap_or(date);
        (local_midnight(tz, date), local_midnight(tz, next))
    }

    /// 时段开始时刻在教师时区的本地日期
    pub fn teacher_local_date(teacher: &Teacher, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&teacher.timezone).date_naive()
    }

    /// 判定教师在 window 内是否可用
    ///
    /// # 参数
    /// - `booked`: 教师在该本地日及 window 范围内的未取消课次
    /// - `exclude_class_id`: 调课时排除正在移动的课次本身
    ///
    /// # 规则（按顺序，首个失败即返回）
    /// 1. 教师已停用 → TeacherInactive
    /// 2. 时段跨越本地两个日历日 → SpansMultipleDays
    /// 3. 非工作日 → NotAWorkingDay
    /// 4. 超出当日工作时段 → OutsideWorkingHours
    /// 5. 与其他课次重叠 (s1 < e2 && s2 < e1) → OverlapsBookedClass
    /// 6. 当日课次数 + 1 > max_students_per_day → DailyLimitReached
    pub fn evaluate(
        teacher: &Teacher,
        window: &TimeWindow,
        booked: &[ScheduledClass],
        exclude_class_id: Option<i64>,
    ) -> AvailabilityVerdict {
        if !teacher.active {
            return AvailabilityVerdict::Unavailable(Unavailability::TeacherInactive);
        }

        let tz = teacher.timezone;
        let date = Self::teacher_local_date(teacher, window.start());
        // 结束时刻为次日零点时仍视为同一天
        let last_instant = window.end() - Duration::nanoseconds(1);
        if Self::teacher_local_date(teacher, last_instant) != date {
            return AvailabilityVerdict::Unavailable(Unavailability::SpansMultipleDays);
        }

        let weekday = chrono::Datelike::weekday(&date);
        let interval = match teacher.hours_on(weekday) {
            Some(interval) => interval,
            None => {
                return AvailabilityVerdict::Unavailable(Unavailability::NotAWorkingDay {
                    day: weekday.to_string(),
                })
            }
        };

        let work_start = Self::resolve_local(tz, date, interval.start, false);
        let work_end = Self::resolve_local(tz, date, interval.end, true);
        if window.start() < work_start || window.end() > work_end {
            return AvailabilityVerdict::Unavailable(Unavailability::OutsideWorkingHours);
        }

        let others = booked.iter().filter(|c| {
            c.teacher_id == teacher.teacher_id
                && c.is_booked()
                && Some(c.class_id) != exclude_class_id
        });

        let (day_start, day_end) = Self::local_day_bounds(tz, date);
        let mut booked_today: u32 = 0;
        for class in others {
            if window.overlaps(class.start_time, class.end_time()) {
                return AvailabilityVerdict::Unavailable(Unavailability::OverlapsBookedClass {
                    class_id: class.class_id,
                });
            }
            if class.start_time >= day_start && class.start_time < day_end {
                booked_today += 1;
            }
        }

        if booked_today + 1 > teacher.max_students_per_day {
            return AvailabilityVerdict::Unavailable(Unavailability::DailyLimitReached {
                booked: booked_today,
                max: teacher.max_students_per_day,
            });
        }

        AvailabilityVerdict::Available
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClassStatus, WorkHours, WorkInterval};
    use chrono::Weekday;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn teacher(tz: Tz, max: u32) -> Teacher {
        Teacher {
            teacher_id: 5,
            name: "李老师".to_string(),
            working_days: vec![Weekday::Mon, Weekday::Tue, Weekday::Wed],
            work_hours: WorkHours::uniform(WorkInterval::new(hm(9, 0), hm(18, 0)).unwrap()),
            max_students_per_day: max,
            active: true,
            is_coordinator: false,
            timezone: tz,
        }
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn window(start: DateTime<Utc>, minutes: i64) -> TimeWindow {
        TimeWindow::new(start, start + Duration::minutes(minutes)).unwrap()
    }

    fn class(id: i64, start: DateTime<Utc>, minutes: i64) -> ScheduledClass {
        ScheduledClass {
            class_id: id,
            student_id: 100 + id,
            teacher_id: 5,
            start_time: start,
            duration_minutes: minutes,
            timezone: chrono_tz::UTC,
            status: ClassStatus::Scheduled,
            revision: 0,
        }
    }

    #[test]
    fn test_inside_working_hours_available() {
        let t = teacher(chrono_tz::UTC, 8);
        // 2024-03-04 为周一
        let w = window(utc(2024, 3, 4, 10, 0), 60);
        assert!(AvailabilityCore::evaluate(&t, &w, &[], None).is_available());
    }

    #[test]
    fn test_non_working_day_rejected() {
        let t = teacher(chrono_tz::UTC, 8);
        let w = window(utc(2024, 3, 9, 10, 0), 60);
        assert_eq!(
            AvailabilityCore::evaluate(&t, &w, &[], None),
            AvailabilityVerdict::Unavailable(Unavailability::NotAWorkingDay {
                day: "Sat".to_string()
            })
        );
    }

    #[test]
    fn test_window_converted_to_teacher_timezone() {
        // 上海 09:00-18:00 = UTC 01:00-10:00
        let t = teacher(chrono_tz::Asia::Shanghai, 8);
        assert!(AvailabilityCore::evaluate(&t, &window(utc(2024, 3, 4, 1, 0), 60), &[], None)
            .is_available());
        assert_eq!(
            AvailabilityCore::evaluate(&t, &window(utc(2024, 3, 4, 9, 30), 60), &[], None),
            AvailabilityVerdict::Unavailable(Unavailability::OutsideWorkingHours)
        );
    }

    #[test]
    fn test_window_crossing_local_midnight_rejected() {
        let mut t = teacher(chrono_tz::UTC, 8);
        t.work_hours = WorkHours::uniform(WorkInterval::new(hm(0, 0), hm(23, 59)).unwrap());
        let w = window(utc(2024, 3, 4, 23, 30), 60);
        assert_eq!(
            AvailabilityCore::evaluate(&t, &w, &[], None),
            AvailabilityVerdict::Unavailable(Unavailability::SpansMultipleDays)
        );
    }

    #[test]
    fn test_overlap_uses_strict_bounds() {
        let t = teacher(chrono_tz::UTC, 8);
        let booked = vec![class(1, utc(2024, 3, 4, 10, 0), 60)];

        // 首尾相接不算重叠
        assert!(AvailabilityCore::evaluate(&t, &window(utc(2024, 3, 4, 11, 0), 60), &booked, None)
            .is_available());
        assert_eq!(
            AvailabilityCore::evaluate(&t, &window(utc(2024, 3, 4, 10, 30), 60), &booked, None),
            AvailabilityVerdict::Unavailable(Unavailability::OverlapsBookedClass { class_id: 1 })
        );
        // 排除自身后可用
        assert!(AvailabilityCore::evaluate(
            &t,
            &window(utc(2024, 3, 4, 10, 30), 60),
            &booked,
            Some(1)
        )
        .is_available());
    }

    #[test]
    fn test_cancelled_classes_do_not_block() {
        let t = teacher(chrono_tz::UTC, 1);
        let mut c = class(1, utc(2024, 3, 4, 10, 0), 60);
        c.status = ClassStatus::Cancelled;
        assert!(AvailabilityCore::evaluate(&t, &window(utc(2024, 3, 4, 10, 0), 60), &[c], None)
            .is_available());
    }

    #[test]
    fn test_daily_limit() {
        let t = teacher(chrono_tz::UTC, 8);
        let booked: Vec<ScheduledClass> = (0..8)
            .map(|i| class(i, utc(2024, 3, 4, 9, 0) + Duration::minutes(45 * i), 30))
            .collect();
        assert_eq!(
            AvailabilityCore::evaluate(&t, &window(utc(2024, 3, 4, 17, 0), 30), &booked, None),
            AvailabilityVerdict::Unavailable(Unavailability::DailyLimitReached { booked: 8, max: 8 })
        );
        // 移动当日已有课次不增加计数
        assert!(AvailabilityCore::evaluate(
            &t,
            &window(utc(2024, 3, 4, 17, 0), 30),
            &booked,
            Some(3)
        )
        .is_available());
    }

    #[test]
    fn test_non_overlapping_bookings_are_independent() {
        let t = teacher(chrono_tz::UTC, 8);
        for (a_start, b_start) in [((9, 0), (10, 0)), ((9, 0), (13, 30)), ((16, 0), (9, 15))] {
            let a = window(utc(2024, 3, 5, a_start.0, a_start.1), 60);
            let b = window(utc(2024, 3, 5, b_start.0, b_start.1), 45);
            assert!(!a.overlaps(b.start(), b.end()));

            assert!(AvailabilityCore::evaluate(&t, &a, &[], None).is_available());
            assert!(AvailabilityCore::evaluate(&t, &b, &[], None).is_available());

            let booked_a = vec![class(1, a.start(), a.duration().num_minutes())];
            assert!(AvailabilityCore::evaluate(&t, &b, &booked_a, None).is_available());
        }
    }

    #[test]
    fn test_inactive_teacher_checked_first() {
        let mut t = teacher(chrono_tz::UTC, 8);
        t.active = false;
        assert_eq!(
            AvailabilityCore::evaluate(&t, &window(utc(2024, 3, 9, 3, 0), 60), &[], None),
            AvailabilityVerdict::Unavailable(Unavailability::TeacherInactive)
        );
    }

    #[test]
    fn test_dst_gap_start_shifted_forward() {
        // 纽约 2024-03-10 02:00 不存在，顺延至 03:00 EDT = 07:00 UTC
        let resolved = AvailabilityCore::resolve_local(
            chrono_tz::America::New_York,
            NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            hm(2, 0),
            false,
        );
        assert_eq!(resolved, utc(2024, 3, 10, 7, 0));
    }

    #[test]
    fn test_dst_ambiguous_end_takes_latest() {
        // 纽约 2024-11-03 01:30 出现两次: 05:30 UTC (EDT) 与 06:30 UTC (EST)
        let date = NaiveDate::from_ymd_opt(2024, 11, 3).unwrap();
        let tz = chrono_tz::America::New_York;
        assert_eq!(
            AvailabilityCore::resolve_local(tz, date, hm(1, 30), false),
            utc(2024, 11, 3, 5, 30)
        );
        assert_eq!(
            AvailabilityCore::resolve_local(tz, date, hm(1, 30), true),
            utc(2024, 11, 3, 6, 30)
        );
    }
}
