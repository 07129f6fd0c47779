// ==========================================
// 教务排课核心 - 学生与课时包领域模型
// ==========================================
// 依据: 3. 数据模型 - Student / Package
// ==========================================

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

// ==========================================
// Student - 学生
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub student_id: i64,
    pub name: String,
    pub package_id: Option<i64>,
    /// 是否允许调课到当前教师以外的教师
    pub allow_different_teacher: bool,
    pub timezone: Tz,
}

impl Student {
    /// 某个时刻在学生本地时区对应的日期
    pub fn local_date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.timezone).date_naive()
    }
}

// ==========================================
// Package - 课时包
// ==========================================
// 红线: end_date >= start_date；已消耗课时不得超过总课时
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub package_id: i64,
    pub student_id: i64,
    pub name: String,
    pub total_classes: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Package {
    /// 有效期（闭区间）是否覆盖该日期
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.end_date < self.start_date {
            return Err(format!(
                "package_id={} 有效期无效: {} > {}",
                self.package_id, self.start_date, self.end_date
            ));
        }
        Ok(())
    }

    /// 有效期在指定时区下对应的绝对时间区间 [start, end)
    pub fn validity_instants(&self, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = local_midnight(tz, self.start_date);
        let next = self.end_date.succ_opt().unwrap_or(self.end_date);
        (start, local_midnight(tz, next))
    }
}

/// 本地日期零点对应的 UTC 时刻（零点不存在时取当日最早可表示时刻）
pub(crate) fn local_midnight(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(chrono::NaiveTime::MIN);
    match tz.from_local_datetime(&naive).earliest() {
        Some(dt) => dt.with_timezone(&Utc),
        None => tz
            .from_local_datetime(&(naive + chrono::Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&naive)),
    }
}
