// ==========================================
// 教务排课核心 - 教师领域模型
// ==========================================
// 依据: 3. 数据模型 - Teacher
// 说明: 工作日/工作时段均以教师本人时区的墙钟时间表示
// ==========================================

use chrono::{NaiveTime, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

// ==========================================
// WorkInterval - 单日工作时段
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkInterval {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl WorkInterval {
    /// 创建工作时段（start 必须早于 end）
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, String> {
        let interval = Self { start, end };
        if !interval.is_ordered() {
            return Err(format!("工作时段无效: start={} end={}", start, end));
        }
        Ok(interval)
    }

    pub fn is_ordered(&self) -> bool {
        self.start < self.end
    }
}

/// 某个工作日的专属时段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayHours {
    pub day: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

// ==========================================
// WorkHours - 工作时段表
// ==========================================
// 存储: teachers.work_hours_json
// default 适用于所有工作日，per_day 覆盖个别工作日
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkHours {
    pub default: WorkInterval,
    #[serde(default)]
    pub per_day: Vec<DayHours>,
}

impl WorkHours {
    pub fn uniform(interval: WorkInterval) -> Self {
        Self {
            default: interval,
            per_day: Vec::new(),
        }
    }

    /// 覆盖某个工作日的时段
    pub fn with_day(mut self, day: Weekday, interval: WorkInterval) -> Self {
        self.per_day.retain(|d| d.day != day);
        self.per_day.push(DayHours {
            day,
            start: interval.start,
            end: interval.end,
        });
        self
    }

    /// 某工作日生效的时段（不判断该日是否为工作日）
    pub fn interval_for(&self, day: Weekday) -> WorkInterval {
        self.per_day
            .iter()
            .find(|d| d.day == day)
            .map(|d| WorkInterval {
                start: d.start,
                end: d.end,
            })
            .unwrap_or(self.default)
    }
}

// ==========================================
// Teacher - 教师
// ==========================================
// 红线: active=false 的教师不能新增绑定，也不能承接调课
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Teacher {
    pub teacher_id: i64,
    pub name: String,
    pub working_days: Vec<Weekday>,
    pub work_hours: WorkHours,
    pub max_students_per_day: u32,
    pub active: bool,
    pub is_coordinator: bool,
    pub timezone: Tz,
}

impl Teacher {
    pub fn works_on(&self, day: Weekday) -> bool {
        self.working_days.contains(&day)
    }

    /// 工作日的生效时段；非工作日返回 None
    pub fn hours_on(&self, day: Weekday) -> Option<WorkInterval> {
        if self.works_on(day) {
            Some(self.work_hours.interval_for(day))
        } else {
            None
        }
    }

    /// 校验教师数据的不变量
    ///
    /// # 规则
    /// - 每个工作日的时段必须 start < end
    /// - 工作日不重复
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = Vec::with_capacity(self.working_days.len());
        for day in &self.working_days {
            if seen.contains(day) {
                return Err(format!("teacher_id={} 工作日重复: {}", self.teacher_id, day));
            }
            seen.push(*day);

            let interval = self.work_hours.interval_for(*day);
            if !interval.is_ordered() {
                return Err(format!(
                    "teacher_id={} {} 工作时段无效: {}-{}",
                    self.teacher_id, day, interval.start, interval.end
                ));
            }
        }
        Ok(())
    }
}

/// 解析工作日列表（"Mon,Tue,Wed" 或 "monday, friday"）
pub fn parse_working_days(raw: &str) -> Result<Vec<Weekday>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Weekday>()
                .map_err(|_| format!("无法识别的工作日: {}", s))
        })
        .collect()
}

/// 工作日列表转为存储格式
pub fn format_working_days(days: &[Weekday]) -> String {
    days.iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
