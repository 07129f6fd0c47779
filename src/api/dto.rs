// ==========================================
// 教务排课核心 - API 数据传输对象
// ==========================================
// 约定: JSON 字段 camelCase，时间为 RFC 3339，时区为 IANA 名称
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::{
    AssignmentStatus, ExamAssignment, NewSlot, ReviewDecision, RescheduledClass, TeacherChange,
    TeacherStudentBinding, TimeWindow,
};
use crate::engine::{BindOutcome, RescheduleRequest};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

fn parse_instant(field: &str, raw: &str) -> ApiResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ApiError::InvalidInput(format!("{} 不是合法的 RFC 3339 时间: {}", field, e)))
}

fn parse_timezone(raw: &str) -> ApiResult<Tz> {
    raw.trim()
        .parse::<Tz>()
        .map_err(|e| ApiError::InvalidInput(format!("timezone 不是合法的 IANA 时区: {}", e)))
}

// ==========================================
// 调课
// ==========================================

/// POST reschedule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleRequestDto {
    pub class_id: i64,
    pub new_start: String,
    pub new_end: String,
    /// 缺省时使用配置 default_timezone
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub requested_teacher_id: Option<i64>,
    #[serde(default)]
    pub expected_revision: Option<i64>,
}

impl RescheduleRequestDto {
    pub fn into_request(
        self,
        requested_by: String,
        default_timezone: Tz,
    ) -> ApiResult<RescheduleRequest> {
        let timezone = match self.timezone.as_deref() {
            Some(raw) => parse_timezone(raw)?,
            None => default_timezone,
        };
        let start = parse_instant("newStart", &self.new_start)?;
        let end = parse_instant("newEnd", &self.new_end)?;
        let window = TimeWindow::new(start, end).map_err(ApiError::InvalidInput)?;
        Ok(RescheduleRequest {
            class_id: self.class_id,
            new_slot: NewSlot {
                window,
                timezone,
            },
            requested_teacher_id: self.requested_teacher_id,
            expected_revision: self.expected_revision,
            requested_by: Some(requested_by),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleResponse {
    pub reschedule_id: String,
    pub class_id: i64,
    pub old_teacher_id: i64,
    pub new_teacher_id: i64,
    pub teacher_change: TeacherChange,
    pub old_start: DateTime<Utc>,
    pub old_end: DateTime<Utc>,
    pub new_start: DateTime<Utc>,
    pub new_end: DateTime<Utc>,
    pub timezone: String,
    pub created_at: DateTime<Utc>,
}

impl From<RescheduledClass> for RescheduleResponse {
    fn from(r: RescheduledClass) -> Self {
        Self {
            reschedule_id: r.reschedule_id,
            class_id: r.class_id,
            old_teacher_id: r.old_teacher_id,
            new_teacher_id: r.new_teacher_id,
            teacher_change: r.teacher_change,
            old_start: r.old_start_time,
            old_end: r.old_end_time,
            new_start: r.new_start_time,
            new_end: r.new_end_time,
            timezone: r.timezone.name().to_string(),
            created_at: r.created_at,
        }
    }
}

// ==========================================
// 师生绑定
// ==========================================

/// POST / DELETE teacher-binding
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingRequestDto {
    pub teacher_id: i64,
    pub student_id: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingResponse {
    pub binding_id: String,
    pub teacher_id: i64,
    pub student_id: i64,
    pub active: bool,
    pub bound_at: DateTime<Utc>,
    pub unbound_at: Option<DateTime<Utc>>,
    /// 绑定时被替换的原教师
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superseded_teacher_id: Option<i64>,
}

impl From<TeacherStudentBinding> for BindingResponse {
    fn from(b: TeacherStudentBinding) -> Self {
        Self {
            binding_id: b.binding_id,
            teacher_id: b.teacher_id,
            student_id: b.student_id,
            active: b.active,
            bound_at: b.bound_at,
            unbound_at: b.unbound_at,
            superseded_teacher_id: None,
        }
    }
}

impl From<BindOutcome> for BindingResponse {
    fn from(outcome: BindOutcome) -> Self {
        Self {
            superseded_teacher_id: outcome.superseded.map(|b| b.teacher_id),
            ..Self::from(outcome.binding)
        }
    }
}

// ==========================================
// 试卷委派
// ==========================================

/// POST exam-assignment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignExamRequestDto {
    pub exam_id: i64,
    pub teacher_id: i64,
}

/// POST exam-assignment/{id}/review
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequestDto {
    pub decision: ReviewDecision,
    #[serde(default)]
    pub review_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamAssignmentResponse {
    pub assignment_id: String,
    pub exam_id: i64,
    pub teacher_id: i64,
    pub status: AssignmentStatus,
    pub assigned_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
}

impl From<ExamAssignment> for ExamAssignmentResponse {
    fn from(a: ExamAssignment) -> Self {
        Self {
            status: a.status(),
            assigned_at: a.state.assigned_at(),
            completed_at: a.state.completed_at(),
            reviewed_at: a.state.reviewed_at(),
            review_notes: a.state.review_notes().map(str::to_string),
            assignment_id: a.assignment_id,
            exam_id: a.exam_id,
            teacher_id: a.teacher_id,
        }
    }
}
