// ==========================================
// 教务排课核心 - 师生绑定领域模型
// ==========================================
// 对齐: teacher_students 表, UNIQUE(teacher_id, student_id)
// 解绑为软删除 (active=false)，历史记录保留用于审计
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherStudentBinding {
    pub binding_id: String,
    pub teacher_id: i64,
    pub student_id: i64,
    pub active: bool,
    pub bound_at: DateTime<Utc>,
    pub unbound_at: Option<DateTime<Utc>>,
}

impl TeacherStudentBinding {
    pub fn new(teacher_id: i64, student_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            binding_id: uuid::Uuid::new_v4().to_string(),
            teacher_id,
            student_id,
            active: true,
            bound_at: now,
            unbound_at: None,
        }
    }
}
