// ==========================================
// 教务排课核心 - 试卷与试卷委派领域模型
// ==========================================
// 依据: 4.5 试卷委派状态机
// 状态: Assigned → Completed → Approved | Rejected (终态)
// 红线: 字段只能经由状态迁移修改
// ==========================================

use crate::domain::types::{AssignmentStatus, ExamAction, ExamStatus, ReviewDecision};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Exam - 试卷
// ==========================================
// status/assigned_to/completed_at/reviewed_at/review_notes 为最近一次委派的镜像
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exam {
    pub exam_id: i64,
    pub title: String,
    pub status: ExamStatus,
    pub assigned_to: Option<i64>,
    pub completed_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
}

impl Exam {
    pub fn new(exam_id: i64, title: impl Into<String>) -> Self {
        Self {
            exam_id,
            title: title.into(),
            status: ExamStatus::Unassigned,
            assigned_to: None,
            completed_at: None,
            reviewed_at: None,
            review_notes: None,
        }
    }
}

// ==========================================
// AssignmentState - 委派状态（携带各阶段时间戳）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AssignmentState {
    Assigned {
        assigned_at: DateTime<Utc>,
    },
    Completed {
        assigned_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    Approved {
        assigned_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        reviewed_at: DateTime<Utc>,
        review_notes: Option<String>,
    },
    Rejected {
        assigned_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        reviewed_at: DateTime<Utc>,
        review_notes: Option<String>,
    },
}

/// 非法迁移
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRejected {
    pub from: AssignmentStatus,
    pub action: ExamAction,
}

impl AssignmentState {
    pub fn status(&self) -> AssignmentStatus {
        match self {
            AssignmentState::Assigned { .. } => AssignmentStatus::Assigned,
            AssignmentState::Completed { .. } => AssignmentStatus::Completed,
            AssignmentState::Approved { .. } => AssignmentStatus::Approved,
            AssignmentState::Rejected { .. } => AssignmentStatus::Rejected,
        }
    }

    pub fn assigned_at(&self) -> DateTime<Utc> {
        match self {
            AssignmentState::Assigned { assigned_at }
            | AssignmentState::Completed { assigned_at, .. }
            | AssignmentState::Approved { assigned_at, .. }
            | AssignmentState::Rejected { assigned_at, .. } => *assigned_at,
        }
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            AssignmentState::Assigned { .. } => None,
            AssignmentState::Completed { completed_at, .. }
            | AssignmentState::Approved { completed_at, .. }
            | AssignmentState::Rejected { completed_at, .. } => Some(*completed_at),
        }
    }

    pub fn reviewed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            AssignmentState::Approved { reviewed_at, .. }
            | AssignmentState::Rejected { reviewed_at, .. } => Some(*reviewed_at),
            _ => None,
        }
    }

    pub fn review_notes(&self) -> Option<&str> {
        match self {
            AssignmentState::Approved { review_notes, .. }
            | AssignmentState::Rejected { review_notes, .. } => review_notes.as_deref(),
            _ => None,
        }
    }

    /// assigned → completed
    pub fn complete(&self, now: DateTime<Utc>) -> Result<AssignmentState, TransitionRejected> {
        match self {
            AssignmentState::Assigned { assigned_at } => Ok(AssignmentState::Completed {
                assigned_at: *assigned_at,
                completed_at: now,
            }),
            other => Err(TransitionRejected {
                from: other.status(),
                action: ExamAction::Complete,
            }),
        }
    }

    /// completed → approved | rejected
    pub fn review(
        &self,
        decision: ReviewDecision,
        review_notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<AssignmentState, TransitionRejected> {
        match self {
            AssignmentState::Completed {
                assigned_at,
                completed_at,
            } => Ok(match decision {
                ReviewDecision::Approved => AssignmentState::Approved {
                    assigned_at: *assigned_at,
                    completed_at: *completed_at,
                    reviewed_at: now,
                    review_notes,
                },
                ReviewDecision::Rejected => AssignmentState::Rejected {
                    assigned_at: *assigned_at,
                    completed_at: *completed_at,
                    reviewed_at: now,
                    review_notes,
                },
            }),
            other => Err(TransitionRejected {
                from: other.status(),
                action: ExamAction::Review,
            }),
        }
    }

    /// 由存储列还原状态；列组合不一致时返回 None
    pub fn from_columns(
        status: AssignmentStatus,
        assigned_at: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
        reviewed_at: Option<DateTime<Utc>>,
        review_notes: Option<String>,
    ) -> Option<Self> {
        match (status, completed_at, reviewed_at) {
            (AssignmentStatus::Assigned, None, None) => {
                Some(AssignmentState::Assigned { assigned_at })
            }
            (AssignmentStatus::Completed, Some(completed_at), None) => {
                Some(AssignmentState::Completed {
                    assigned_at,
                    completed_at,
                })
            }
            (AssignmentStatus::Approved, Some(completed_at), Some(reviewed_at)) => {
                Some(AssignmentState::Approved {
                    assigned_at,
                    completed_at,
                    reviewed_at,
                    review_notes,
                })
            }
            (AssignmentStatus::Rejected, Some(completed_at), Some(reviewed_at)) => {
                Some(AssignmentState::Rejected {
                    assigned_at,
                    completed_at,
                    reviewed_at,
                    review_notes,
                })
            }
            _ => None,
        }
    }
}

// ==========================================
// ExamAssignment - 试卷委派
// ==========================================
// 对齐: exam_assignments 表, UNIQUE(exam_id, teacher_id)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamAssignment {
    pub assignment_id: String,
    pub exam_id: i64,
    pub teacher_id: i64,
    pub state: AssignmentState,
}

impl ExamAssignment {
    pub fn new(exam_id: i64, teacher_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            assignment_id: uuid::Uuid::new_v4().to_string(),
            exam_id,
            teacher_id,
            state: AssignmentState::Assigned { assigned_at: now },
        }
    }

    pub fn status(&self) -> AssignmentStatus {
        self.state.status()
    }
}
