// ==========================================
// 教务排课核心 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供 HTTP handler 调用
// ==========================================

pub mod auth;
pub mod dto;
pub mod error;
pub mod scheduling_api;

// 重导出核心类型
pub use auth::{CallerIdentity, JwtClaims, Role};
pub use dto::{
    AssignExamRequestDto, BindingRequestDto, BindingResponse, ExamAssignmentResponse,
    RescheduleRequestDto, RescheduleResponse, ReviewRequestDto,
};
pub use error::{ApiError, ApiResult, ErrorBody};
pub use scheduling_api::SchedulingApi;
