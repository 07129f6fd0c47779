// ==========================================
// 教务排课核心 - 调度 API
// ==========================================
// 职责: 权限检查 → DTO 解析 → 调用引擎 → 转换响应
// 入口: reschedule / teacher-binding / exam-assignment
// ==========================================

use std::sync::Arc;

use crate::api::auth::CallerIdentity;
use crate::api::dto::{
    AssignExamRequestDto, BindingRequestDto, BindingResponse, ExamAssignmentResponse,
    RescheduleRequestDto, RescheduleResponse, ReviewRequestDto,
};
use crate::api::error::{ApiError, ApiResult};
use crate::config::SchedulingConfigReader;
use crate::engine::{BindingRegistry, EngineError, ExamAssignmentMachine, RescheduleEngine};
use crate::perf::PerfGuard;
use crate::repository::SchedulingStore;

// ==========================================
// SchedulingApi
// ==========================================

/// 调度 API，供 HTTP handler 调用
///
/// 调用方身份已由上游完成验签；本层只做角色放行。
pub struct SchedulingApi<S, C>
where
    S: SchedulingStore,
    C: SchedulingConfigReader,
{
    reschedule_engine: RescheduleEngine<S, C>,
    binding_registry: BindingRegistry<S, C>,
    exam_machine: ExamAssignmentMachine<S>,
    config: Arc<C>,
}

impl<S, C> SchedulingApi<S, C>
where
    S: SchedulingStore,
    C: SchedulingConfigReader,
{
    pub fn new(store: Arc<S>, config: Arc<C>) -> Self {
        Self {
            reschedule_engine: RescheduleEngine::new(store.clone(), config.clone()),
            binding_registry: BindingRegistry::new(store.clone(), config.clone()),
            exam_machine: ExamAssignmentMachine::new(store),
            config,
        }
    }

    /// 调课
    ///
    /// # 返回
    /// - Ok(RescheduleResponse): 已提交的调课记录
    /// - Err(ApiError): Forbidden / InvalidInput / Policy / Conflict 等
    pub async fn reschedule(
        &self,
        caller: &CallerIdentity,
        dto: RescheduleRequestDto,
    ) -> ApiResult<RescheduleResponse> {
        let _perf = PerfGuard::new("reschedule");

        let class = self.reschedule_engine.get_class(dto.class_id)?;
        caller.authorize_reschedule(&class)?;

        // 请求自带时区时不读配置
        let default_timezone = match dto.timezone {
            Some(_) => chrono_tz::UTC,
            None => self
                .config
                .get_default_timezone()
                .await
                .map_err(EngineError::from)?,
        };
        let request = dto.into_request(caller.audit_tag(), default_timezone)?;
        let record = self.reschedule_engine.reschedule(request).await?;
        Ok(RescheduleResponse::from(record))
    }

    /// 课次调课历史
    pub fn reschedule_history(
        &self,
        caller: &CallerIdentity,
        class_id: i64,
    ) -> ApiResult<Vec<RescheduleResponse>> {
        let class = self.reschedule_engine.get_class(class_id)?;
        caller.authorize_reschedule(&class)?;

        Ok(self
            .reschedule_engine
            .history(class_id)?
            .into_iter()
            .map(RescheduleResponse::from)
            .collect())
    }

    /// 绑定教师与学生
    pub async fn bind_teacher(
        &self,
        caller: &CallerIdentity,
        dto: BindingRequestDto,
    ) -> ApiResult<BindingResponse> {
        let _perf = PerfGuard::new("bind_teacher");
        caller.authorize_binding()?;

        let outcome = self
            .binding_registry
            .bind(dto.teacher_id, dto.student_id)
            .await?;
        Ok(BindingResponse::from(outcome))
    }

    /// 解绑教师与学生
    pub fn unbind_teacher(
        &self,
        caller: &CallerIdentity,
        dto: BindingRequestDto,
    ) -> ApiResult<BindingResponse> {
        let _perf = PerfGuard::new("unbind_teacher");
        caller.authorize_binding()?;

        let binding = self
            .binding_registry
            .unbind(dto.teacher_id, dto.student_id)?;
        Ok(BindingResponse::from(binding))
    }

    /// 委派试卷
    pub fn assign_exam(
        &self,
        caller: &CallerIdentity,
        dto: AssignExamRequestDto,
    ) -> ApiResult<ExamAssignmentResponse> {
        let _perf = PerfGuard::new("assign_exam");
        caller.authorize_exam_management()?;

        let assignment = self.exam_machine.assign(dto.exam_id, dto.teacher_id)?;
        Ok(ExamAssignmentResponse::from(assignment))
    }

    /// 教师完成试卷
    pub fn complete_exam_assignment(
        &self,
        caller: &CallerIdentity,
        assignment_id: &str,
    ) -> ApiResult<ExamAssignmentResponse> {
        let _perf = PerfGuard::new("complete_exam_assignment");
        if assignment_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("委派ID不能为空".to_string()));
        }

        let assignment = self.exam_machine.get(assignment_id)?;
        caller.authorize_exam_completion(&assignment)?;

        let assignment = self.exam_machine.complete(assignment_id)?;
        Ok(ExamAssignmentResponse::from(assignment))
    }

    /// 评审试卷
    pub fn review_exam_assignment(
        &self,
        caller: &CallerIdentity,
        assignment_id: &str,
        dto: ReviewRequestDto,
    ) -> ApiResult<ExamAssignmentResponse> {
        let _perf = PerfGuard::new("review_exam_assignment");
        caller.authorize_exam_management()?;

        let assignment =
            self.exam_machine
                .review(assignment_id, dto.decision, dto.review_notes)?;
        Ok(ExamAssignmentResponse::from(assignment))
    }
}
