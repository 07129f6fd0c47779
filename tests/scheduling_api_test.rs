// ==========================================
// SchedulingApi 集成测试
// ==========================================
// 测试目标: 角色放行、DTO 解析、错误码映射
// ==========================================


#[cfg(test)]
mod scheduling_api_test {
    use academy_scheduler::api::{
        ApiError, AssignExamRequestDto, BindingRequestDto, CallerIdentity, JwtClaims,
        RescheduleRequestDto, ReviewRequestDto, Role,
    };
    use academy_scheduler::app::AppState;
    use academy_scheduler::config::config_keys;
    use academy_scheduler::domain::{AssignmentStatus, ReviewDecision, TeacherChange};
    use tempfile::NamedTempFile;

    use crate::test_helpers::{create_test_db, seed_standard};

    fn setup() -> (NamedTempFile, AppState) {
        let (temp_file, db_path) = create_test_db().unwrap();
        let state = AppState::new(db_path).unwrap();
        seed_standard(&state.store).unwrap();
        (temp_file, state)
    }

    fn caller(id: i64, role: Role, is_coordinator: bool) -> CallerIdentity {
        CallerIdentity::from(JwtClaims {
            id,
            role,
            is_coordinator,
        })
    }

    fn reschedule_dto(class_id: i64, start: &str, end: &str) -> RescheduleRequestDto {
        RescheduleRequestDto {
            class_id,
            new_start: start.to_string(),
            new_end: end.to_string(),
            timezone: Some("UTC".to_string()),
            requested_teacher_id: None,
            expected_revision: None,
        }
    }

    #[tokio::test]
    async fn test_student_reschedules_own_class() {
        let (_tmp, state) = setup();
        let api = &state.scheduling_api;
        let student = caller(9, Role::Student, false);

        let response = api
            .reschedule(
                &student,
                reschedule_dto(100, "2024-03-05T09:00:00Z", "2024-03-05T10:00:00Z"),
            )
            .await
            .unwrap();
        assert_eq!(response.teacher_change, TeacherChange::SameTeacher);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["classId"], 100);
        assert_eq!(json["teacherChange"], "SAME_TEACHER");

        let history = api.reschedule_history(&student, 100).unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_timezone_falls_back_to_configured_default() {
        let (_tmp, state) = setup();
        state
            .config_manager
            .set_global_value(config_keys::DEFAULT_TIMEZONE, "Asia/Shanghai")
            .unwrap();

        let mut dto = reschedule_dto(100, "2024-03-05T09:00:00Z", "2024-03-05T10:00:00Z");
        dto.timezone = None;
        let response = state
            .scheduling_api
            .reschedule(&caller(1, Role::Admin, false), dto)
            .await
            .unwrap();
        assert_eq!(response.timezone, "Asia/Shanghai");

        // 显式时区优先于配置
        let explicit = reschedule_dto(100, "2024-03-06T09:00:00Z", "2024-03-06T10:00:00Z");
        let response = state
            .scheduling_api
            .reschedule(&caller(1, Role::Admin, false), explicit)
            .await
            .unwrap();
        assert_eq!(response.timezone, "UTC");
    }

    #[tokio::test]
    async fn test_other_student_forbidden() {
        let (_tmp, state) = setup();
        let err = state
            .scheduling_api
            .reschedule(
                &caller(10, Role::Student, false),
                reschedule_dto(100, "2024-03-05T09:00:00Z", "2024-03-05T10:00:00Z"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
        assert_eq!(err.http_status(), 403);
    }

    #[tokio::test]
    async fn test_policy_rejection_carries_reason_code() {
        let (_tmp, state) = setup();
        let mut dto = reschedule_dto(200, "2024-03-05T09:00:00Z", "2024-03-05T10:00:00Z");
        dto.requested_teacher_id = Some(6);

        let err = state
            .scheduling_api
            .reschedule(&caller(1, Role::Admin, false), dto)
            .await
            .unwrap_err();
        assert_eq!(err.reason_code(), "TEACHER_CHANGE_NOT_PERMITTED");
        assert_eq!(err.http_status(), 422);
        assert_eq!(err.body().code, "TEACHER_CHANGE_NOT_PERMITTED");
    }

    #[tokio::test]
    async fn test_malformed_times_are_invalid_input() {
        let (_tmp, state) = setup();
        let err = state
            .scheduling_api
            .reschedule(
                &caller(1, Role::Admin, false),
                reschedule_dto(100, "next tuesday", "2024-03-05T10:00:00Z"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.reason_code(), "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_binding_requires_coordinator() {
        let (_tmp, state) = setup();
        let api = &state.scheduling_api;
        let dto = BindingRequestDto {
            teacher_id: 5,
            student_id: 9,
        };

        let err = api
            .bind_teacher(&caller(5, Role::Teacher, false), dto.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));

        let coordinator = caller(6, Role::Teacher, true);
        let bound = api.bind_teacher(&coordinator, dto.clone()).await.unwrap();
        assert!(bound.active);

        let err = api.bind_teacher(&coordinator, dto.clone()).await.unwrap_err();
        assert_eq!(err.reason_code(), "DUPLICATE_BINDING");
        assert_eq!(err.http_status(), 409);

        let unbound = api.unbind_teacher(&coordinator, dto).unwrap();
        assert!(!unbound.active);
    }

    #[test]
    fn test_exam_flow_permissions() {
        let (_tmp, state) = setup();
        let api = &state.scheduling_api;
        let coordinator = caller(2, Role::Coordinator, false);
        let assigned_teacher = caller(5, Role::Teacher, false);
        let other_teacher = caller(6, Role::Teacher, false);

        let assignment = api
            .assign_exam(
                &coordinator,
                AssignExamRequestDto {
                    exam_id: 1,
                    teacher_id: 5,
                },
            )
            .unwrap();
        let id = assignment.assignment_id.clone();

        let err = api.complete_exam_assignment(&other_teacher, &id).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));

        let completed = api.complete_exam_assignment(&assigned_teacher, &id).unwrap();
        assert_eq!(completed.status, AssignmentStatus::Completed);

        let review = ReviewRequestDto {
            decision: ReviewDecision::Approved,
            review_notes: Some("批改认真".to_string()),
        };
        let err = api
            .review_exam_assignment(&assigned_teacher, &id, review.clone())
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));

        let approved = api.review_exam_assignment(&coordinator, &id, review).unwrap();
        assert_eq!(approved.status, AssignmentStatus::Approved);
        assert_eq!(approved.review_notes.as_deref(), Some("批改认真"));
    }
}
