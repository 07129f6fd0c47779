// ==========================================
// 试卷委派状态机集成测试
// ==========================================
// 测试目标: 状态迁移、exams 表镜像、非法迁移拒绝
// ==========================================


#[cfg(test)]
mod exam_assignment_test {
    use academy_scheduler::domain::{AssignmentStatus, ExamAction, ExamStatus, ReviewDecision};
    use academy_scheduler::engine::{ExamAssignmentMachine, PolicyViolation};
    use academy_scheduler::repository::{DirectoryReader, SchedulingStore, SqliteSchedulingStore};
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    use crate::test_helpers::{create_test_db, open_store, seed_standard};

    fn setup() -> (
        NamedTempFile,
        Arc<SqliteSchedulingStore>,
        ExamAssignmentMachine<SqliteSchedulingStore>,
    ) {
        let (temp_file, db_path) = create_test_db().unwrap();
        let store = open_store(&db_path);
        seed_standard(&store).unwrap();
        let machine = ExamAssignmentMachine::new(store.clone());
        (temp_file, store, machine)
    }

    fn exam_status(store: &SqliteSchedulingStore) -> ExamStatus {
        store
            .transaction(|tx| tx.find_exam(1))
            .unwrap()
            .unwrap()
            .status
    }

    #[test]
    fn test_assign_complete_reject_lifecycle() {
        let (_tmp, store, machine) = setup();

        let assigned = machine.assign(1, 5).unwrap();
        assert_eq!(assigned.status(), AssignmentStatus::Assigned);
        assert_eq!(exam_status(&store), ExamStatus::Assigned);

        let completed = machine.complete(&assigned.assignment_id).unwrap();
        assert!(completed.state.completed_at().is_some());
        assert_eq!(exam_status(&store), ExamStatus::Completed);

        let reviewed = machine
            .review(
                &assigned.assignment_id,
                ReviewDecision::Rejected,
                Some("  第三题步骤缺失  ".to_string()),
            )
            .unwrap();
        assert_eq!(reviewed.status(), AssignmentStatus::Rejected);
        assert_eq!(reviewed.state.review_notes(), Some("第三题步骤缺失"));

        let exam = store.transaction(|tx| tx.find_exam(1)).unwrap().unwrap();
        assert_eq!(exam.status, ExamStatus::Rejected);
        assert_eq!(exam.assigned_to, Some(5));
        assert!(exam.reviewed_at.is_some());

        // 重新读取与返回值一致
        let reloaded = machine.get(&assigned.assignment_id).unwrap();
        assert_eq!(reloaded, reviewed);
    }

    #[test]
    fn test_review_before_complete_is_invalid() {
        let (_tmp, store, machine) = setup();
        let assigned = machine.assign(1, 5).unwrap();

        let err = machine
            .review(&assigned.assignment_id, ReviewDecision::Approved, None)
            .unwrap_err();
        assert!(matches!(
            err.policy(),
            Some(PolicyViolation::InvalidTransition {
                from: AssignmentStatus::Assigned,
                action: ExamAction::Review,
                ..
            })
        ));
        assert_eq!(exam_status(&store), ExamStatus::Assigned);
    }

    #[test]
    fn test_double_complete_is_invalid() {
        let (_tmp, _store, machine) = setup();
        let assigned = machine.assign(1, 5).unwrap();
        machine.complete(&assigned.assignment_id).unwrap();

        let err = machine.complete(&assigned.assignment_id).unwrap_err();
        assert_eq!(err.policy().map(|v| v.reason_code()), Some("INVALID_TRANSITION"));
    }

    #[test]
    fn test_terminal_state_rejects_everything() {
        let (_tmp, _store, machine) = setup();
        let assigned = machine.assign(1, 5).unwrap();
        machine.complete(&assigned.assignment_id).unwrap();
        machine
            .review(&assigned.assignment_id, ReviewDecision::Approved, None)
            .unwrap();

        assert!(machine.complete(&assigned.assignment_id).is_err());
        assert!(machine
            .review(&assigned.assignment_id, ReviewDecision::Rejected, None)
            .is_err());
    }

    #[test]
    fn test_same_exam_to_same_teacher_twice_is_duplicate() {
        let (_tmp, _store, machine) = setup();
        machine.assign(1, 5).unwrap();
        let err = machine.assign(1, 5).unwrap_err();
        assert_eq!(
            err.policy(),
            Some(&PolicyViolation::DuplicateAssignment {
                exam_id: 1,
                teacher_id: 5
            })
        );

        // 同一试卷可委派给另一位教师
        let other = machine.assign(1, 6).unwrap();
        assert_eq!(other.teacher_id, 6);
    }
}
