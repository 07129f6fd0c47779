// ==========================================
// 师生绑定登记集成测试
// ==========================================
// 测试目标: 两种 BindingPolicy 下的绑定 / 解绑 / 再绑定行为
// ==========================================


#[cfg(test)]
mod binding_registry_test {
    use academy_scheduler::config::{config_keys, ConfigManager};
    use academy_scheduler::engine::{BindingRegistry, EngineError, PolicyViolation};
    use academy_scheduler::repository::{BindingLedger, SchedulingStore, SqliteSchedulingStore};
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    use crate::test_helpers::{create_test_db, open_config, open_store, seed_standard};

    fn setup(
        policy: &str,
    ) -> (
        NamedTempFile,
        Arc<SqliteSchedulingStore>,
        BindingRegistry<SqliteSchedulingStore, ConfigManager>,
    ) {
        let (temp_file, db_path) = create_test_db().unwrap();
        let store = open_store(&db_path);
        seed_standard(&store).unwrap();
        let config = open_config(&db_path);
        config
            .set_global_value(config_keys::BINDING_POLICY, policy)
            .unwrap();
        let registry = BindingRegistry::new(store.clone(), config);
        (temp_file, store, registry)
    }

    #[tokio::test]
    async fn test_double_bind_is_duplicate() {
        let (_tmp, _store, registry) = setup("REVIVE_ON_REBIND");
        registry.bind(5, 9).await.unwrap();

        let err = registry.bind(5, 9).await.unwrap_err();
        assert_eq!(
            err.policy(),
            Some(&PolicyViolation::DuplicateBinding {
                teacher_id: 5,
                student_id: 9
            })
        );
        assert_eq!(registry.current_teacher_of(9).unwrap(), Some(5));
    }

    #[tokio::test]
    async fn test_revive_on_rebind_reuses_record() {
        let (_tmp, store, registry) = setup("REVIVE_ON_REBIND");
        let first = registry.bind(5, 9).await.unwrap();
        let unbound = registry.unbind(5, 9).unwrap();
        assert!(!unbound.active);
        assert!(unbound.unbound_at.is_some());
        assert_eq!(registry.current_teacher_of(9).unwrap(), None);

        let revived = registry.bind(5, 9).await.unwrap();
        assert_eq!(revived.binding.binding_id, first.binding.binding_id);
        assert!(revived.binding.active);

        let stored = store
            .transaction(|tx| tx.find_binding(5, 9))
            .unwrap()
            .unwrap();
        assert!(stored.active);
        assert_eq!(stored.unbound_at, None);
    }

    #[tokio::test]
    async fn test_permanent_pair_refuses_rebind() {
        let (_tmp, store, registry) = setup("PERMANENT_PAIR");
        registry.bind(5, 9).await.unwrap();
        registry.unbind(5, 9).unwrap();

        let err = registry.bind(5, 9).await.unwrap_err();
        assert_eq!(
            err.policy(),
            Some(&PolicyViolation::BindingRetired {
                teacher_id: 5,
                student_id: 9
            })
        );

        // 历史记录保留
        let stored = store
            .transaction(|tx| tx.find_binding(5, 9))
            .unwrap()
            .unwrap();
        assert!(!stored.active);

        // 该学生仍可绑定其他教师
        registry.bind(6, 9).await.unwrap();
        assert_eq!(registry.current_teacher_of(9).unwrap(), Some(6));
    }

    #[tokio::test]
    async fn test_binding_elsewhere_keeps_one_live_binding() {
        let (_tmp, store, registry) = setup("REVIVE_ON_REBIND");
        registry.bind(5, 9).await.unwrap();
        let outcome = registry.bind(6, 9).await.unwrap();

        assert_eq!(outcome.superseded.map(|b| b.teacher_id), Some(5));
        let live = store
            .transaction(|tx| tx.find_live_binding_for_student(9))
            .unwrap()
            .unwrap();
        assert_eq!(live.teacher_id, 6);
        let old = store
            .transaction(|tx| tx.find_binding(5, 9))
            .unwrap()
            .unwrap();
        assert!(!old.active);
    }

    #[tokio::test]
    async fn test_unknown_student_is_not_found() {
        let (_tmp, _store, registry) = setup("REVIVE_ON_REBIND");
        assert!(matches!(
            registry.bind(5, 404).await,
            Err(EngineError::NotFound { .. })
        ));
    }
}
