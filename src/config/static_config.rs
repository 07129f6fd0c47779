// ==========================================
// 教务排课核心 - 固定配置
// ==========================================
// 用途: 测试 / 嵌入式场景，不依赖 config_kv 表
// ==========================================

use crate::config::scheduling_config_trait::{ConfigResult, SchedulingConfigReader};
use crate::domain::BindingPolicy;
use async_trait::async_trait;
use chrono_tz::Tz;

#[derive(Debug, Clone, PartialEq)]
pub struct StaticConfig {
    pub binding_policy: BindingPolicy,
    pub conflict_retry_limit: u32,
    pub min_class_minutes: i64,
    pub max_class_minutes: i64,
    pub default_timezone: Tz,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            binding_policy: BindingPolicy::ReviveOnRebind,
            conflict_retry_limit: 1,
            min_class_minutes: 15,
            max_class_minutes: 240,
            default_timezone: chrono_tz::UTC,
        }
    }
}

impl StaticConfig {
    pub fn with_binding_policy(mut self, policy: BindingPolicy) -> Self {
        self.binding_policy = policy;
        self
    }

    pub fn with_conflict_retry_limit(mut self, limit: u32) -> Self {
        self.conflict_retry_limit = limit;
        self
    }
}

#[async_trait]
impl SchedulingConfigReader for StaticConfig {
    async fn get_binding_policy(&self) -> ConfigResult<BindingPolicy> {
        Ok(self.binding_policy)
    }

    async fn get_conflict_retry_limit(&self) -> ConfigResult<u32> {
        Ok(self.conflict_retry_limit)
    }

    async fn get_min_class_minutes(&self) -> ConfigResult<i64> {
        Ok(self.min_class_minutes)
    }

    async fn get_max_class_minutes(&self) -> ConfigResult<i64> {
        Ok(self.max_class_minutes)
    }

    async fn get_default_timezone(&self) -> ConfigResult<Tz> {
        Ok(self.default_timezone)
    }
}
