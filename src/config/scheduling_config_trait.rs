// ==========================================
// 教务排课核心 - 排课配置读取 Trait
// ==========================================
// 职责: 定义引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::BindingPolicy;
use async_trait::async_trait;
use chrono_tz::Tz;
use thiserror::Error;

/// 配置读取错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置读取失败: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("配置锁获取失败: {0}")]
    Lock(String),

    #[error("配置表初始化失败: {0}")]
    Schema(String),

    #[error("配置序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// ==========================================
// SchedulingConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）/ StaticConfig（固定值）
#[async_trait]
pub trait SchedulingConfigReader: Send + Sync {
    /// 师生对解绑后再绑定的处理策略
    ///
    /// # 默认值
    /// - REVIVE_ON_REBIND
    async fn get_binding_policy(&self) -> ConfigResult<BindingPolicy>;

    /// 调课遇到 revision 冲突时的重试次数
    ///
    /// # 默认值
    /// - 1（取值范围 0..=3）
    async fn get_conflict_retry_limit(&self) -> ConfigResult<u32>;

    /// 课次最短时长（分钟）
    ///
    /// # 默认值
    /// - 15
    async fn get_min_class_minutes(&self) -> ConfigResult<i64>;

    /// 课次最长时长（分钟）
    ///
    /// # 默认值
    /// - 240
    async fn get_max_class_minutes(&self) -> ConfigResult<i64>;

    /// 请求未携带时区时使用的默认时区
    ///
    /// # 默认值
    /// - UTC
    async fn get_default_timezone(&self) -> ConfigResult<Tz>;
}
