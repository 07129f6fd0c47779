// ==========================================
// 教务排课核心 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 调课 / 师生绑定 / 试卷委派的规则核心，由 HTTP 宿主调用
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/schema）
pub mod db;

// 日志系统
pub mod logging;

// SQL 性能统计
pub mod perf;

// API 层 - 业务接口
pub mod api;

// 应用层 - 进程装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    AssignmentStatus, BindingPolicy, ClassStatus, ExamAction, ExamStatus, ReviewDecision,
    TeacherChange,
};

// 领域实体
pub use domain::{
    Exam, ExamAssignment, NewSlot, Package, RescheduledClass, ScheduledClass, Student, Teacher,
    TeacherStudentBinding, TimeWindow,
};

// 引擎
pub use engine::{
    AvailabilityCalculator, BindingRegistry, EngineError, ExamAssignmentMachine,
    PackageEntitlementChecker, PolicyViolation, RescheduleEngine, RescheduleRequest,
};

// API
pub use api::{ApiError, CallerIdentity, SchedulingApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "教务排课核心";
