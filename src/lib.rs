// ==========================================
// 生产批次追踪系统 - 核心库
// ==========================================
// 范围: 原料批次 → 机台操作记录 → 成品产出 → 质量评价
// 技术栈: Rust + SQLite
// 核心: 批次分发（fan-out）与成品 → 评价百分比单向同步
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 分发与同步规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// SQL 性能统计
pub mod perf;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组件装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{BatchState, MachineStatus, OrphanPolicy};

// 领域实体
pub use domain::{
    ActionLog, ActionType, CategoryWeights, FinishedProductRecord, Machine, MaterialBatch,
    OperationRecord, QualityEvaluationRecord, YieldPercentages,
};

// 引擎
pub use engine::{
    EngineError, FinishedProductTracker, OperationFanOutEngine, QualityEvaluationShadow,
};

// API
pub use api::{ApiError, MasterDataApi, ProductionApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "生产批次追踪系统";
