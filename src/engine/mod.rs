// ==========================================
// 生产批次追踪系统 - 引擎层
// ==========================================
// 职责: 批次分发、成品派生与下推、评价镜像
// 红线: Engine 不拼 SQL，所有多语句写入各自一个事务
// ==========================================

pub mod error;
pub mod fan_out;
pub mod finished_product;
pub mod quality_shadow;

// 重导出核心引擎
pub use error::{EngineError, EngineResult};
pub use fan_out::{
    CascadeDeleteReport, CreateSingleOperationRequest, FanOutReport, OperationFanOutEngine,
    SingleOperationOutcome,
};
pub use finished_product::{
    CreateFinishedProductRequest, FinishedProductPatch, FinishedProductTracker, SyncOutcome,
};
pub use quality_shadow::{
    CreateQualityEvaluationRequest, QualityEvaluationPatch, QualityEvaluationShadow,
};
