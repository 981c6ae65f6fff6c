// ==========================================
// 生产批次追踪系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、派生规则
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod finished_product;
pub mod machine;
pub mod material_batch;
pub mod operation;
pub mod quality_evaluation;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use finished_product::{CategoryWeights, FinishedProductRecord, WeightPatch, YieldPercentages};
pub use machine::Machine;
pub use material_batch::{MaterialBatch, NewMaterialBatch};
pub use operation::{
    OperationPatch, OperationRecord, OperationStages, StageParams, StageParamsPatch,
};
pub use quality_evaluation::{QualityEvaluationRecord, SensoryFields};
pub use types::{BatchState, MachineStatus, OrphanPolicy};
