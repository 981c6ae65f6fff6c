// ==========================================
// 生产批次追踪系统 - API 层
// ==========================================
// 职责: 面向外层控制器的业务门面，统一错误类型与操作留痕
// ==========================================

pub mod error;
pub mod master_data_api;
pub mod production_api;

pub use error::{ApiError, ApiResult};
pub use master_data_api::MasterDataApi;
pub use production_api::ProductionApi;
