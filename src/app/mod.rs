// ==========================================
// 生产批次追踪系统 - 应用层
// ==========================================
// 职责: 组装共享连接、仓储、引擎与 API
// ==========================================

pub mod state;

pub use state::{get_default_db_path, AppState};
