// ==========================================
// 生产批次追踪系统 - 配置层
// ==========================================
// 职责: 系统配置管理（孤儿策略、编码格式）
// 存储: config_kv 表 (scope_id = 'global')
// ==========================================

pub mod config_manager;
pub mod fan_out_config_trait;

pub use config_manager::{config_keys, ConfigManager};
pub use fan_out_config_trait::{ConfigResult, FanOutConfigReader};
