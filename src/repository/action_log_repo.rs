// ==========================================
// 生产批次追踪系统 - 操作日志数据仓储
// ==========================================
// 职责: action_log 表的写入与查询
// 红线: 批次相关写入必须留痕
// ==========================================

mod core;
mod queries;

#[cfg(test)]
mod tests;

pub use core::ActionLogRepository;
