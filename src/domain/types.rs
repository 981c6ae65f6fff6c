// ==========================================
// 生产批次追踪系统 - 领域类型定义
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 机台状态 (Machine Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MachineStatus {
    Running,     // 运行中
    Maintenance, // 保养中
    Stopped,     // 停机
}

impl MachineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MachineStatus::Running => "RUNNING",
            MachineStatus::Maintenance => "MAINTENANCE",
            MachineStatus::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MachineStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "RUNNING" => Ok(MachineStatus::Running),
            "MAINTENANCE" => Ok(MachineStatus::Maintenance),
            "STOPPED" => Ok(MachineStatus::Stopped),
            other => Err(format!("未知机台状态: {}", other)),
        }
    }
}

// ==========================================
// 批次分发状态 (Batch State)
// ==========================================
// EMPTY → fan_out → FANNED_OUT → delete_by_batch_code → EMPTY
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchState {
    Empty,     // 无分发记录
    FannedOut, // 已分发
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchState::Empty => write!(f, "EMPTY"),
            BatchState::FannedOut => write!(f, "FANNED_OUT"),
        }
    }
}

// ==========================================
// 孤儿记录处理策略 (Orphan Policy)
// ==========================================
// 孤儿: fan_out 前已存在、携带同一批次号的成品/评价记录
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrphanPolicy {
    Reject, // 拒绝分发
    Purge,  // 事务内删除后重建
    Adopt,  // 保留已有记录并补齐
}

impl fmt::Display for OrphanPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrphanPolicy::Reject => write!(f, "REJECT"),
            OrphanPolicy::Purge => write!(f, "PURGE"),
            OrphanPolicy::Adopt => write!(f, "ADOPT"),
        }
    }
}

impl FromStr for OrphanPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "REJECT" => Ok(OrphanPolicy::Reject),
            "PURGE" => Ok(OrphanPolicy::Purge),
            "ADOPT" => Ok(OrphanPolicy::Adopt),
            other => Err(format!("未知孤儿处理策略: {}", other)),
        }
    }
}
