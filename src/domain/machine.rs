// ==========================================
// 生产批次追踪系统 - 机台领域模型
// ==========================================
// 用途: 机台登记表，fan_out 以其全集为分发目标
// 对齐: machine 表
// ==========================================

use crate::domain::types::MachineStatus;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub machine_id: String,       // 机台ID (UUID)
    pub machine_code: String,     // 机台代码（唯一）
    pub machine_name: String,     // 机台名称（唯一）
    pub status: MachineStatus,    // 当前状态
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Machine {
    /// 创建新的机台实体（自动生成 UUID 和时间戳）
    pub fn new(machine_code: String, machine_name: String, status: MachineStatus) -> Self {
        let now = chrono::Local::now().naive_local();
        Self {
            machine_id: Uuid::new_v4().to_string(),
            machine_code,
            machine_name,
            status,
            created_at: now,
            updated_at: now,
        }
    }
}
