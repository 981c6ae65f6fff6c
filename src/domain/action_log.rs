// ==========================================
// 生产批次追踪系统 - 操作日志领域模型
// ==========================================
// 红线: 批次相关的所有写入必须留痕
// 对齐: action_log 表
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,
    pub batch_code: Option<String>, // 关联批次号（机台/原料维护等可为None）
    pub action_type: String,        // 存储为字符串
    pub action_ts: NaiveDateTime,
    pub actor: String,
    pub payload_json: Option<JsonValue>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    FanOut,                  // 批次分发
    CreateOperation,         // 单机台操作记录
    UpdateOperation,         // 工艺参数更新
    CascadeDelete,           // 批次级联删除
    CreateFinishedProduct,   // 新建成品记录
    UpdateFinishedProduct,   // 成品重量更新（含百分比下推）
    DeleteFinishedProduct,   // 单条删除成品记录
    ResyncQuality,           // 手工重推百分比
    CreateQualityEvaluation, // 新建质量评价
    UpdateQualityEvaluation, // 更新质量评价
    RegisterMachine,         // 机台登记
    UpdateMachineStatus,     // 机台状态变更
    RegisterMaterialBatch,   // 原料批次登记
}

impl ActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::FanOut => "FanOut",
            ActionType::CreateOperation => "CreateOperation",
            ActionType::UpdateOperation => "UpdateOperation",
            ActionType::CascadeDelete => "CascadeDelete",
            ActionType::CreateFinishedProduct => "CreateFinishedProduct",
            ActionType::UpdateFinishedProduct => "UpdateFinishedProduct",
            ActionType::DeleteFinishedProduct => "DeleteFinishedProduct",
            ActionType::ResyncQuality => "ResyncQuality",
            ActionType::CreateQualityEvaluation => "CreateQualityEvaluation",
            ActionType::UpdateQualityEvaluation => "UpdateQualityEvaluation",
            ActionType::RegisterMachine => "RegisterMachine",
            ActionType::UpdateMachineStatus => "UpdateMachineStatus",
            ActionType::RegisterMaterialBatch => "RegisterMaterialBatch",
        }
    }
}

impl ActionLog {
    pub fn new(action_type: ActionType, batch_code: Option<String>, actor: &str) -> Self {
        Self {
            action_id: Uuid::new_v4().to_string(),
            batch_code,
            action_type: action_type.as_str().to_string(),
            action_ts: chrono::Local::now().naive_local(),
            actor: actor.to_string(),
            payload_json: None,
            detail: None,
        }
    }

    /// 设置操作负载 (转换为JSON)
    pub fn with_payload<T: Serialize>(mut self, payload: &T) -> Self {
        self.payload_json = serde_json::to_value(payload).ok();
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
