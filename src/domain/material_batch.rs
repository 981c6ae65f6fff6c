// ==========================================
// 生产批次追踪系统 - 原料批次领域模型
// ==========================================
// 用途: 原料规格（投料重量、浸泡参数、品名），按 (批次号, 加工时间) 定位
// 约束: 下游记录生成后视为只读（未强制）
// 对齐: material_batch 表
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialBatch {
    // ===== 主键与定位 =====
    pub material_batch_id: String,     // UUID
    pub batch_code: String,            // 批次号（人工指定或序列生成）
    pub process_time: NaiveDateTime,   // 加工时间

    // ===== 原料规格 =====
    pub goods_name: String,            // 品名
    pub input_weight_kg: f64,          // 投料重量（kg）
    pub soak_time_min: f64,            // 浸泡时长（分钟）
    pub soak_temperature_c: f64,       // 浸泡温度（℃）
    pub frying_temperature_c: Option<f64>, // 预设油温（℃）
    pub notes: Option<String>,

    // ===== 审计字段 =====
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// 新建原料批次请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewMaterialBatch {
    pub batch_code: Option<String>,          // 为空时由序列生成
    pub process_time: Option<NaiveDateTime>,
    pub goods_name: String,
    pub input_weight_kg: f64,
    #[serde(default)]
    pub soak_time_min: f64,
    #[serde(default)]
    pub soak_temperature_c: f64,
    pub frying_temperature_c: Option<f64>,
    pub notes: Option<String>,
}

impl MaterialBatch {
    /// 由请求构建实体；批次号与加工时间需已确定
    pub fn from_request(
        batch_code: String,
        process_time: NaiveDateTime,
        req: &NewMaterialBatch,
    ) -> Self {
        let now = chrono::Local::now().naive_local();
        Self {
            material_batch_id: Uuid::new_v4().to_string(),
            batch_code,
            process_time,
            goods_name: req.goods_name.trim().to_string(),
            input_weight_kg: req.input_weight_kg,
            soak_time_min: req.soak_time_min,
            soak_temperature_c: req.soak_temperature_c,
            frying_temperature_c: req.frying_temperature_c,
            notes: req.notes.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}
