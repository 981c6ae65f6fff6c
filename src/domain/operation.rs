// ==========================================
// 生产批次追踪系统 - 机台操作记录领域模型
// ==========================================
// 用途: 每个 (批次号, 机台) 一条，记录 4 段工艺参数
// 派生: total_dry_time_min = 4 段时长之和（不接受外部输入）
// 对齐: operation_record 表
// ==========================================

use crate::domain::machine::Machine;
use crate::domain::types::MachineStatus;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 单段工艺参数
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StageParams {
    pub duration_min: f64,
    pub temperature_c: f64,
    pub pressure_kpa: f64,
}

/// 单段工艺参数补丁（未提供的字段保留原值）
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StageParamsPatch {
    pub duration_min: Option<f64>,
    pub temperature_c: Option<f64>,
    pub pressure_kpa: Option<f64>,
}

impl StageParams {
    pub fn merged(&self, patch: &StageParamsPatch) -> StageParams {
        StageParams {
            duration_min: patch.duration_min.unwrap_or(self.duration_min),
            temperature_c: patch.temperature_c.unwrap_or(self.temperature_c),
            pressure_kpa: patch.pressure_kpa.unwrap_or(self.pressure_kpa),
        }
    }
}

/// 4 段有序工艺
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationStages {
    #[serde(default)]
    pub stage1: StageParams,
    #[serde(default)]
    pub stage2: StageParams,
    #[serde(default)]
    pub stage3: StageParams,
    #[serde(default)]
    pub stage4: StageParams,
}

impl OperationStages {
    pub fn as_array(&self) -> [&StageParams; 4] {
        [&self.stage1, &self.stage2, &self.stage3, &self.stage4]
    }

    /// 总干燥时长（分钟）
    pub fn total_dry_time(&self) -> f64 {
        self.as_array().iter().map(|s| s.duration_min).sum()
    }

    pub fn merged(&self, patch: &OperationPatch) -> OperationStages {
        OperationStages {
            stage1: self.stage1.merged(&patch.stage1),
            stage2: self.stage2.merged(&patch.stage2),
            stage3: self.stage3.merged(&patch.stage3),
            stage4: self.stage4.merged(&patch.stage4),
        }
    }

    /// 所有数值必须为有限值且非负
    pub fn validate(&self) -> Result<(), String> {
        for (idx, stage) in self.as_array().iter().enumerate() {
            for (field, value) in [
                ("duration_min", stage.duration_min),
                ("temperature_c", stage.temperature_c),
                ("pressure_kpa", stage.pressure_kpa),
            ] {
                if !value.is_finite() || value < 0.0 {
                    return Err(format!("第{}段 {} 非法: {}", idx + 1, field, value));
                }
            }
        }
        Ok(())
    }
}

/// 操作记录更新补丁
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationPatch {
    #[serde(default)]
    pub stage1: StageParamsPatch,
    #[serde(default)]
    pub stage2: StageParamsPatch,
    #[serde(default)]
    pub stage3: StageParamsPatch,
    #[serde(default)]
    pub stage4: StageParamsPatch,
    pub operator: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    // ===== 主键 =====
    pub operation_id: String,           // UUID
    pub operation_code: String,         // 顺序编码（如 OP000001）

    // ===== 逻辑键 =====
    pub batch_code: String,
    pub machine_id: String,

    // ===== 关联 =====
    pub process_time: Option<NaiveDateTime>,
    pub material_batch_id: Option<String>,

    // ===== 机台快照（分发时刻）=====
    pub machine_name: String,
    pub machine_status: MachineStatus,

    // ===== 工艺 =====
    pub stages: OperationStages,
    pub total_dry_time_min: f64,        // 派生

    // ===== 人工字段 =====
    pub operator: Option<String>,
    pub notes: Option<String>,

    // ===== 审计字段 =====
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl OperationRecord {
    /// 为机台创建操作记录，机台名称与状态取当前快照
    pub fn for_machine(
        operation_code: String,
        batch_code: &str,
        machine: &Machine,
        process_time: Option<NaiveDateTime>,
        material_batch_id: Option<String>,
        stages: OperationStages,
    ) -> Self {
        let now = chrono::Local::now().naive_local();
        Self {
            operation_id: Uuid::new_v4().to_string(),
            operation_code,
            batch_code: batch_code.to_string(),
            machine_id: machine.machine_id.clone(),
            process_time,
            material_batch_id,
            machine_name: machine.machine_name.clone(),
            machine_status: machine.status,
            total_dry_time_min: stages.total_dry_time(),
            stages,
            operator: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 合并补丁并重算总干燥时长
    pub fn apply_patch(&mut self, patch: &OperationPatch) {
        self.stages = self.stages.merged(patch);
        self.total_dry_time_min = self.stages.total_dry_time();
        if let Some(operator) = &patch.operator {
            self.operator = Some(operator.clone());
        }
        if let Some(notes) = &patch.notes {
            self.notes = Some(notes.clone());
        }
        self.updated_at = chrono::Local::now().naive_local();
    }
}
