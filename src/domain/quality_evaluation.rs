// ==========================================
// 生产批次追踪系统 - 质量评价（感官影子记录）领域模型
// ==========================================
// 红线: 关联成品记录时，8 项百分比只读镜像，永远以成品记录为准
// 感官字段由人工独立填写
// 对齐: quality_evaluation 表
// ==========================================

use crate::domain::finished_product::{FinishedProductRecord, YieldPercentages};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 感官评价字段
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensoryFields {
    pub color: Option<String>,                // 色泽
    pub aroma: Option<String>,                // 香气
    pub taste: Option<String>,                // 口味
    pub sweetness: Option<String>,            // 甜度
    pub crispness: Option<String>,            // 脆度
    pub overall_remark: Option<String>,       // 综合评语
    pub suggested_adjustment: Option<String>, // 工艺调整建议
}

impl SensoryFields {
    /// 以补丁中提供的字段覆盖
    pub fn merged(&self, patch: &SensoryFields) -> SensoryFields {
        SensoryFields {
            color: patch.color.clone().or_else(|| self.color.clone()),
            aroma: patch.aroma.clone().or_else(|| self.aroma.clone()),
            taste: patch.taste.clone().or_else(|| self.taste.clone()),
            sweetness: patch.sweetness.clone().or_else(|| self.sweetness.clone()),
            crispness: patch.crispness.clone().or_else(|| self.crispness.clone()),
            overall_remark: patch.overall_remark.clone().or_else(|| self.overall_remark.clone()),
            suggested_adjustment: patch
                .suggested_adjustment
                .clone()
                .or_else(|| self.suggested_adjustment.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityEvaluationRecord {
    pub quality_evaluation_id: String,
    pub finished_product_id: Option<String>, // 关联成品记录

    pub batch_code: String,
    pub process_time: Option<NaiveDateTime>,
    pub machine_id: Option<String>,
    pub goods_name: Option<String>,

    pub percentages: YieldPercentages, // 镜像字段
    pub sensory: SensoryFields,
    pub evaluator: Option<String>,

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl QualityEvaluationRecord {
    /// 为成品记录生成空白评价（感官字段为空，百分比取成品当前值）
    pub fn linked_to(product: &FinishedProductRecord) -> Self {
        let now = chrono::Local::now().naive_local();
        Self {
            quality_evaluation_id: Uuid::new_v4().to_string(),
            finished_product_id: Some(product.finished_product_id.clone()),
            batch_code: product.batch_code.clone(),
            process_time: Some(product.process_time),
            machine_id: Some(product.machine_id.clone()),
            goods_name: Some(product.goods_name.clone()),
            percentages: product.percentages,
            sensory: SensoryFields::default(),
            evaluator: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 未关联成品的独立评价（百分比取自请求）
    pub fn standalone(
        batch_code: String,
        process_time: Option<NaiveDateTime>,
        machine_id: Option<String>,
        goods_name: Option<String>,
        percentages: YieldPercentages,
    ) -> Self {
        let now = chrono::Local::now().naive_local();
        Self {
            quality_evaluation_id: Uuid::new_v4().to_string(),
            finished_product_id: None,
            batch_code,
            process_time,
            machine_id,
            goods_name,
            percentages,
            sensory: SensoryFields::default(),
            evaluator: None,
            created_at: now,
            updated_at: now,
        }
    }
}
