// ==========================================
// 生产批次追踪系统 - 成品产出领域模型
// ==========================================
// 用途: 每个 (批次号, 机台) 一条，记录 8 类产出重量
// 派生: total_weight = 8 类之和; pct = total > 0 ? w / total * 100 : 0
// 红线: 总重与百分比永远由重量重算，不接受外部输入
// 对齐: finished_product 表
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 8 类产出重量（kg），构造即为 0
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryWeights {
    pub grade_a: f64,       // A 级
    pub grade_b: f64,       // B 级
    pub grade_b_head: f64,  // B 级头料
    pub grade_c: f64,       // C 级
    pub large_scrap: f64,   // 大碎
    pub small_scrap: f64,   // 小碎
    pub reject: f64,        // 废品
    pub wet: f64,           // 湿料
}

/// 重量补丁（未提供的类别保留原值）
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightPatch {
    pub grade_a: Option<f64>,
    pub grade_b: Option<f64>,
    pub grade_b_head: Option<f64>,
    pub grade_c: Option<f64>,
    pub large_scrap: Option<f64>,
    pub small_scrap: Option<f64>,
    pub reject: Option<f64>,
    pub wet: Option<f64>,
}

/// 8 类得率百分比
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct YieldPercentages {
    pub grade_a: f64,
    pub grade_b: f64,
    pub grade_b_head: f64,
    pub grade_c: f64,
    pub large_scrap: f64,
    pub small_scrap: f64,
    pub reject: f64,
    pub wet: f64,
}

impl CategoryWeights {
    pub fn as_array(&self) -> [f64; 8] {
        [
            self.grade_a,
            self.grade_b,
            self.grade_b_head,
            self.grade_c,
            self.large_scrap,
            self.small_scrap,
            self.reject,
            self.wet,
        ]
    }

    pub fn total(&self) -> f64 {
        self.as_array().iter().sum()
    }

    pub fn percentages(&self) -> YieldPercentages {
        let total = self.total();
        let pct = |w: f64| if total > 0.0 { w / total * 100.0 } else { 0.0 };
        YieldPercentages {
            grade_a: pct(self.grade_a),
            grade_b: pct(self.grade_b),
            grade_b_head: pct(self.grade_b_head),
            grade_c: pct(self.grade_c),
            large_scrap: pct(self.large_scrap),
            small_scrap: pct(self.small_scrap),
            reject: pct(self.reject),
            wet: pct(self.wet),
        }
    }

    pub fn merged(&self, patch: &WeightPatch) -> CategoryWeights {
        CategoryWeights {
            grade_a: patch.grade_a.unwrap_or(self.grade_a),
            grade_b: patch.grade_b.unwrap_or(self.grade_b),
            grade_b_head: patch.grade_b_head.unwrap_or(self.grade_b_head),
            grade_c: patch.grade_c.unwrap_or(self.grade_c),
            large_scrap: patch.large_scrap.unwrap_or(self.large_scrap),
            small_scrap: patch.small_scrap.unwrap_or(self.small_scrap),
            reject: patch.reject.unwrap_or(self.reject),
            wet: patch.wet.unwrap_or(self.wet),
        }
    }
}

impl WeightPatch {
    /// 边界校验：提供的重量必须为有限值且非负
    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            ("grade_a", self.grade_a),
            ("grade_b", self.grade_b),
            ("grade_b_head", self.grade_b_head),
            ("grade_c", self.grade_c),
            ("large_scrap", self.large_scrap),
            ("small_scrap", self.small_scrap),
            ("reject", self.reject),
            ("wet", self.wet),
        ];
        for (name, value) in fields {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(format!("重量字段 {} 非法: {}", name, v));
                }
            }
        }
        Ok(())
    }
}

impl YieldPercentages {
    pub fn as_array(&self) -> [f64; 8] {
        [
            self.grade_a,
            self.grade_b,
            self.grade_b_head,
            self.grade_c,
            self.large_scrap,
            self.small_scrap,
            self.reject,
            self.wet,
        ]
    }

    pub fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishedProductRecord {
    // ===== 主键 =====
    pub finished_product_id: String,

    // ===== 逻辑键 =====
    pub batch_code: String,
    pub machine_id: String,

    // ===== 标识 =====
    pub process_time: NaiveDateTime,
    pub material_batch_id: Option<String>,
    pub goods_name: String,

    // ===== 产出 =====
    pub weights: CategoryWeights,
    pub total_weight_kg: f64,            // 派生
    pub percentages: YieldPercentages,   // 派生

    pub notes: Option<String>,

    // ===== 审计字段 =====
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl FinishedProductRecord {
    pub fn new(
        batch_code: String,
        machine_id: String,
        process_time: NaiveDateTime,
        material_batch_id: Option<String>,
        goods_name: String,
        weights: CategoryWeights,
    ) -> Self {
        let now = chrono::Local::now().naive_local();
        Self {
            finished_product_id: Uuid::new_v4().to_string(),
            batch_code,
            machine_id,
            process_time,
            material_batch_id,
            goods_name,
            total_weight_kg: weights.total(),
            percentages: weights.percentages(),
            weights,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 替换重量并重算派生字段
    pub fn set_weights(&mut self, weights: CategoryWeights) {
        self.weights = weights;
        self.recompute();
        self.updated_at = chrono::Local::now().naive_local();
    }

    pub fn recompute(&mut self) {
        self.total_weight_kg = self.weights.total();
        self.percentages = self.weights.percentages();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_total_yields_all_zero_percentages() {
        let pct = CategoryWeights::default().percentages();
        assert_eq!(pct, YieldPercentages::default());
        assert!(pct.as_array().iter().all(|p| *p == 0.0 && !p.is_nan()));
    }

    #[test]
    fn test_percentages_sum_to_hundred() {
        let weights = CategoryWeights {
            grade_a: 12.3,
            grade_b: 7.7,
            grade_b_head: 1.1,
            grade_c: 3.0,
            large_scrap: 0.45,
            small_scrap: 0.3,
            reject: 0.2,
            wet: 2.9,
        };
        let total = weights.total();
        let pct = weights.percentages();

        assert!((pct.sum() - 100.0).abs() < 1e-9);
        for (w, p) in weights.as_array().iter().zip(pct.as_array()) {
            assert!((p - w / total * 100.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_merge_and_recompute() {
        let mut record = FinishedProductRecord::new(
            "C007".into(),
            "m1".into(),
            chrono::NaiveDate::from_ymd_opt(2026, 10, 1)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
            None,
            "Mít sấy".into(),
            CategoryWeights::default(),
        );

        let patch = WeightPatch {
            grade_a: Some(80.0),
            grade_b: Some(20.0),
            ..Default::default()
        };
        record.set_weights(record.weights.merged(&patch));

        assert_eq!(record.total_weight_kg, 100.0);
        assert_eq!(record.percentages.grade_a, 80.0);
        assert_eq!(record.percentages.grade_b, 20.0);
        assert_eq!(record.percentages.wet, 0.0);
    }

    #[test]
    fn test_weight_patch_validation() {
        let ok = WeightPatch {
            grade_a: Some(0.0),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        let bad = WeightPatch {
            reject: Some(-0.5),
            ..Default::default()
        };
        assert!(bad.validate().unwrap_err().contains("reject"));

        let inf = WeightPatch {
            wet: Some(f64::INFINITY),
            ..Default::default()
        };
        assert!(inf.validate().is_err());
    }
}
