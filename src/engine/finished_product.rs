// ==========================================
// 生产批次追踪系统 - 成品产出追踪
// ==========================================
// 职责: 成品重量录入、总重与 8 项百分比派生、向质量评价下推
// 红线: 总重/百分比只由 8 项重量重算，不接受外部输入
// 红线: 重量更新与百分比下推在同一事务内完成，下推失败整体回滚
// ==========================================

use crate::domain::finished_product::{CategoryWeights, FinishedProductRecord, WeightPatch};
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::error::RepositoryError;
use crate::repository::{
    FinishedProductRepository, MachineRepository, MaterialBatchRepository, QualityEvaluationRepository,
};
use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument};

/// 新建成品记录请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateFinishedProductRequest {
    pub batch_code: String,
    pub process_time: Option<NaiveDateTime>,
    pub goods_name: String,
    pub machine_id: String,
    pub material_batch_id: Option<String>,
    /// 重量块必填；块内缺省字段按 0 计
    pub weights: Option<WeightPatch>,
    pub notes: Option<String>,
}

/// 成品记录更新（未提供的重量保持原值）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinishedProductPatch {
    #[serde(default)]
    pub weights: WeightPatch,
    pub notes: Option<String>,
}

/// 更新/重推结果
///
/// `propagated = 0` 表示没有关联评价，属正常结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub record: FinishedProductRecord,
    pub propagated: usize,
}

// ==========================================
// FinishedProductTracker
// ==========================================
pub struct FinishedProductTracker {
    conn: Arc<Mutex<Connection>>,
}

impl FinishedProductTracker {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> EngineResult<MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()).into())
    }

    /// 新建成品记录
    ///
    /// # 校验
    /// - batch_code / process_time / goods_name / machine_id 必填 → Validation
    /// - 重量块必填，各项有限且非负 → Validation
    /// - machine_id / material_batch_id（若提供）必须存在 → ReferenceNotFound
    #[instrument(skip(self, req), fields(batch_code = %req.batch_code, machine_id = %req.machine_id))]
    pub fn create(&self, req: &CreateFinishedProductRequest) -> EngineResult<FinishedProductRecord> {
        let (process_time, weights) = Self::validate_create(req)?;

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let machine_id = req.machine_id.trim();
        if MachineRepository::find_by_id_tx(&tx, machine_id)?.is_none() {
            return Err(EngineError::reference_not_found("Machine", machine_id));
        }
        if let Some(material_batch_id) = req.material_batch_id.as_deref() {
            if MaterialBatchRepository::find_by_id_tx(&tx, material_batch_id)?.is_none() {
                return Err(EngineError::reference_not_found("MaterialBatch", material_batch_id));
            }
        }

        let mut record = FinishedProductRecord::new(
            req.batch_code.trim().to_string(),
            machine_id.to_string(),
            process_time,
            req.material_batch_id.clone(),
            req.goods_name.trim().to_string(),
            weights,
        );
        record.notes = req.notes.clone();
        FinishedProductRepository::insert_tx(&tx, &record)?;

        tx.commit()?;
        info!(
            finished_product_id = %record.finished_product_id,
            total_weight_kg = record.total_weight_kg,
            "成品记录已创建"
        );
        Ok(record)
    }

    fn validate_create(req: &CreateFinishedProductRequest) -> EngineResult<(NaiveDateTime, CategoryWeights)> {
        let mut missing = Vec::new();
        if req.batch_code.trim().is_empty() {
            missing.push("batch_code");
        }
        if req.process_time.is_none() {
            missing.push("process_time");
        }
        if req.goods_name.trim().is_empty() {
            missing.push("goods_name");
        }
        if req.machine_id.trim().is_empty() {
            missing.push("machine_id");
        }
        if req.weights.is_none() {
            missing.push("weights");
        }

        match (req.process_time, req.weights.as_ref()) {
            (Some(process_time), Some(patch)) if missing.is_empty() => {
                patch.validate().map_err(EngineError::Validation)?;
                Ok((process_time, CategoryWeights::default().merged(patch)))
            }
            _ => Err(EngineError::Validation(format!(
                "缺少必填字段: {}",
                missing.join(", ")
            ))),
        }
    }

    /// 合并重量、重算派生字段并下推到关联评价
    #[instrument(skip(self, patch))]
    pub fn update(&self, finished_product_id: &str, patch: &FinishedProductPatch) -> EngineResult<SyncOutcome> {
        patch.weights.validate().map_err(EngineError::Validation)?;

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut record = FinishedProductRepository::find_by_id_tx(&tx, finished_product_id)?
            .ok_or_else(|| EngineError::not_found("FinishedProductRecord", finished_product_id))?;

        let weights = record.weights.merged(&patch.weights);
        record.set_weights(weights);
        if let Some(notes) = &patch.notes {
            record.notes = Some(notes.clone());
        }
        FinishedProductRepository::update_weights_tx(&tx, &record)?;

        let propagated = Self::propagate(&tx, &record)?;

        tx.commit()?;
        info!(
            total_weight_kg = record.total_weight_kg,
            propagated,
            "成品重量已更新"
        );
        Ok(SyncOutcome { record, propagated })
    }

    /// 将当前百分比重新下推到关联评价（修复工具）
    #[instrument(skip(self))]
    pub fn resync(&self, finished_product_id: &str) -> EngineResult<SyncOutcome> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let record = FinishedProductRepository::find_by_id_tx(&tx, finished_product_id)?
            .ok_or_else(|| EngineError::not_found("FinishedProductRecord", finished_product_id))?;
        let propagated = Self::propagate(&tx, &record)?;

        tx.commit()?;
        info!(propagated, "百分比已重推");
        Ok(SyncOutcome { record, propagated })
    }

    /// 下推阶段：任何失败都报 SyncPropagation，由调用方丢弃事务回滚
    fn propagate(conn: &Connection, record: &FinishedProductRecord) -> EngineResult<usize> {
        let sync_error = |reason: String| EngineError::SyncPropagation {
            finished_product_id: record.finished_product_id.clone(),
            reason,
        };

        let expected = QualityEvaluationRepository::count_linked_tx(conn, &record.finished_product_id)
            .map_err(|e| sync_error(e.to_string()))?;
        let updated = QualityEvaluationRepository::sync_percentages_tx(
            conn,
            &record.finished_product_id,
            &record.percentages,
        )
        .map_err(|e| sync_error(e.to_string()))?;

        if updated != expected {
            return Err(sync_error(format!(
                "关联评价 {} 条，实际更新 {} 条",
                expected, updated
            )));
        }

        debug!(updated, "百分比下推完成");
        Ok(updated)
    }

    /// 单条删除（不经批次级联）；关联评价保留，但解除关联
    #[instrument(skip(self))]
    pub fn delete(&self, finished_product_id: &str) -> EngineResult<FinishedProductRecord> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let record = FinishedProductRepository::find_by_id_tx(&tx, finished_product_id)?
            .ok_or_else(|| EngineError::not_found("FinishedProductRecord", finished_product_id))?;
        let unlinked = QualityEvaluationRepository::count_linked_tx(&tx, finished_product_id)?;
        FinishedProductRepository::delete_by_id_tx(&tx, finished_product_id)?;

        tx.commit()?;
        info!(batch_code = %record.batch_code, unlinked, "成品记录已删除");
        Ok(record)
    }

    pub fn get(&self, finished_product_id: &str) -> EngineResult<FinishedProductRecord> {
        let conn = self.get_conn()?;
        FinishedProductRepository::find_by_id_tx(&conn, finished_product_id)?
            .ok_or_else(|| EngineError::not_found("FinishedProductRecord", finished_product_id))
    }

    pub fn list_by_batch_code(&self, batch_code: &str) -> EngineResult<Vec<FinishedProductRecord>> {
        let conn = self.get_conn()?;
        Ok(FinishedProductRepository::list_by_batch_code_tx(&conn, batch_code)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_request() -> CreateFinishedProductRequest {
        CreateFinishedProductRequest {
            batch_code: "C007".into(),
            process_time: chrono::NaiveDate::from_ymd_opt(2026, 10, 1)
                .and_then(|d| d.and_hms_opt(8, 0, 0)),
            goods_name: "Mít sấy".into(),
            machine_id: "m-1".into(),
            material_batch_id: None,
            weights: Some(WeightPatch {
                grade_a: Some(30.0),
                grade_c: Some(10.0),
                ..Default::default()
            }),
            notes: None,
        }
    }

    #[test]
    fn test_validate_create_fills_missing_weights_with_zero() {
        let (_, weights) = FinishedProductTracker::validate_create(&full_request()).unwrap();
        assert_eq!(weights.grade_a, 30.0);
        assert_eq!(weights.grade_b, 0.0);
        assert_eq!(weights.total(), 40.0);
    }

    #[test]
    fn test_validate_create_lists_missing_fields() {
        let req = CreateFinishedProductRequest {
            weights: None,
            goods_name: " ".into(),
            ..full_request()
        };
        match FinishedProductTracker::validate_create(&req) {
            Err(EngineError::Validation(msg)) => {
                assert!(msg.contains("goods_name"));
                assert!(msg.contains("weights"));
                assert!(!msg.contains("batch_code"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_create_rejects_negative_weight() {
        let mut req = full_request();
        req.weights = Some(WeightPatch {
            reject: Some(-2.0),
            ..Default::default()
        });
        assert!(matches!(
            FinishedProductTracker::validate_create(&req),
            Err(EngineError::Validation(_))
        ));
    }
}
