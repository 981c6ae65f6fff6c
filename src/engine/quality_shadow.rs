// ==========================================
// 生产批次追踪系统 - 质量评价镜像
// ==========================================
// 职责: 感官字段独立录入；已关联成品的评价百分比一律取自成品记录
// 说明: 单向同步，成品记录是百分比的唯一来源
// ==========================================

use crate::domain::finished_product::{FinishedProductRecord, YieldPercentages};
use crate::domain::quality_evaluation::{QualityEvaluationRecord, SensoryFields};
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::error::RepositoryError;
use crate::repository::{FinishedProductRepository, QualityEvaluationRepository};
use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument};

/// 新建质量评价请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateQualityEvaluationRequest {
    pub finished_product_id: Option<String>,
    pub batch_code: Option<String>,
    pub process_time: Option<NaiveDateTime>,
    pub machine_id: Option<String>,
    pub goods_name: Option<String>,
    /// 已关联成品时忽略
    #[serde(default)]
    pub percentages: YieldPercentages,
    #[serde(default)]
    pub sensory: SensoryFields,
    pub evaluator: Option<String>,
}

/// 质量评价更新（未提供的字段保持原值）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityEvaluationPatch {
    /// 已关联成品时忽略
    pub percentages: Option<YieldPercentages>,
    #[serde(default)]
    pub sensory: SensoryFields,
    pub evaluator: Option<String>,
}

pub struct QualityEvaluationShadow {
    conn: Arc<Mutex<Connection>>,
}

impl QualityEvaluationShadow {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> EngineResult<MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()).into())
    }

    #[instrument(skip(self, req), fields(finished_product_id = ?req.finished_product_id))]
    pub fn create(&self, req: &CreateQualityEvaluationRequest) -> EngineResult<QualityEvaluationRecord> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut record = match req.finished_product_id.as_deref() {
            Some(product_id) => {
                let product = Self::linked_product(&tx, product_id)?;
                if QualityEvaluationRepository::find_by_finished_product_tx(&tx, product_id)?.is_some() {
                    return Err(EngineError::Validation(format!(
                        "成品记录 {} 已有质量评价，每条成品只对应一条评价",
                        product_id
                    )));
                }
                if req.percentages != YieldPercentages::default() && req.percentages != product.percentages {
                    debug!(product_id, "忽略请求中的百分比，改用成品记录");
                }
                QualityEvaluationRecord::linked_to(&product)
            }
            None => {
                let batch_code = req
                    .batch_code
                    .as_deref()
                    .map(str::trim)
                    .filter(|code| !code.is_empty())
                    .ok_or_else(|| EngineError::Validation("未关联成品的评价必须提供 batch_code".to_string()))?;
                validate_percentages(&req.percentages)?;
                QualityEvaluationRecord::standalone(
                    batch_code.to_string(),
                    req.process_time,
                    req.machine_id.clone(),
                    req.goods_name.clone(),
                    req.percentages,
                )
            }
        };
        record.sensory = req.sensory.clone();
        record.evaluator = req.evaluator.clone();

        QualityEvaluationRepository::insert_tx(&tx, &record)?;
        tx.commit()?;

        info!(
            quality_evaluation_id = %record.quality_evaluation_id,
            batch_code = %record.batch_code,
            "质量评价已创建"
        );
        Ok(record)
    }

    #[instrument(skip(self, patch))]
    pub fn update(
        &self,
        quality_evaluation_id: &str,
        patch: &QualityEvaluationPatch,
    ) -> EngineResult<QualityEvaluationRecord> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut record = QualityEvaluationRepository::find_by_id_tx(&tx, quality_evaluation_id)?
            .ok_or_else(|| EngineError::not_found("QualityEvaluationRecord", quality_evaluation_id))?;

        match record.finished_product_id.as_deref() {
            Some(product_id) => {
                record.percentages = Self::linked_product(&tx, product_id)?.percentages;
            }
            None => {
                if let Some(percentages) = &patch.percentages {
                    validate_percentages(percentages)?;
                    record.percentages = *percentages;
                }
            }
        }
        record.sensory = record.sensory.merged(&patch.sensory);
        if let Some(evaluator) = &patch.evaluator {
            record.evaluator = Some(evaluator.clone());
        }
        record.updated_at = chrono::Local::now().naive_local();

        QualityEvaluationRepository::update_tx(&tx, &record)?;
        tx.commit()?;
        Ok(record)
    }

    fn linked_product(conn: &Connection, finished_product_id: &str) -> EngineResult<FinishedProductRecord> {
        FinishedProductRepository::find_by_id_tx(conn, finished_product_id)?
            .ok_or_else(|| EngineError::reference_not_found("FinishedProductRecord", finished_product_id))
    }

    pub fn get(&self, quality_evaluation_id: &str) -> EngineResult<QualityEvaluationRecord> {
        let conn = self.get_conn()?;
        QualityEvaluationRepository::find_by_id_tx(&conn, quality_evaluation_id)?
            .ok_or_else(|| EngineError::not_found("QualityEvaluationRecord", quality_evaluation_id))
    }

    pub fn list_by_batch_code(&self, batch_code: &str) -> EngineResult<Vec<QualityEvaluationRecord>> {
        let conn = self.get_conn()?;
        Ok(QualityEvaluationRepository::list_by_batch_code_tx(&conn, batch_code)?)
    }
}

fn validate_percentages(percentages: &YieldPercentages) -> EngineResult<()> {
    if percentages
        .as_array()
        .iter()
        .any(|p| !p.is_finite() || *p < 0.0 || *p > 100.0)
    {
        return Err(EngineError::Validation(format!(
            "百分比超出 [0, 100]: {:?}",
            percentages
        )));
    }
    Ok(())
}
