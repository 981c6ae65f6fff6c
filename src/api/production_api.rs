// ==========================================
// 生产批次追踪系统 - 生产业务 API
// ==========================================
// 职责: 封装分发引擎/成品追踪/评价镜像，统一错误转换并留痕
// 说明: ActionLog 写入为尽力而为，失败只告警不影响业务结果
// ==========================================

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde_json::json;

use crate::api::error::ApiResult;
use crate::config::ConfigManager;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::finished_product::FinishedProductRecord;
use crate::domain::operation::{OperationPatch, OperationRecord};
use crate::domain::quality_evaluation::QualityEvaluationRecord;
use crate::domain::types::BatchState;
use crate::engine::{
    CascadeDeleteReport, CreateFinishedProductRequest, CreateQualityEvaluationRequest,
    CreateSingleOperationRequest, FanOutReport, FinishedProductPatch, FinishedProductTracker,
    OperationFanOutEngine, QualityEvaluationPatch, QualityEvaluationShadow,
    SingleOperationOutcome, SyncOutcome,
};
use crate::repository::action_log_repo::ActionLogRepository;

// ==========================================
// ProductionApi
// ==========================================
pub struct ProductionApi {
    fan_out_engine: Arc<OperationFanOutEngine<ConfigManager>>,
    tracker: Arc<FinishedProductTracker>,
    shadow: Arc<QualityEvaluationShadow>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl ProductionApi {
    pub fn new(
        fan_out_engine: Arc<OperationFanOutEngine<ConfigManager>>,
        tracker: Arc<FinishedProductTracker>,
        shadow: Arc<QualityEvaluationShadow>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            fan_out_engine,
            tracker,
            shadow,
            action_log_repo,
        }
    }

    // ==========================================
    // 批次分发
    // ==========================================

    pub async fn fan_out(
        &self,
        batch_code: &str,
        process_time: NaiveDateTime,
        operator: &str,
    ) -> ApiResult<FanOutReport> {
        let report = self.fan_out_engine.fan_out(batch_code, process_time).await?;

        self.log_action(
            ActionLog::new(ActionType::FanOut, Some(report.batch_code.clone()), operator)
                .with_payload(&json!({
                    "process_time": report.process_time,
                    "material_batch_id": report.material_batch_id,
                    "orphan_policy": report.orphan_policy,
                    "operations": report.operations.len(),
                    "finished_products": report.finished_products.len(),
                    "quality_evaluations": report.quality_evaluations.len(),
                    "purged_finished_products": report.purged_finished_products,
                    "purged_quality_evaluations": report.purged_quality_evaluations,
                    "adopted_finished_products": report.adopted_finished_products,
                }))
                .with_detail(format!(
                    "批次 {} 分发到 {} 个机台",
                    report.batch_code,
                    report.operations.len()
                )),
        );
        Ok(report)
    }

    pub async fn create_single_operation(
        &self,
        request: &CreateSingleOperationRequest,
        operator: &str,
    ) -> ApiResult<SingleOperationOutcome> {
        let outcome = self.fan_out_engine.create_single_operation(request).await?;

        self.log_action(
            ActionLog::new(
                ActionType::CreateOperation,
                Some(outcome.operation.batch_code.clone()),
                operator,
            )
            .with_payload(&json!({
                "operation_id": outcome.operation.operation_id,
                "operation_code": outcome.operation.operation_code,
                "machine_name": outcome.operation.machine_name,
                "finished_product_id": outcome.finished_product.as_ref().map(|p| &p.finished_product_id),
            })),
        );
        Ok(outcome)
    }

    pub fn update_operation(
        &self,
        operation_id: &str,
        patch: &OperationPatch,
        operator: &str,
    ) -> ApiResult<OperationRecord> {
        let record = self.fan_out_engine.update_operation(operation_id, patch)?;

        self.log_action(
            ActionLog::new(ActionType::UpdateOperation, Some(record.batch_code.clone()), operator)
                .with_payload(patch)
                .with_detail(format!(
                    "{} 总干燥时长 {} 分钟",
                    record.operation_code, record.total_dry_time_min
                )),
        );
        Ok(record)
    }

    pub fn delete_by_batch_code(&self, batch_code: &str, operator: &str) -> ApiResult<CascadeDeleteReport> {
        let report = self.fan_out_engine.delete_by_batch_code(batch_code)?;

        self.log_action(
            ActionLog::new(ActionType::CascadeDelete, Some(batch_code.trim().to_string()), operator)
                .with_payload(&report),
        );
        Ok(report)
    }

    pub fn batch_state(&self, batch_code: &str) -> ApiResult<BatchState> {
        Ok(self.fan_out_engine.batch_state(batch_code)?)
    }

    pub fn get_operation(&self, operation_id: &str) -> ApiResult<OperationRecord> {
        Ok(self.fan_out_engine.get_operation(operation_id)?)
    }

    pub fn list_operations(&self, batch_code: &str) -> ApiResult<Vec<OperationRecord>> {
        Ok(self.fan_out_engine.list_operations(batch_code)?)
    }

    // ==========================================
    // 成品记录
    // ==========================================

    pub fn create_finished_product(
        &self,
        request: &CreateFinishedProductRequest,
        operator: &str,
    ) -> ApiResult<FinishedProductRecord> {
        let record = self.tracker.create(request)?;

        self.log_action(
            ActionLog::new(
                ActionType::CreateFinishedProduct,
                Some(record.batch_code.clone()),
                operator,
            )
            .with_payload(&json!({
                "finished_product_id": record.finished_product_id,
                "machine_id": record.machine_id,
                "total_weight_kg": record.total_weight_kg,
            })),
        );
        Ok(record)
    }

    pub fn update_finished_product(
        &self,
        finished_product_id: &str,
        patch: &FinishedProductPatch,
        operator: &str,
    ) -> ApiResult<SyncOutcome> {
        let outcome = self.tracker.update(finished_product_id, patch)?;

        self.log_action(
            ActionLog::new(
                ActionType::UpdateFinishedProduct,
                Some(outcome.record.batch_code.clone()),
                operator,
            )
            .with_payload(&json!({
                "finished_product_id": outcome.record.finished_product_id,
                "weights": patch.weights,
                "total_weight_kg": outcome.record.total_weight_kg,
                "propagated": outcome.propagated,
            })),
        );
        Ok(outcome)
    }

    pub fn resync_quality(&self, finished_product_id: &str, operator: &str) -> ApiResult<SyncOutcome> {
        let outcome = self.tracker.resync(finished_product_id)?;

        self.log_action(
            ActionLog::new(
                ActionType::ResyncQuality,
                Some(outcome.record.batch_code.clone()),
                operator,
            )
            .with_detail(format!("重推到 {} 条评价", outcome.propagated)),
        );
        Ok(outcome)
    }

    pub fn delete_finished_product(
        &self,
        finished_product_id: &str,
        operator: &str,
    ) -> ApiResult<FinishedProductRecord> {
        let record = self.tracker.delete(finished_product_id)?;

        self.log_action(
            ActionLog::new(
                ActionType::DeleteFinishedProduct,
                Some(record.batch_code.clone()),
                operator,
            )
            .with_payload(&json!({
                "finished_product_id": record.finished_product_id,
                "machine_id": record.machine_id,
            })),
        );
        Ok(record)
    }

    pub fn get_finished_product(&self, finished_product_id: &str) -> ApiResult<FinishedProductRecord> {
        Ok(self.tracker.get(finished_product_id)?)
    }

    pub fn list_finished_products(&self, batch_code: &str) -> ApiResult<Vec<FinishedProductRecord>> {
        Ok(self.tracker.list_by_batch_code(batch_code)?)
    }

    // ==========================================
    // 质量评价
    // ==========================================

    pub fn create_quality_evaluation(
        &self,
        request: &CreateQualityEvaluationRequest,
        operator: &str,
    ) -> ApiResult<QualityEvaluationRecord> {
        let record = self.shadow.create(request)?;

        self.log_action(
            ActionLog::new(
                ActionType::CreateQualityEvaluation,
                Some(record.batch_code.clone()),
                operator,
            )
            .with_payload(&json!({
                "quality_evaluation_id": record.quality_evaluation_id,
                "finished_product_id": record.finished_product_id,
            })),
        );
        Ok(record)
    }

    pub fn update_quality_evaluation(
        &self,
        quality_evaluation_id: &str,
        patch: &QualityEvaluationPatch,
        operator: &str,
    ) -> ApiResult<QualityEvaluationRecord> {
        let record = self.shadow.update(quality_evaluation_id, patch)?;

        self.log_action(
            ActionLog::new(
                ActionType::UpdateQualityEvaluation,
                Some(record.batch_code.clone()),
                operator,
            )
            .with_payload(patch),
        );
        Ok(record)
    }

    pub fn get_quality_evaluation(&self, quality_evaluation_id: &str) -> ApiResult<QualityEvaluationRecord> {
        Ok(self.shadow.get(quality_evaluation_id)?)
    }

    pub fn list_quality_evaluations(&self, batch_code: &str) -> ApiResult<Vec<QualityEvaluationRecord>> {
        Ok(self.shadow.list_by_batch_code(batch_code)?)
    }

    // ==========================================
    // 留痕
    // ==========================================

    pub fn list_action_logs(&self, batch_code: &str) -> ApiResult<Vec<ActionLog>> {
        Ok(self.action_log_repo.list_by_batch_code(batch_code)?)
    }

    pub fn list_recent_action_logs(&self, limit: usize) -> ApiResult<Vec<ActionLog>> {
        Ok(self.action_log_repo.list_recent(limit)?)
    }

    fn log_action(&self, log: ActionLog) {
        if let Err(e) = self.action_log_repo.insert(&log) {
            tracing::warn!(
                action_type = %log.action_type,
                batch_code = ?log.batch_code,
                error = %e,
                "ActionLog 写入失败"
            );
        }
    }
}
