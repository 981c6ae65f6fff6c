// ==========================================
// 生产批次追踪系统 - 批次分发引擎
// ==========================================
// 职责: 按批次号为每个机台生成操作/成品/评价三件套；批次级联删除
// 红线: 同一批次号只能分发一次；分发全程一个 IMMEDIATE 事务
// 红线: Engine 不拼 SQL，数据访问全部经由仓储 *_tx 函数
// ==========================================
// 状态: EMPTY → fan_out → FANNED_OUT → delete_by_batch_code → EMPTY
// ==========================================

use crate::config::FanOutConfigReader;
use crate::domain::finished_product::{CategoryWeights, FinishedProductRecord};
use crate::domain::operation::{OperationPatch, OperationRecord, OperationStages};
use crate::domain::quality_evaluation::QualityEvaluationRecord;
use crate::domain::types::{BatchState, OrphanPolicy};
use crate::engine::error::{EngineError, EngineResult};
use crate::perf::PerfGuard;
use crate::repository::error::RepositoryError;
use crate::repository::operation_repo::OPERATION_CODE_SEQUENCE;
use crate::repository::{
    BatchFanOutEntity, BatchFanOutRepository, CodeFormat, FinishedProductRepository,
    MachineRepository, MaterialBatchRepository, OperationRecordRepository,
    QualityEvaluationRepository, SequenceRepository,
};
use chrono::NaiveDateTime;
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

// ==========================================
// 请求 / 结果
// ==========================================

/// 分发结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanOutReport {
    pub batch_code: String,
    pub process_time: NaiveDateTime,
    pub material_batch_id: Option<String>,
    pub orphan_policy: OrphanPolicy,
    pub operations: Vec<OperationRecord>,
    pub finished_products: Vec<FinishedProductRecord>,
    pub quality_evaluations: Vec<QualityEvaluationRecord>,
    pub purged_finished_products: usize,
    pub purged_quality_evaluations: usize,
    pub adopted_finished_products: usize,
}

/// 单机台操作记录请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateSingleOperationRequest {
    pub batch_code: String,
    pub machine_name: String,
    #[serde(default)]
    pub stages: OperationStages,
    pub process_time: Option<NaiveDateTime>,
    pub material_batch_id: Option<String>,
    pub operator: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SingleOperationOutcome {
    pub operation: OperationRecord,
    pub finished_product: Option<FinishedProductRecord>,
}

/// 级联删除结果（各类记录删除条数）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeDeleteReport {
    pub quality_evaluations: usize,
    pub finished_products: usize,
    pub operations: usize,
    pub ledger_cleared: bool,
}

impl CascadeDeleteReport {
    pub fn total(&self) -> usize {
        self.quality_evaluations + self.finished_products + self.operations
    }
}

// ==========================================
// OperationFanOutEngine
// ==========================================
pub struct OperationFanOutEngine<C>
where
    C: FanOutConfigReader,
{
    conn: Arc<Mutex<Connection>>,
    config: Arc<C>,
}

impl<C> OperationFanOutEngine<C>
where
    C: FanOutConfigReader,
{
    pub fn new(conn: Arc<Mutex<Connection>>, config: Arc<C>) -> Self {
        Self { conn, config }
    }

    fn get_conn(&self) -> EngineResult<MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()).into())
    }

    /// 按批次号分发
    ///
    /// # 流程
    /// 1. 读取配置（孤儿策略、操作编码格式）
    /// 2. 台账/操作记录查重 → DuplicateBatch
    /// 3. 按 (批次号, 加工时间) 查原料批次（可缺失）
    /// 4. 按孤儿策略处理已有成品/评价
    /// 5. 每个机台: 操作记录；有原料批次时再加成品 + 关联评价
    /// 6. 写台账行，提交
    #[instrument(skip(self))]
    pub async fn fan_out(
        &self,
        batch_code: &str,
        process_time: NaiveDateTime,
    ) -> EngineResult<FanOutReport> {
        let batch_code = require_batch_code(batch_code)?;

        let policy = self
            .config
            .get_orphan_policy()
            .await
            .map_err(|e| EngineError::Config(e.to_string()))?;
        let code_format = self
            .config
            .get_operation_code_format()
            .await
            .map_err(|e| EngineError::Config(e.to_string()))?;

        let report = self.fan_out_in_tx(&batch_code, process_time, policy, &code_format)?;

        info!(
            batch_code = %report.batch_code,
            operations = report.operations.len(),
            finished_products = report.finished_products.len(),
            quality_evaluations = report.quality_evaluations.len(),
            material_batch = report.material_batch_id.is_some(),
            "批次分发完成"
        );
        Ok(report)
    }

    fn fan_out_in_tx(
        &self,
        batch_code: &str,
        process_time: NaiveDateTime,
        policy: OrphanPolicy,
        code_format: &CodeFormat,
    ) -> EngineResult<FanOutReport> {
        let _perf = PerfGuard::new("fan_out");

        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // === 步骤 1: 查重 ===
        if BatchFanOutRepository::find_tx(&tx, batch_code)?.is_some()
            || OperationRecordRepository::count_by_batch_code_tx(&tx, batch_code)? > 0
        {
            return Err(EngineError::DuplicateBatch {
                batch_code: batch_code.to_string(),
                machine_name: None,
            });
        }

        // === 步骤 2: 原料批次 ===
        let material = MaterialBatchRepository::find_by_code_tx(&tx, batch_code, &process_time)?;
        if material.is_none() {
            debug!(batch_code, "未找到原料批次，仅生成操作记录");
        }

        let mut report = FanOutReport {
            batch_code: batch_code.to_string(),
            process_time,
            material_batch_id: material.as_ref().map(|m| m.material_batch_id.clone()),
            orphan_policy: policy,
            operations: Vec::new(),
            finished_products: Vec::new(),
            quality_evaluations: Vec::new(),
            purged_finished_products: 0,
            purged_quality_evaluations: 0,
            adopted_finished_products: 0,
        };

        // === 步骤 3: 孤儿记录 ===
        let orphan_products = FinishedProductRepository::count_by_batch_code_tx(&tx, batch_code)?;
        let orphan_evaluations = QualityEvaluationRepository::count_by_batch_code_tx(&tx, batch_code)?;
        if orphan_products > 0 || orphan_evaluations > 0 {
            match policy {
                OrphanPolicy::Reject => {
                    return Err(EngineError::OrphanedRecords {
                        batch_code: batch_code.to_string(),
                        finished_products: orphan_products,
                        quality_evaluations: orphan_evaluations,
                    });
                }
                OrphanPolicy::Purge => {
                    // 评价先删：其批次范围依赖成品记录
                    report.purged_quality_evaluations =
                        QualityEvaluationRepository::delete_by_batch_code_tx(&tx, batch_code)?;
                    report.purged_finished_products =
                        FinishedProductRepository::delete_by_batch_code_tx(&tx, batch_code)?;
                    warn!(
                        batch_code,
                        finished_products = report.purged_finished_products,
                        quality_evaluations = report.purged_quality_evaluations,
                        "分发前清除孤儿记录"
                    );
                }
                OrphanPolicy::Adopt => {
                    info!(
                        batch_code,
                        finished_products = orphan_products,
                        quality_evaluations = orphan_evaluations,
                        "沿用已有成品/评价记录"
                    );
                }
            }
        }

        // === 步骤 4: 逐机台生成 ===
        let machines = MachineRepository::list_all_tx(&tx)?;
        for machine in &machines {
            let operation_code =
                SequenceRepository::next_code_tx(&tx, OPERATION_CODE_SEQUENCE, code_format)?;
            let operation = OperationRecord::for_machine(
                operation_code,
                batch_code,
                machine,
                Some(process_time),
                report.material_batch_id.clone(),
                OperationStages::default(),
            );
            OperationRecordRepository::insert_tx(&tx, &operation)?;
            debug!(
                operation_code = %operation.operation_code,
                machine = %machine.machine_name,
                status = %machine.status,
                "操作记录已生成"
            );
            report.operations.push(operation);

            let Some(material) = material.as_ref() else {
                continue;
            };

            let adopted = match policy {
                OrphanPolicy::Adopt => FinishedProductRepository::find_by_batch_and_machine_tx(
                    &tx,
                    batch_code,
                    &machine.machine_id,
                )?,
                _ => None,
            };

            let product = match adopted {
                Some(existing) => {
                    report.adopted_finished_products += 1;
                    existing
                }
                None => {
                    let product = FinishedProductRecord::new(
                        batch_code.to_string(),
                        machine.machine_id.clone(),
                        process_time,
                        Some(material.material_batch_id.clone()),
                        material.goods_name.clone(),
                        CategoryWeights::default(),
                    );
                    FinishedProductRepository::insert_tx(&tx, &product)?;
                    report.finished_products.push(product.clone());
                    product
                }
            };

            if QualityEvaluationRepository::find_by_finished_product_tx(
                &tx,
                &product.finished_product_id,
            )?
            .is_none()
            {
                let evaluation = QualityEvaluationRecord::linked_to(&product);
                QualityEvaluationRepository::insert_tx(&tx, &evaluation)?;
                report.quality_evaluations.push(evaluation);
            }
        }

        // === 步骤 5: 台账 ===
        BatchFanOutRepository::insert_tx(
            &tx,
            &BatchFanOutEntity {
                batch_code: batch_code.to_string(),
                process_time,
                material_batch_id: report.material_batch_id.clone(),
                machine_count: machines.len(),
                created_at: chrono::Local::now().naive_local(),
            },
        )?;

        tx.commit()?;
        Ok(report)
    }

    /// 单机台操作记录
    ///
    /// # 规则
    /// - 唯一性按 (批次号, 机台名) 判断 → DuplicateBatch（带机台名）
    /// - 机台名必须能解析 → ReferenceNotFound
    /// - material_batch_id 能解析时，同时生成一条成品记录
    #[instrument(skip(self, req), fields(batch_code = %req.batch_code, machine_name = %req.machine_name))]
    pub async fn create_single_operation(
        &self,
        req: &CreateSingleOperationRequest,
    ) -> EngineResult<SingleOperationOutcome> {
        let batch_code = require_batch_code(&req.batch_code)?;
        let machine_name = req.machine_name.trim();
        if machine_name.is_empty() {
            return Err(EngineError::Validation("machine_name 不能为空".to_string()));
        }
        req.stages.validate().map_err(EngineError::Validation)?;

        let code_format = self
            .config
            .get_operation_code_format()
            .await
            .map_err(|e| EngineError::Config(e.to_string()))?;

        let outcome = self.create_single_operation_in_tx(&batch_code, machine_name, req, &code_format)?;
        info!(
            operation_code = %outcome.operation.operation_code,
            with_finished_product = outcome.finished_product.is_some(),
            "单机台操作记录已创建"
        );
        Ok(outcome)
    }

    fn create_single_operation_in_tx(
        &self,
        batch_code: &str,
        machine_name: &str,
        req: &CreateSingleOperationRequest,
        code_format: &CodeFormat,
    ) -> EngineResult<SingleOperationOutcome> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let machine = MachineRepository::find_by_name_tx(&tx, machine_name)?
            .ok_or_else(|| EngineError::reference_not_found("Machine", machine_name))?;

        if OperationRecordRepository::exists_for_machine_tx(&tx, batch_code, &machine.machine_id)? {
            return Err(EngineError::DuplicateBatch {
                batch_code: batch_code.to_string(),
                machine_name: Some(machine.machine_name.clone()),
            });
        }

        let material = match req.material_batch_id.as_deref() {
            Some(id) => {
                let found = MaterialBatchRepository::find_by_id_tx(&tx, id)?;
                if found.is_none() {
                    debug!(material_batch_id = id, "原料批次不存在，跳过成品记录");
                }
                found
            }
            None => None,
        };

        let process_time = req
            .process_time
            .or_else(|| material.as_ref().map(|m| m.process_time));

        let operation_code = SequenceRepository::next_code_tx(&tx, OPERATION_CODE_SEQUENCE, code_format)?;
        let mut operation = OperationRecord::for_machine(
            operation_code,
            batch_code,
            &machine,
            process_time,
            material.as_ref().map(|m| m.material_batch_id.clone()),
            req.stages,
        );
        operation.operator = req.operator.clone();
        operation.notes = req.notes.clone();
        OperationRecordRepository::insert_tx(&tx, &operation)?;

        let finished_product = match material {
            Some(material) => {
                let product = FinishedProductRecord::new(
                    batch_code.to_string(),
                    machine.machine_id.clone(),
                    process_time.unwrap_or(material.process_time),
                    Some(material.material_batch_id.clone()),
                    material.goods_name.clone(),
                    CategoryWeights::default(),
                );
                FinishedProductRepository::insert_tx(&tx, &product)?;
                Some(product)
            }
            None => None,
        };

        tx.commit()?;
        Ok(SingleOperationOutcome {
            operation,
            finished_product,
        })
    }

    /// 合并工艺参数并重算总干燥时长
    #[instrument(skip(self, patch))]
    pub fn update_operation(&self, operation_id: &str, patch: &OperationPatch) -> EngineResult<OperationRecord> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut record = OperationRecordRepository::find_by_id_tx(&tx, operation_id)?
            .ok_or_else(|| EngineError::not_found("OperationRecord", operation_id))?;

        record.apply_patch(patch);
        record.stages.validate().map_err(EngineError::Validation)?;
        OperationRecordRepository::update_tx(&tx, &record)?;

        tx.commit()?;
        debug!(total_dry_time_min = record.total_dry_time_min, "工艺参数已更新");
        Ok(record)
    }

    /// 批次级联删除: 评价 → 成品 → 操作记录 → 台账
    ///
    /// 三类记录均为 0 条时返回 NotFound（残留台账行仍会被清除）
    #[instrument(skip(self))]
    pub fn delete_by_batch_code(&self, batch_code: &str) -> EngineResult<CascadeDeleteReport> {
        let batch_code = require_batch_code(batch_code)?;
        let _perf = PerfGuard::new("delete_by_batch_code");

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let report = CascadeDeleteReport {
            quality_evaluations: QualityEvaluationRepository::delete_by_batch_code_tx(&tx, &batch_code)?,
            finished_products: FinishedProductRepository::delete_by_batch_code_tx(&tx, &batch_code)?,
            operations: OperationRecordRepository::delete_by_batch_code_tx(&tx, &batch_code)?,
            ledger_cleared: BatchFanOutRepository::delete_tx(&tx, &batch_code)? > 0,
        };

        tx.commit()?;

        if report.total() == 0 {
            return Err(EngineError::not_found("Batch", &batch_code));
        }

        info!(
            batch_code = %batch_code,
            quality_evaluations = report.quality_evaluations,
            finished_products = report.finished_products,
            operations = report.operations,
            "批次级联删除完成"
        );
        Ok(report)
    }

    /// 台账行存在或已有操作记录即视为 FANNED_OUT
    pub fn batch_state(&self, batch_code: &str) -> EngineResult<BatchState> {
        let conn = self.get_conn()?;
        let fanned_out = BatchFanOutRepository::find_tx(&conn, batch_code)?.is_some()
            || OperationRecordRepository::count_by_batch_code_tx(&conn, batch_code)? > 0;
        Ok(if fanned_out {
            BatchState::FannedOut
        } else {
            BatchState::Empty
        })
    }

    pub fn get_operation(&self, operation_id: &str) -> EngineResult<OperationRecord> {
        let conn = self.get_conn()?;
        OperationRecordRepository::find_by_id_tx(&conn, operation_id)?
            .ok_or_else(|| EngineError::not_found("OperationRecord", operation_id))
    }

    pub fn list_operations(&self, batch_code: &str) -> EngineResult<Vec<OperationRecord>> {
        let conn = self.get_conn()?;
        Ok(OperationRecordRepository::list_by_batch_code_tx(&conn, batch_code)?)
    }
}

fn require_batch_code(batch_code: &str) -> EngineResult<String> {
    let trimmed = batch_code.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation("batch_code 不能为空".to_string()));
    }
    Ok(trimmed.to_string())
}
