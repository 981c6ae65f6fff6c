// ==========================================
// 生产批次追踪系统 - 主数据 API
// ==========================================
// 职责: 机台登记、原料批次登记
// 说明: 主数据对分发引擎只读，变更在此层完成并留痕
// ==========================================

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde_json::json;

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, FanOutConfigReader};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::machine::Machine;
use crate::domain::material_batch::{MaterialBatch, NewMaterialBatch};
use crate::domain::types::MachineStatus;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::{MachineRepository, MaterialBatchRepository};

pub struct MasterDataApi {
    machine_repo: Arc<MachineRepository>,
    material_batch_repo: Arc<MaterialBatchRepository>,
    config: Arc<ConfigManager>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl MasterDataApi {
    pub fn new(
        machine_repo: Arc<MachineRepository>,
        material_batch_repo: Arc<MaterialBatchRepository>,
        config: Arc<ConfigManager>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            machine_repo,
            material_batch_repo,
            config,
            action_log_repo,
        }
    }

    // ==========================================
    // 机台
    // ==========================================

    pub fn register_machine(
        &self,
        machine_code: &str,
        machine_name: &str,
        status: MachineStatus,
        operator: &str,
    ) -> ApiResult<Machine> {
        let code = machine_code.trim();
        let name = machine_name.trim();
        if code.is_empty() || name.is_empty() {
            return Err(ApiError::InvalidInput("机台编码与名称不能为空".to_string()));
        }

        let machine = Machine::new(code.to_string(), name.to_string(), status);
        self.machine_repo.insert(&machine)?;

        self.log_action(
            ActionLog::new(ActionType::RegisterMachine, None, operator).with_payload(&machine),
        );
        Ok(machine)
    }

    pub fn get_machine(&self, machine_id: &str) -> ApiResult<Machine> {
        self.machine_repo
            .find_by_id(machine_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Machine(id={})不存在", machine_id)))
    }

    pub fn find_machine_by_name(&self, machine_name: &str) -> ApiResult<Option<Machine>> {
        Ok(self.machine_repo.find_by_name(machine_name)?)
    }

    pub fn list_machines(&self) -> ApiResult<Vec<Machine>> {
        Ok(self.machine_repo.list_all()?)
    }

    /// 状态变更只影响之后生成的操作记录快照
    pub fn update_machine_status(
        &self,
        machine_id: &str,
        status: MachineStatus,
        operator: &str,
    ) -> ApiResult<()> {
        self.machine_repo.update_status(machine_id, status)?;

        self.log_action(
            ActionLog::new(ActionType::UpdateMachineStatus, None, operator).with_payload(&json!({
                "machine_id": machine_id,
                "status": status,
            })),
        );
        Ok(())
    }

    pub fn delete_machine(&self, machine_id: &str) -> ApiResult<()> {
        if self.machine_repo.delete(machine_id)? == 0 {
            return Err(ApiError::NotFound(format!("Machine(id={})不存在", machine_id)));
        }
        Ok(())
    }

    // ==========================================
    // 原料批次
    // ==========================================

    /// 登记原料批次；未提供批次号时按配置格式自动生成
    pub async fn register_material_batch(
        &self,
        request: &NewMaterialBatch,
        operator: &str,
    ) -> ApiResult<MaterialBatch> {
        let has_code = request
            .batch_code
            .as_deref()
            .is_some_and(|code| !code.trim().is_empty());

        let batch = if has_code {
            self.material_batch_repo.create(request)?
        } else {
            let format = self
                .config
                .get_batch_code_format()
                .await
                .map_err(|e| ApiError::ConfigError(e.to_string()))?;
            self.material_batch_repo
                .create_with_generated_code(request, &format)?
        };

        self.log_action(
            ActionLog::new(
                ActionType::RegisterMaterialBatch,
                Some(batch.batch_code.clone()),
                operator,
            )
            .with_payload(&json!({
                "material_batch_id": batch.material_batch_id,
                "process_time": batch.process_time,
                "goods_name": batch.goods_name,
                "input_weight_kg": batch.input_weight_kg,
            })),
        );
        Ok(batch)
    }

    pub fn get_material_batch(&self, material_batch_id: &str) -> ApiResult<MaterialBatch> {
        self.material_batch_repo
            .find_by_id(material_batch_id)?
            .ok_or_else(|| ApiError::NotFound(format!("MaterialBatch(id={})不存在", material_batch_id)))
    }

    pub fn find_material_batch(
        &self,
        batch_code: &str,
        process_time: &NaiveDateTime,
    ) -> ApiResult<Option<MaterialBatch>> {
        Ok(self.material_batch_repo.find_by_code(batch_code, process_time)?)
    }

    pub fn list_material_batches(&self, batch_code: &str) -> ApiResult<Vec<MaterialBatch>> {
        Ok(self.material_batch_repo.list_by_batch_code(batch_code)?)
    }

    fn log_action(&self, log: ActionLog) {
        if let Err(e) = self.action_log_repo.insert(&log) {
            tracing::warn!(action_type = %log.action_type, error = %e, "ActionLog 写入失败");
        }
    }
}
