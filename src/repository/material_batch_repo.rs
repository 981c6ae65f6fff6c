// ==========================================
// 生产批次追踪系统 - 原料批次仓储
// ==========================================
// 职责: 管理 material_batch 表，按 (批次号, 加工时间) 定位
// 说明: 批次号为空时在插入事务内由 code_sequence 生成
// ==========================================

use crate::domain::material_batch::{MaterialBatch, NewMaterialBatch};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sequence_repo::{CodeFormat, SequenceRepository};
use crate::repository::{format_ts, get_ts};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

const MATERIAL_BATCH_COLUMNS: &str = r#"
    material_batch_id, batch_code, process_time, goods_name, input_weight_kg,
    soak_time_min, soak_temperature_c, frying_temperature_c, notes,
    created_at, updated_at
"#;

/// 批次号序列族名
pub const BATCH_CODE_SEQUENCE: &str = "batch";

pub struct MaterialBatchRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MaterialBatchRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 登记原料批次（批次号由调用方给出）
    ///
    /// # 校验
    /// - batch_code 非空
    /// - goods_name 非空
    /// - input_weight_kg 有限且非负
    /// - process_time 缺省为当前时间
    pub fn create(&self, req: &NewMaterialBatch) -> RepositoryResult<MaterialBatch> {
        let batch_code = match req.batch_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => code.to_string(),
            _ => {
                return Err(RepositoryError::FieldValueError {
                    field: "batch_code".to_string(),
                    message: "批次号不能为空".to_string(),
                })
            }
        };
        Self::validate(req)?;

        let conn = self.get_conn()?;
        let batch = MaterialBatch::from_request(batch_code, Self::process_time_of(req), req);
        Self::insert_tx(&conn, &batch)?;
        Ok(batch)
    }

    /// 登记原料批次并自动分配批次号
    ///
    /// 同一事务内取下一个序号，跳过已被人工占用的编码；请求中的批次号被忽略
    pub fn create_with_generated_code(
        &self,
        req: &NewMaterialBatch,
        code_format: &CodeFormat,
    ) -> RepositoryResult<MaterialBatch> {
        Self::validate(req)?;

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let batch_code = loop {
            let candidate = SequenceRepository::next_code_tx(&tx, BATCH_CODE_SEQUENCE, code_format)?;
            if !Self::code_exists_tx(&tx, &candidate)? {
                break candidate;
            }
        };

        let batch = MaterialBatch::from_request(batch_code, Self::process_time_of(req), req);
        Self::insert_tx(&tx, &batch)?;

        tx.commit()?;
        Ok(batch)
    }

    pub fn find_by_id(&self, material_batch_id: &str) -> RepositoryResult<Option<MaterialBatch>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, material_batch_id)
    }

    /// 按 (批次号, 加工时间) 查找
    pub fn find_by_code(
        &self,
        batch_code: &str,
        process_time: &NaiveDateTime,
    ) -> RepositoryResult<Option<MaterialBatch>> {
        let conn = self.get_conn()?;
        Self::find_by_code_tx(&conn, batch_code, process_time)
    }

    /// 同一批次号下的所有加工时间
    pub fn list_by_batch_code(&self, batch_code: &str) -> RepositoryResult<Vec<MaterialBatch>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM material_batch WHERE batch_code = ?1 ORDER BY process_time ASC",
            MATERIAL_BATCH_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![batch_code], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    fn process_time_of(req: &NewMaterialBatch) -> NaiveDateTime {
        req.process_time
            .unwrap_or_else(|| chrono::Local::now().naive_local())
    }

    fn validate(req: &NewMaterialBatch) -> RepositoryResult<()> {
        if req.goods_name.trim().is_empty() {
            return Err(RepositoryError::FieldValueError {
                field: "goods_name".to_string(),
                message: "品名不能为空".to_string(),
            });
        }
        if !req.input_weight_kg.is_finite() || req.input_weight_kg < 0.0 {
            return Err(RepositoryError::FieldValueError {
                field: "input_weight_kg".to_string(),
                message: format!("投料重量非法: {}", req.input_weight_kg),
            });
        }
        Ok(())
    }

    // ==========================================
    // 事务内操作
    // ==========================================

    pub fn insert_tx(conn: &Connection, batch: &MaterialBatch) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO material_batch (
                material_batch_id, batch_code, process_time, goods_name, input_weight_kg,
                soak_time_min, soak_temperature_c, frying_temperature_c, notes,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                batch.material_batch_id,
                batch.batch_code,
                format_ts(&batch.process_time),
                batch.goods_name,
                batch.input_weight_kg,
                batch.soak_time_min,
                batch.soak_temperature_c,
                batch.frying_temperature_c,
                batch.notes,
                format_ts(&batch.created_at),
                format_ts(&batch.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id_tx(conn: &Connection, material_batch_id: &str) -> RepositoryResult<Option<MaterialBatch>> {
        let sql = format!(
            "SELECT {} FROM material_batch WHERE material_batch_id = ?1",
            MATERIAL_BATCH_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![material_batch_id], Self::map_row)
            .optional()?)
    }

    pub fn find_by_code_tx(
        conn: &Connection,
        batch_code: &str,
        process_time: &NaiveDateTime,
    ) -> RepositoryResult<Option<MaterialBatch>> {
        let sql = format!(
            "SELECT {} FROM material_batch WHERE batch_code = ?1 AND process_time = ?2",
            MATERIAL_BATCH_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![batch_code, format_ts(process_time)], Self::map_row)
            .optional()?)
    }

    fn code_exists_tx(conn: &Connection, batch_code: &str) -> RepositoryResult<bool> {
        let exists = conn
            .query_row(
                "SELECT 1 FROM material_batch WHERE batch_code = ?1 LIMIT 1",
                params![batch_code],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        Ok(exists)
    }

    fn map_row(row: &rusqlite::Row) -> SqliteResult<MaterialBatch> {
        Ok(MaterialBatch {
            material_batch_id: row.get(0)?,
            batch_code: row.get(1)?,
            process_time: get_ts(row, 2)?,
            goods_name: row.get(3)?,
            input_weight_kg: row.get(4)?,
            soak_time_min: row.get(5)?,
            soak_temperature_c: row.get(6)?,
            frying_temperature_c: row.get(7)?,
            notes: row.get(8)?,
            created_at: get_ts(row, 9)?,
            updated_at: get_ts(row, 10)?,
        })
    }
}
