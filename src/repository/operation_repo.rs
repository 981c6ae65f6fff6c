// ==========================================
// 生产批次追踪系统 - 机台操作记录仓储
// ==========================================
// 职责: 管理 operation_record 表
// 约束: (batch_code, machine_id) 唯一
// ==========================================

use crate::domain::operation::{OperationRecord, OperationStages, StageParams};
use crate::repository::error::RepositoryResult;
use crate::repository::{format_ts, get_enum, get_opt_ts, get_ts};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};

const OPERATION_COLUMNS: &str = r#"
    operation_id, operation_code, batch_code, process_time, material_batch_id,
    machine_id, machine_name, machine_status,
    stage1_duration_min, stage1_temperature_c, stage1_pressure_kpa,
    stage2_duration_min, stage2_temperature_c, stage2_pressure_kpa,
    stage3_duration_min, stage3_temperature_c, stage3_pressure_kpa,
    stage4_duration_min, stage4_temperature_c, stage4_pressure_kpa,
    total_dry_time_min, operator, notes, created_at, updated_at
"#;

/// 操作编码序列族名
pub const OPERATION_CODE_SEQUENCE: &str = "operation";

/// 无状态仓储：全部操作在调用方持有的连接/事务内执行
pub struct OperationRecordRepository;

impl OperationRecordRepository {
    pub fn insert_tx(conn: &Connection, record: &OperationRecord) -> RepositoryResult<()> {
        let s = &record.stages;
        conn.execute(
            r#"
            INSERT INTO operation_record (
                operation_id, operation_code, batch_code, process_time, material_batch_id,
                machine_id, machine_name, machine_status,
                stage1_duration_min, stage1_temperature_c, stage1_pressure_kpa,
                stage2_duration_min, stage2_temperature_c, stage2_pressure_kpa,
                stage3_duration_min, stage3_temperature_c, stage3_pressure_kpa,
                stage4_duration_min, stage4_temperature_c, stage4_pressure_kpa,
                total_dry_time_min, operator, notes, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8,
                ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20,
                ?21, ?22, ?23, ?24, ?25
            )
            "#,
            params![
                record.operation_id,
                record.operation_code,
                record.batch_code,
                record.process_time.as_ref().map(format_ts),
                record.material_batch_id,
                record.machine_id,
                record.machine_name,
                record.machine_status.as_str(),
                s.stage1.duration_min,
                s.stage1.temperature_c,
                s.stage1.pressure_kpa,
                s.stage2.duration_min,
                s.stage2.temperature_c,
                s.stage2.pressure_kpa,
                s.stage3.duration_min,
                s.stage3.temperature_c,
                s.stage3.pressure_kpa,
                s.stage4.duration_min,
                s.stage4.temperature_c,
                s.stage4.pressure_kpa,
                record.total_dry_time_min,
                record.operator,
                record.notes,
                format_ts(&record.created_at),
                format_ts(&record.updated_at),
            ],
        )?;
        Ok(())
    }

    /// 更新工艺与人工字段（身份与快照字段不可改）
    pub fn update_tx(conn: &Connection, record: &OperationRecord) -> RepositoryResult<usize> {
        let s = &record.stages;
        let affected = conn.execute(
            r#"
            UPDATE operation_record SET
                stage1_duration_min = ?1, stage1_temperature_c = ?2, stage1_pressure_kpa = ?3,
                stage2_duration_min = ?4, stage2_temperature_c = ?5, stage2_pressure_kpa = ?6,
                stage3_duration_min = ?7, stage3_temperature_c = ?8, stage3_pressure_kpa = ?9,
                stage4_duration_min = ?10, stage4_temperature_c = ?11, stage4_pressure_kpa = ?12,
                total_dry_time_min = ?13, operator = ?14, notes = ?15, updated_at = ?16
            WHERE operation_id = ?17
            "#,
            params![
                s.stage1.duration_min,
                s.stage1.temperature_c,
                s.stage1.pressure_kpa,
                s.stage2.duration_min,
                s.stage2.temperature_c,
                s.stage2.pressure_kpa,
                s.stage3.duration_min,
                s.stage3.temperature_c,
                s.stage3.pressure_kpa,
                s.stage4.duration_min,
                s.stage4.temperature_c,
                s.stage4.pressure_kpa,
                record.total_dry_time_min,
                record.operator,
                record.notes,
                format_ts(&record.updated_at),
                record.operation_id,
            ],
        )?;
        Ok(affected)
    }

    pub fn find_by_id_tx(conn: &Connection, operation_id: &str) -> RepositoryResult<Option<OperationRecord>> {
        let sql = format!(
            "SELECT {} FROM operation_record WHERE operation_id = ?1",
            OPERATION_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![operation_id], Self::map_row)
            .optional()?)
    }

    pub fn list_by_batch_code_tx(conn: &Connection, batch_code: &str) -> RepositoryResult<Vec<OperationRecord>> {
        let sql = format!(
            "SELECT {} FROM operation_record WHERE batch_code = ?1 ORDER BY operation_code ASC",
            OPERATION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![batch_code], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn count_by_batch_code_tx(conn: &Connection, batch_code: &str) -> RepositoryResult<usize> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM operation_record WHERE batch_code = ?1",
            params![batch_code],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn exists_for_machine_tx(conn: &Connection, batch_code: &str, machine_id: &str) -> RepositoryResult<bool> {
        let exists = conn
            .query_row(
                "SELECT 1 FROM operation_record WHERE batch_code = ?1 AND machine_id = ?2",
                params![batch_code, machine_id],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        Ok(exists)
    }

    pub fn delete_by_batch_code_tx(conn: &Connection, batch_code: &str) -> RepositoryResult<usize> {
        let affected = conn.execute(
            "DELETE FROM operation_record WHERE batch_code = ?1",
            params![batch_code],
        )?;
        Ok(affected)
    }

    fn map_row(row: &rusqlite::Row) -> SqliteResult<OperationRecord> {
        let stage = |base: usize| -> SqliteResult<StageParams> {
            Ok(StageParams {
                duration_min: row.get(base)?,
                temperature_c: row.get(base + 1)?,
                pressure_kpa: row.get(base + 2)?,
            })
        };

        Ok(OperationRecord {
            operation_id: row.get(0)?,
            operation_code: row.get(1)?,
            batch_code: row.get(2)?,
            process_time: get_opt_ts(row, 3)?,
            material_batch_id: row.get(4)?,
            machine_id: row.get(5)?,
            machine_name: row.get(6)?,
            machine_status: get_enum(row, 7)?,
            stages: OperationStages {
                stage1: stage(8)?,
                stage2: stage(11)?,
                stage3: stage(14)?,
                stage4: stage(17)?,
            },
            total_dry_time_min: row.get(20)?,
            operator: row.get(21)?,
            notes: row.get(22)?,
            created_at: get_ts(row, 23)?,
            updated_at: get_ts(row, 24)?,
        })
    }
}
