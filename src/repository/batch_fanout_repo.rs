// ==========================================
// 生产批次追踪系统 - 批次分发台账仓储
// ==========================================
// 职责: 管理 batch_fanout 表（每个批次号至多一行）
// 说明: 行存在即 FANNED_OUT；主键是并发 fan_out 的存储层兜底
// ==========================================

use crate::repository::error::RepositoryResult;
use crate::repository::{format_ts, get_ts};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

/// 批次分发台账实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFanOutEntity {
    pub batch_code: String,
    pub process_time: NaiveDateTime,
    pub material_batch_id: Option<String>,
    pub machine_count: usize,
    pub created_at: NaiveDateTime,
}

pub struct BatchFanOutRepository;

impl BatchFanOutRepository {
    pub fn insert_tx(conn: &Connection, entity: &BatchFanOutEntity) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO batch_fanout (batch_code, process_time, material_batch_id, machine_count, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                entity.batch_code,
                format_ts(&entity.process_time),
                entity.material_batch_id,
                entity.machine_count as i64,
                format_ts(&entity.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn find_tx(conn: &Connection, batch_code: &str) -> RepositoryResult<Option<BatchFanOutEntity>> {
        let entity = conn
            .query_row(
                r#"
                SELECT batch_code, process_time, material_batch_id, machine_count, created_at
                FROM batch_fanout WHERE batch_code = ?1
                "#,
                params![batch_code],
                |row| {
                    Ok(BatchFanOutEntity {
                        batch_code: row.get(0)?,
                        process_time: get_ts(row, 1)?,
                        material_batch_id: row.get(2)?,
                        machine_count: row.get::<_, i64>(3)? as usize,
                        created_at: get_ts(row, 4)?,
                    })
                },
            )
            .optional()?;
        Ok(entity)
    }

    pub fn delete_tx(conn: &Connection, batch_code: &str) -> RepositoryResult<usize> {
        let affected = conn.execute("DELETE FROM batch_fanout WHERE batch_code = ?1", params![batch_code])?;
        Ok(affected)
    }
}
