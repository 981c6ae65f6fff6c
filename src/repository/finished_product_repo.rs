// ==========================================
// 生产批次追踪系统 - 成品产出仓储
// ==========================================
// 职责: 管理 finished_product 表
// 约束: (batch_code, machine_id) 唯一
// 红线: 派生列（总重/百分比）只由领域层重算后写入
// ==========================================

use crate::domain::finished_product::{CategoryWeights, FinishedProductRecord, YieldPercentages};
use crate::repository::error::RepositoryResult;
use crate::repository::{format_ts, get_ts};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};

const FINISHED_PRODUCT_COLUMNS: &str = r#"
    finished_product_id, batch_code, process_time, machine_id, material_batch_id, goods_name,
    grade_a_kg, grade_b_kg, grade_b_head_kg, grade_c_kg,
    large_scrap_kg, small_scrap_kg, reject_kg, wet_kg,
    total_weight_kg,
    grade_a_pct, grade_b_pct, grade_b_head_pct, grade_c_pct,
    large_scrap_pct, small_scrap_pct, reject_pct, wet_pct,
    notes, created_at, updated_at
"#;

/// 无状态仓储：全部操作在调用方持有的连接/事务内执行
pub struct FinishedProductRepository;

impl FinishedProductRepository {
    pub fn insert_tx(conn: &Connection, record: &FinishedProductRecord) -> RepositoryResult<()> {
        let w = &record.weights;
        let p = &record.percentages;
        conn.execute(
            r#"
            INSERT INTO finished_product (
                finished_product_id, batch_code, process_time, machine_id, material_batch_id, goods_name,
                grade_a_kg, grade_b_kg, grade_b_head_kg, grade_c_kg,
                large_scrap_kg, small_scrap_kg, reject_kg, wet_kg,
                total_weight_kg,
                grade_a_pct, grade_b_pct, grade_b_head_pct, grade_c_pct,
                large_scrap_pct, small_scrap_pct, reject_pct, wet_pct,
                notes, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                ?15,
                ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23,
                ?24, ?25, ?26
            )
            "#,
            params![
                record.finished_product_id,
                record.batch_code,
                format_ts(&record.process_time),
                record.machine_id,
                record.material_batch_id,
                record.goods_name,
                w.grade_a,
                w.grade_b,
                w.grade_b_head,
                w.grade_c,
                w.large_scrap,
                w.small_scrap,
                w.reject,
                w.wet,
                record.total_weight_kg,
                p.grade_a,
                p.grade_b,
                p.grade_b_head,
                p.grade_c,
                p.large_scrap,
                p.small_scrap,
                p.reject,
                p.wet,
                record.notes,
                format_ts(&record.created_at),
                format_ts(&record.updated_at),
            ],
        )?;
        Ok(())
    }

    /// 写回重量与派生列
    pub fn update_weights_tx(conn: &Connection, record: &FinishedProductRecord) -> RepositoryResult<usize> {
        let w = &record.weights;
        let p = &record.percentages;
        let affected = conn.execute(
            r#"
            UPDATE finished_product SET
                grade_a_kg = ?1, grade_b_kg = ?2, grade_b_head_kg = ?3, grade_c_kg = ?4,
                large_scrap_kg = ?5, small_scrap_kg = ?6, reject_kg = ?7, wet_kg = ?8,
                total_weight_kg = ?9,
                grade_a_pct = ?10, grade_b_pct = ?11, grade_b_head_pct = ?12, grade_c_pct = ?13,
                large_scrap_pct = ?14, small_scrap_pct = ?15, reject_pct = ?16, wet_pct = ?17,
                notes = ?18, updated_at = ?19
            WHERE finished_product_id = ?20
            "#,
            params![
                w.grade_a,
                w.grade_b,
                w.grade_b_head,
                w.grade_c,
                w.large_scrap,
                w.small_scrap,
                w.reject,
                w.wet,
                record.total_weight_kg,
                p.grade_a,
                p.grade_b,
                p.grade_b_head,
                p.grade_c,
                p.large_scrap,
                p.small_scrap,
                p.reject,
                p.wet,
                record.notes,
                format_ts(&record.updated_at),
                record.finished_product_id,
            ],
        )?;
        Ok(affected)
    }

    pub fn find_by_id_tx(conn: &Connection, finished_product_id: &str) -> RepositoryResult<Option<FinishedProductRecord>> {
        let sql = format!(
            "SELECT {} FROM finished_product WHERE finished_product_id = ?1",
            FINISHED_PRODUCT_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![finished_product_id], Self::map_row)
            .optional()?)
    }

    pub fn find_by_batch_and_machine_tx(
        conn: &Connection,
        batch_code: &str,
        machine_id: &str,
    ) -> RepositoryResult<Option<FinishedProductRecord>> {
        let sql = format!(
            "SELECT {} FROM finished_product WHERE batch_code = ?1 AND machine_id = ?2",
            FINISHED_PRODUCT_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![batch_code, machine_id], Self::map_row)
            .optional()?)
    }

    pub fn list_by_batch_code_tx(conn: &Connection, batch_code: &str) -> RepositoryResult<Vec<FinishedProductRecord>> {
        let sql = format!(
            "SELECT {} FROM finished_product WHERE batch_code = ?1 ORDER BY machine_id ASC",
            FINISHED_PRODUCT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![batch_code], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn count_by_batch_code_tx(conn: &Connection, batch_code: &str) -> RepositoryResult<usize> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM finished_product WHERE batch_code = ?1",
            params![batch_code],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// 单条删除；关联评价的 finished_product_id 由外键置空
    pub fn delete_by_id_tx(conn: &Connection, finished_product_id: &str) -> RepositoryResult<usize> {
        let affected = conn.execute(
            "DELETE FROM finished_product WHERE finished_product_id = ?1",
            params![finished_product_id],
        )?;
        Ok(affected)
    }

    pub fn delete_by_batch_code_tx(conn: &Connection, batch_code: &str) -> RepositoryResult<usize> {
        let affected = conn.execute(
            "DELETE FROM finished_product WHERE batch_code = ?1",
            params![batch_code],
        )?;
        Ok(affected)
    }

    fn map_row(row: &rusqlite::Row) -> SqliteResult<FinishedProductRecord> {
        Ok(FinishedProductRecord {
            finished_product_id: row.get(0)?,
            batch_code: row.get(1)?,
            process_time: get_ts(row, 2)?,
            machine_id: row.get(3)?,
            material_batch_id: row.get(4)?,
            goods_name: row.get(5)?,
            weights: CategoryWeights {
                grade_a: row.get(6)?,
                grade_b: row.get(7)?,
                grade_b_head: row.get(8)?,
                grade_c: row.get(9)?,
                large_scrap: row.get(10)?,
                small_scrap: row.get(11)?,
                reject: row.get(12)?,
                wet: row.get(13)?,
            },
            total_weight_kg: row.get(14)?,
            percentages: YieldPercentages {
                grade_a: row.get(15)?,
                grade_b: row.get(16)?,
                grade_b_head: row.get(17)?,
                grade_c: row.get(18)?,
                large_scrap: row.get(19)?,
                small_scrap: row.get(20)?,
                reject: row.get(21)?,
                wet: row.get(22)?,
            },
            notes: row.get(23)?,
            created_at: get_ts(row, 24)?,
            updated_at: get_ts(row, 25)?,
        })
    }
}
