// ==========================================
// 生产批次追踪系统 - 质量评价仓储
// ==========================================
// 职责: 管理 quality_evaluation 表
// 说明: sync_percentages_tx 是成品 → 评价百分比下推的唯一写入口
// ==========================================

use crate::domain::finished_product::YieldPercentages;
use crate::domain::quality_evaluation::{QualityEvaluationRecord, SensoryFields};
use crate::repository::error::RepositoryResult;
use crate::repository::{format_ts, get_opt_ts, get_ts};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};

const QUALITY_EVALUATION_COLUMNS: &str = r#"
    quality_evaluation_id, finished_product_id, batch_code, process_time, machine_id, goods_name,
    grade_a_pct, grade_b_pct, grade_b_head_pct, grade_c_pct,
    large_scrap_pct, small_scrap_pct, reject_pct, wet_pct,
    color, aroma, taste, sweetness, crispness, overall_remark, suggested_adjustment,
    evaluator, created_at, updated_at
"#;

/// 属于某批次的评价：自身批次号匹配，或挂在该批次的成品记录下
const BATCH_SCOPE: &str = r#"
    batch_code = ?1
    OR finished_product_id IN (SELECT finished_product_id FROM finished_product WHERE batch_code = ?1)
"#;

/// 无状态仓储：全部操作在调用方持有的连接/事务内执行
pub struct QualityEvaluationRepository;

impl QualityEvaluationRepository {
    pub fn list_by_batch_code_tx(conn: &Connection, batch_code: &str) -> RepositoryResult<Vec<QualityEvaluationRecord>> {
        let sql = format!(
            "SELECT {} FROM quality_evaluation WHERE {} ORDER BY created_at ASC, quality_evaluation_id ASC",
            QUALITY_EVALUATION_COLUMNS, BATCH_SCOPE
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![batch_code], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn insert_tx(conn: &Connection, record: &QualityEvaluationRecord) -> RepositoryResult<()> {
        let p = &record.percentages;
        let s = &record.sensory;
        conn.execute(
            r#"
            INSERT INTO quality_evaluation (
                quality_evaluation_id, finished_product_id, batch_code, process_time, machine_id, goods_name,
                grade_a_pct, grade_b_pct, grade_b_head_pct, grade_c_pct,
                large_scrap_pct, small_scrap_pct, reject_pct, wet_pct,
                color, aroma, taste, sweetness, crispness, overall_remark, suggested_adjustment,
                evaluator, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                ?15, ?16, ?17, ?18, ?19, ?20, ?21,
                ?22, ?23, ?24
            )
            "#,
            params![
                record.quality_evaluation_id,
                record.finished_product_id,
                record.batch_code,
                record.process_time.as_ref().map(format_ts),
                record.machine_id,
                record.goods_name,
                p.grade_a,
                p.grade_b,
                p.grade_b_head,
                p.grade_c,
                p.large_scrap,
                p.small_scrap,
                p.reject,
                p.wet,
                s.color,
                s.aroma,
                s.taste,
                s.sweetness,
                s.crispness,
                s.overall_remark,
                s.suggested_adjustment,
                record.evaluator,
                format_ts(&record.created_at),
                format_ts(&record.updated_at),
            ],
        )?;
        Ok(())
    }

    /// 写回百分比、感官字段与评价人
    pub fn update_tx(conn: &Connection, record: &QualityEvaluationRecord) -> RepositoryResult<usize> {
        let p = &record.percentages;
        let s = &record.sensory;
        let affected = conn.execute(
            r#"
            UPDATE quality_evaluation SET
                grade_a_pct = ?1, grade_b_pct = ?2, grade_b_head_pct = ?3, grade_c_pct = ?4,
                large_scrap_pct = ?5, small_scrap_pct = ?6, reject_pct = ?7, wet_pct = ?8,
                color = ?9, aroma = ?10, taste = ?11, sweetness = ?12, crispness = ?13,
                overall_remark = ?14, suggested_adjustment = ?15,
                evaluator = ?16, updated_at = ?17
            WHERE quality_evaluation_id = ?18
            "#,
            params![
                p.grade_a,
                p.grade_b,
                p.grade_b_head,
                p.grade_c,
                p.large_scrap,
                p.small_scrap,
                p.reject,
                p.wet,
                s.color,
                s.aroma,
                s.taste,
                s.sweetness,
                s.crispness,
                s.overall_remark,
                s.suggested_adjustment,
                record.evaluator,
                format_ts(&record.updated_at),
                record.quality_evaluation_id,
            ],
        )?;
        Ok(affected)
    }

    /// 将成品记录的百分比批量覆盖到所有关联评价
    ///
    /// # 返回
    /// - 被更新的评价条数（0 表示无关联评价，属正常结果）
    pub fn sync_percentages_tx(
        conn: &Connection,
        finished_product_id: &str,
        percentages: &YieldPercentages,
    ) -> RepositoryResult<usize> {
        let now = chrono::Local::now().naive_local();
        let p = percentages;
        let affected = conn.execute(
            r#"
            UPDATE quality_evaluation SET
                grade_a_pct = ?1, grade_b_pct = ?2, grade_b_head_pct = ?3, grade_c_pct = ?4,
                large_scrap_pct = ?5, small_scrap_pct = ?6, reject_pct = ?7, wet_pct = ?8,
                updated_at = ?9
            WHERE finished_product_id = ?10
            "#,
            params![
                p.grade_a,
                p.grade_b,
                p.grade_b_head,
                p.grade_c,
                p.large_scrap,
                p.small_scrap,
                p.reject,
                p.wet,
                format_ts(&now),
                finished_product_id,
            ],
        )?;
        Ok(affected)
    }

    pub fn count_linked_tx(conn: &Connection, finished_product_id: &str) -> RepositoryResult<usize> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM quality_evaluation WHERE finished_product_id = ?1",
            params![finished_product_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn find_by_id_tx(
        conn: &Connection,
        quality_evaluation_id: &str,
    ) -> RepositoryResult<Option<QualityEvaluationRecord>> {
        let sql = format!(
            "SELECT {} FROM quality_evaluation WHERE quality_evaluation_id = ?1",
            QUALITY_EVALUATION_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![quality_evaluation_id], Self::map_row)
            .optional()?)
    }

    pub fn find_by_finished_product_tx(
        conn: &Connection,
        finished_product_id: &str,
    ) -> RepositoryResult<Option<QualityEvaluationRecord>> {
        let sql = format!(
            "SELECT {} FROM quality_evaluation WHERE finished_product_id = ?1",
            QUALITY_EVALUATION_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![finished_product_id], Self::map_row)
            .optional()?)
    }

    pub fn count_by_batch_code_tx(conn: &Connection, batch_code: &str) -> RepositoryResult<usize> {
        let sql = format!("SELECT COUNT(*) FROM quality_evaluation WHERE {}", BATCH_SCOPE);
        let count: i64 = conn.query_row(&sql, params![batch_code], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// 必须先于成品记录删除执行，否则子查询范围会丢失
    pub fn delete_by_batch_code_tx(conn: &Connection, batch_code: &str) -> RepositoryResult<usize> {
        let sql = format!("DELETE FROM quality_evaluation WHERE {}", BATCH_SCOPE);
        let affected = conn.execute(&sql, params![batch_code])?;
        Ok(affected)
    }

    fn map_row(row: &rusqlite::Row) -> SqliteResult<QualityEvaluationRecord> {
        Ok(QualityEvaluationRecord {
            quality_evaluation_id: row.get(0)?,
            finished_product_id: row.get(1)?,
            batch_code: row.get(2)?,
            process_time: get_opt_ts(row, 3)?,
            machine_id: row.get(4)?,
            goods_name: row.get(5)?,
            percentages: YieldPercentages {
                grade_a: row.get(6)?,
                grade_b: row.get(7)?,
                grade_b_head: row.get(8)?,
                grade_c: row.get(9)?,
                large_scrap: row.get(10)?,
                small_scrap: row.get(11)?,
                reject: row.get(12)?,
                wet: row.get(13)?,
            },
            sensory: SensoryFields {
                color: row.get(14)?,
                aroma: row.get(15)?,
                taste: row.get(16)?,
                sweetness: row.get(17)?,
                crispness: row.get(18)?,
                overall_remark: row.get(19)?,
                suggested_adjustment: row.get(20)?,
            },
            evaluator: row.get(21)?,
            created_at: get_ts(row, 22)?,
            updated_at: get_ts(row, 23)?,
        })
    }
}
