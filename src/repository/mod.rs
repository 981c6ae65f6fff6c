// ==========================================
// 生产批次追踪系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================
// 约定: `*_tx(conn, ..)` 关联函数不加锁，供引擎在同一事务内组合调用
// ==========================================

pub mod action_log_repo;
pub mod batch_fanout_repo;
pub mod error;
pub mod finished_product_repo;
pub mod machine_repo;
pub mod material_batch_repo;
pub mod operation_repo;
pub mod quality_evaluation_repo;
pub mod sequence_repo;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use batch_fanout_repo::{BatchFanOutEntity, BatchFanOutRepository};
pub use error::{RepositoryError, RepositoryResult};
pub use finished_product_repo::FinishedProductRepository;
pub use machine_repo::MachineRepository;
pub use material_batch_repo::MaterialBatchRepository;
pub use operation_repo::OperationRecordRepository;
pub use quality_evaluation_repo::QualityEvaluationRepository;
pub use sequence_repo::{CodeFormat, SequenceRepository};

use crate::db::DATETIME_FORMAT;
use chrono::NaiveDateTime;
use rusqlite::types::Type;
use std::str::FromStr;

pub(crate) fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(DATETIME_FORMAT).to_string()
}

pub(crate) fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn get_ts(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    parse_ts(idx, &row.get::<_, String>(idx)?)
}

pub(crate) fn get_opt_ts(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    row.get::<_, Option<String>>(idx)?
        .map(|raw| parse_ts(idx, &raw))
        .transpose()
}

/// 读取以字符串存储的枚举列
pub(crate) fn get_enum<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}
