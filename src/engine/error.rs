// ==========================================
// 生产批次追踪系统 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 唯一约束冲突在此统一归为 Conflict
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    /// 批次已分发，或该机台已有同批次操作记录
    #[error("批次重复: batch_code={batch_code}{}", .machine_name.as_ref().map(|m| format!(", machine={}", m)).unwrap_or_default())]
    DuplicateBatch {
        batch_code: String,
        machine_name: Option<String>,
    },

    #[error("引用不存在: {entity}({key})")]
    ReferenceNotFound { entity: String, key: String },

    #[error("数据验证失败: {0}")]
    Validation(String),

    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    /// 存储层唯一约束兜底（并发写入）
    #[error("并发冲突: {0}")]
    Conflict(String),

    #[error(
        "存在孤儿记录: batch_code={batch_code}, finished_products={finished_products}, quality_evaluations={quality_evaluations}"
    )]
    OrphanedRecords {
        batch_code: String,
        finished_products: usize,
        quality_evaluations: usize,
    },

    /// 成品百分比下推失败（整笔更新已回滚）
    #[error("百分比同步失败: finished_product_id={finished_product_id}, reason={reason}")]
    SyncPropagation {
        finished_product_id: String,
        reason: String,
    },

    #[error("配置读取失败: {0}")]
    Config(String),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for EngineError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::UniqueConstraintViolation(msg) => EngineError::Conflict(msg),
            RepositoryError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            RepositoryError::FieldValueError { field, message } => {
                EngineError::Validation(format!("{}: {}", field, message))
            }
            other => EngineError::Repository(other),
        }
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        RepositoryError::from(err).into()
    }
}

impl EngineError {
    pub(crate) fn not_found(entity: &str, id: &str) -> Self {
        EngineError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub(crate) fn reference_not_found(entity: &str, key: &str) -> Self {
        EngineError::ReferenceNotFound {
            entity: entity.to_string(),
            key: key.to_string(),
        }
    }
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
