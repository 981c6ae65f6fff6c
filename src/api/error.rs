// ==========================================
// 生产批次追踪系统 - API层错误类型
// ==========================================
// 职责: 将引擎/仓储错误转换为面向调用方的错误
// 说明: 每条错误信息必须带显式原因
// ==========================================

use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("引用不存在: {0}")]
    ReferenceNotFound(String),

    #[error("批次重复: {0}")]
    DuplicateBatch(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    // ==========================================
    // 并发与同步错误
    // ==========================================
    #[error("并发冲突: {0}")]
    ConcurrencyConflict(String),

    #[error("百分比同步失败: {0}")]
    SyncFailure(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("配置错误: {0}")]
    ConfigError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::ConcurrencyConflict(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::DuplicateBatch { .. } => ApiError::DuplicateBatch(err.to_string()),
            EngineError::ReferenceNotFound { entity, key } => {
                ApiError::ReferenceNotFound(format!("{}({})", entity, key))
            }
            EngineError::Validation(msg) => ApiError::ValidationError(msg),
            EngineError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            EngineError::Conflict(msg) => ApiError::ConcurrencyConflict(msg),
            EngineError::OrphanedRecords { .. } => ApiError::BusinessRuleViolation(err.to_string()),
            EngineError::SyncPropagation { .. } => ApiError::SyncFailure(err.to_string()),
            EngineError::Config(msg) => ApiError::ConfigError(msg),
            EngineError::Repository(inner) => inner.into(),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_errors_keep_their_category() {
        let err: ApiError = EngineError::DuplicateBatch {
            batch_code: "C007".into(),
            machine_name: None,
        }
        .into();
        assert!(matches!(err, ApiError::DuplicateBatch(ref msg) if msg.contains("C007")));

        let err: ApiError = EngineError::Conflict("batch_fanout.batch_code".into()).into();
        assert!(matches!(err, ApiError::ConcurrencyConflict(_)));

        let err: ApiError = EngineError::Repository(RepositoryError::LockError("poisoned".into())).into();
        assert!(matches!(err, ApiError::DatabaseConnectionError(_)));
    }
}
