// ==========================================
// FinView 导入引擎 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，将仓储层/导入层错误转换为面向用户的消息
// ==========================================

use crate::importer::error::ImportError;
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

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 导入错误
    // ==========================================
    #[error("映射规范无效: {0}")]
    SpecInvalid(String),

    #[error("文件导入失败: {0}")]
    ImportError(String),

    #[error("导入已取消: {0}")]
    Cancelled(String),

    #[error("配置错误: {0}")]
    ConfigError(String),
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
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::CheckConstraintViolation(msg) => {
                ApiError::InvalidInput(format!("检查约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
// 行级错误保留行号与最内层原因（Display 已包含两者）
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::SpecInvalid { .. } => ApiError::SpecInvalid(err.to_string()),
            ImportError::FileNotFound(path) => {
                ApiError::NotFound(format!("文件{}不存在", path))
            }
            ImportError::Cancelled { .. } => ApiError::Cancelled(err.to_string()),
            ImportError::ConfigReadError { .. } => ApiError::ConfigError(err.to_string()),
            ImportError::Persistence(msg) => ApiError::DatabaseTransactionError(msg),
            other => ApiError::ImportError(other.to_string()),
        }
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        ApiError::from(RepositoryError::from(err))
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
