// ==========================================
// 客户账单监控系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换下层错误为用户可读的错误消息
// ==========================================

use crate::i18n::t;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use crate::storage::StorageError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 权限错误
    // ==========================================
    #[error("无权限: {0}")]
    Forbidden(String),

    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("资源冲突: {0}")]
    Conflict(String),

    // ==========================================
    // 导入错误（结构性错误，整批终止）
    // ==========================================
    #[error("文件导入失败: {0}")]
    Import(#[from] ImportError),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("附件存储错误: {0}")]
    StorageError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl ApiError {
    /// 当前角色无权执行该操作
    pub fn forbidden() -> Self {
        ApiError::Forbidden(t("common.forbidden"))
    }

    /// 面向用户的本地化消息
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Import(err) => err.user_message(),
            ApiError::Forbidden(msg)
            | ApiError::InvalidInput(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
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
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::Conflict(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::InvalidInput(format!("外键约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseConnectionError(msg)
            | RepositoryError::DatabaseTransactionError(msg)
            | RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(path) => {
                ApiError::NotFound(crate::i18n::t_with_args("import.file_not_found", &[("path", &path)]))
            }
            StorageError::InvalidPath(path) => ApiError::InvalidInput(path),
            StorageError::Io(msg) => ApiError::StorageError(msg),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
