// ==========================================
// 客户账单监控系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分类: 结构性错误（终止整批） / 行级错误（记录后继续）
// ==========================================

use crate::i18n::t_with_args;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 结构性错误（终止整批） =====
    #[error("文件格式不支持: {ext}（仅支持 {allowed}）")]
    UnsupportedFormat { ext: String, allowed: String },

    #[error("文件过大: {size} 字节（上限 {limit} 字节）")]
    FileTooLarge { size: usize, limit: usize },

    #[error("文件解析失败: {0}")]
    ParseFailure(String),

    #[error("缺少必需列: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    // ===== 行级错误 =====
    #[error("必填字段为空 (行 {row}): {}", .fields.join(", "))]
    MissingRequiredField { row: usize, fields: Vec<String> },

    #[error("日期格式错误 (行 {row}, 字段 {field}): 期望 YYYY-MM-DD，实际 {value}")]
    InvalidDate {
        row: usize,
        field: String,
        value: String,
    },

    #[error("金额格式错误 (行 {row}, 字段 {field}): {value}")]
    InvalidAmount {
        row: usize,
        field: String,
        value: String,
    },

    #[error("取值非法 (行 {row}, 字段 {field}): {value}")]
    InvalidValue {
        row: usize,
        field: String,
        value: String,
    },

    #[error("客户经理不存在 (行 {row}): {owner}")]
    UnknownManager { row: usize, owner: String },

    #[error("自然键重复 (行 {row}, {entity}): {key}")]
    DuplicateKey {
        row: usize,
        entity: &'static str,
        key: String,
    },

    // ===== 存储错误 =====
    #[error("提交失败: {0}")]
    StoreError(String),

    #[error("附件存储失败: {0}")]
    BlobIoError(String),
}

impl ImportError {
    /// 是否为行级错误（按行记录、不终止整批）
    pub fn is_row_level(&self) -> bool {
        self.row().is_some()
    }

    /// 行级错误对应的源文件行号
    pub fn row(&self) -> Option<usize> {
        match self {
            ImportError::MissingRequiredField { row, .. }
            | ImportError::InvalidDate { row, .. }
            | ImportError::InvalidAmount { row, .. }
            | ImportError::InvalidValue { row, .. }
            | ImportError::UnknownManager { row, .. }
            | ImportError::DuplicateKey { row, .. } => Some(*row),
            _ => None,
        }
    }

    /// 本地化的用户可读原因（不含行号前缀）
    pub fn user_message(&self) -> String {
        match self {
            ImportError::UnsupportedFormat { ext, allowed } => t_with_args(
                "import.unsupported_format",
                &[("ext", ext), ("allowed", allowed)],
            ),
            ImportError::FileTooLarge { size, limit } => t_with_args(
                "import.file_too_large",
                &[("size", &size.to_string()), ("limit", &limit.to_string())],
            ),
            ImportError::ParseFailure(reason) => {
                t_with_args("import.parse_failure", &[("reason", reason)])
            }
            ImportError::MissingColumns(columns) => {
                t_with_args("import.missing_columns", &[("columns", &columns.join(", "))])
            }
            ImportError::MissingRequiredField { fields, .. } => t_with_args(
                "import.missing_required_field",
                &[("fields", &fields.join(", "))],
            ),
            ImportError::InvalidDate { field, value, .. } => {
                t_with_args("import.invalid_date", &[("field", field), ("value", value)])
            }
            ImportError::InvalidAmount { field, value, .. } => {
                t_with_args("import.invalid_amount", &[("field", field), ("value", value)])
            }
            ImportError::InvalidValue { field, value, .. } => {
                t_with_args("import.invalid_value", &[("field", field), ("value", value)])
            }
            ImportError::UnknownManager { owner, .. } => {
                t_with_args("import.unknown_manager", &[("owner", owner)])
            }
            ImportError::DuplicateKey { entity, key, .. } => {
                let msg_key = if *entity == "contract" {
                    "import.duplicate_contract"
                } else {
                    "import.duplicate_account"
                };
                t_with_args(msg_key, &[("key", key)])
            }
            ImportError::StoreError(reason) => {
                t_with_args("import.store_error", &[("reason", reason)])
            }
            ImportError::BlobIoError(reason) => {
                t_with_args("import.blob_io_error", &[("reason", reason)])
            }
        }
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::ParseFailure(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::ParseFailure(format!("CSV: {}", err))
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ParseFailure(format!("Excel: {}", err))
    }
}

// 实现 From<calamine::XlsxError>
impl From<calamine::XlsxError> for ImportError {
    fn from(err: calamine::XlsxError) -> Self {
        ImportError::ParseFailure(format!("Excel: {}", err))
    }
}

// 实现 From<calamine::XlsError>
impl From<calamine::XlsError> for ImportError {
    fn from(err: calamine::XlsError) -> Self {
        ImportError::ParseFailure(format!("Excel: {}", err))
    }
}

// 实现 From<RepositoryError>
// 提交阶段的任何仓储错误（含唯一约束兜底）统一视为 StoreError
impl From<RepositoryError> for ImportError {
    fn from(err: RepositoryError) -> Self {
        ImportError::StoreError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
