// ==========================================
// 客户账单监控系统 - 导入层
// ==========================================
// 职责: 上传文件 → 校验 / 归一化 → 批量入库
// 支持: CSV, Excel (xlsx / xls), PDF（仅预览）
// ==========================================

// 模块声明
pub mod batch;
pub mod billing_importer;
pub mod conflict_handler;
pub mod contract_importer;
pub mod data_cleaner;
pub mod dq_validator;
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod importer_trait;
pub mod labeled_fields;
pub mod upload_preview;

// 重导出核心类型
pub use billing_importer::BillingImporter;
pub use conflict_handler::DuplicateChecker;
pub use contract_importer::ContractImporter;
pub use data_cleaner::DataCleaner;
pub use dq_validator::RequiredFieldValidator;
pub use error::{ImportError, ImportResult};
pub use field_mapper::FieldMapper;
pub use file_parser::{detect_format, CsvParser, ExcelParser, FileFormat, UniversalFileParser};
pub use upload_preview::UploadPreviewer;

// 重导出 Trait 接口
pub use importer_trait::{FieldNormalizer, FileParser, RowValidator};
