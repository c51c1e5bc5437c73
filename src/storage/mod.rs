// ==========================================
// 客户账单监控系统 - 附件存储层
// ==========================================

pub mod blob_store;

pub use blob_store::{
    contract_document_name, sanitize_file_name, BlobMetadata, BlobStore, FsBlobStore, StorageError,
    StorageResult,
};
