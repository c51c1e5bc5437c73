// ==========================================
// 客户账单监控系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、派生规则
// 红线: 不含数据访问逻辑
// ==========================================

pub mod billing;
pub mod contract;
pub mod import;
pub mod types;
pub mod user;

// 重导出核心类型
pub use billing::{payment_status, BillingPatch, BillingRecord, NewBillingRecord};
pub use contract::{contract_period, ContractPatch, ContractPeriod, ContractRecord, NewContractRecord};
pub use import::{
    AllOrNothingReport, ParsedSheet, PartialImportReport, RawCell, RawRow, RowError,
    UploadCandidate, UploadPreview,
};
pub use types::{InvoiceStatus, PaymentStatus, Role, Segment, TransactionType, UnknownVariant};
pub use user::{Principal, User};
