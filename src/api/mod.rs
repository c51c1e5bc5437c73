// ==========================================
// 客户账单监控系统 - API 层
// ==========================================
// 职责: 面向调用方的业务接口（角色门禁 + 错误归一）
// ==========================================

pub mod access;
pub mod billing_api;
pub mod contract_api;
pub mod error;
pub mod import_api;

// 重导出核心类型
pub use access::require_privileged;
pub use billing_api::{BillingApi, CustomerView, TotalsView};
pub use contract_api::{
    BulkDeleteReport, ContractApi, ContractDocumentInfo, ContractView, SegmentRoster,
};
pub use error::{ApiError, ApiResult};
pub use import_api::{ImportApi, BILLING_TEMPLATE_COLUMNS};
