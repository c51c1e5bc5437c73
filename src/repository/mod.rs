// ==========================================
// 客户账单监控系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod billing_repo;
pub mod contract_repo;
pub mod error;
pub mod record_store;
pub mod transaction;
pub mod user_repo;

// 重导出核心仓储
pub use billing_repo::BillingRepository;
pub use contract_repo::ContractRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use record_store::{BatchWriter, BillingStore, ContractStore, NaturalKeyLookup, StageFn};
pub use transaction::{run_batch, BatchTransaction};
pub use user_repo::UserRepository;
