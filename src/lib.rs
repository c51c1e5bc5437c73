// ==========================================
// 客户账单监控系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 客户账单 / 合同批量导入 + 回款汇总
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "en");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 回款汇总
pub mod engine;

// 导入层 - 外部数据
pub mod importer;

// 附件存储
pub mod storage;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

pub use domain::{
    BillingRecord, ContractPeriod, ContractRecord, InvoiceStatus, PaymentStatus, Principal, Role,
    Segment, TransactionType,
};

pub use engine::{PaymentAggregator, PaymentTotals};

pub use api::{ApiError, BillingApi, ContractApi, ImportApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "Monitor Pelanggan";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
