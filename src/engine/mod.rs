// ==========================================
// 客户账单监控系统 - 引擎层
// ==========================================
// 职责: 实现业务汇总规则,不拼 SQL
// ==========================================

pub mod payment_aggregator;

// 重导出核心引擎
pub use payment_aggregator::{
    progress_percentage, ManagerRollup, PaymentAggregator, PaymentTotals, StatusCounts,
};
