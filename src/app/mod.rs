// ==========================================
// 客户账单监控系统 - 应用层
// ==========================================
// 职责: 组装 Repository / 配置 / 附件存储 / API
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState, DB_PATH_ENV};
