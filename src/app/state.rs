// ==========================================
// 客户账单监控系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和 API 实例
// ==========================================

use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::api::{BillingApi, ContractApi, ImportApi};
use crate::config::{ConfigManager, ImportConfigReader};
use crate::db::{init_schema, open_sqlite_connection};
use crate::repository::{BillingRepository, ContractRepository, UserRepository};
use crate::storage::{BlobStore, FsBlobStore};

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "MONITOR_PELANGGAN_DB_PATH";

/// 应用状态
///
/// 所有 Repository 共享同一个 SQLite 连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    pub billing_api: Arc<BillingApi>,
    pub contract_api: Arc<ContractApi>,
    pub import_api: Arc<ImportApi>,

    /// 用户仓储（调用主体查询）
    pub user_repo: Arc<UserRepository>,

    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 创建新的 AppState 实例
    ///
    /// # 说明
    /// 1. 打开数据库并建表（幂等）
    /// 2. 初始化 Repository 与配置
    /// 3. 按配置的附件根目录初始化 blob 存储
    /// 4. 创建 API 实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        Self::from_connection(db_path, conn)
    }

    /// 基于已打开的连接创建（测试可传入内存库）
    pub fn from_connection(db_path: String, conn: Connection) -> Result<Self, String> {
        init_schema(&conn).map_err(|e| format!("数据库建表失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        let billing_repo = Arc::new(BillingRepository::from_connection(conn.clone()));
        let contract_repo = Arc::new(ContractRepository::from_connection(conn.clone()));
        let user_repo = Arc::new(UserRepository::from_connection(conn.clone()));
        let config_manager = Arc::new(ConfigManager::from_connection(conn));

        let document_root = config_manager.document_root();
        let blob_store: Arc<dyn BlobStore> = Arc::new(
            FsBlobStore::new(&document_root)
                .map_err(|e| format!("无法初始化附件存储 '{}': {}", document_root, e))?,
        );

        let billing_api = Arc::new(BillingApi::new(billing_repo.clone(), user_repo.clone()));
        let contract_api = Arc::new(ContractApi::new(contract_repo.clone(), blob_store));
        let import_api = Arc::new(ImportApi::new(
            billing_repo,
            contract_repo,
            config_manager.clone(),
        ));

        tracing::info!("AppState初始化完成");
        Ok(Self {
            db_path,
            billing_api,
            contract_api,
            import_api,
            user_repo,
            config_manager,
        })
    }
}

/// 获取默认数据库路径
///
/// # 优先级
/// 1. 环境变量 MONITOR_PELANGGAN_DB_PATH
/// 2. 用户数据目录 monitor-pelanggan/monitor_pelanggan.db
/// 3. 当前目录 ./monitor_pelanggan.db
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./monitor_pelanggan.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("monitor-pelanggan");
        // 目录创建失败时退回当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("monitor_pelanggan.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::config_keys;
    use tempfile::TempDir;

    #[test]
    fn test_app_state_wires_document_root_from_config() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("docs");

        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO config_kv (key, value) VALUES (?1, ?2)",
            rusqlite::params![config_keys::DOCUMENT_ROOT, root.to_string_lossy().to_string()],
        )
        .unwrap();

        let state = AppState::from_connection(":memory:".to_string(), conn).unwrap();
        assert!(root.is_dir());
        assert!(state.contract_api.segments().len() == 3);
    }
}
