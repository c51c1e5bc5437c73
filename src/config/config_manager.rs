// ==========================================
// 客户账单监控系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value)
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tracing::warn;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 从 config_kv 表读取配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入配置值（存在则覆盖）
    pub fn set_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            "INSERT INTO config_kv (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有配置的快照（JSON 格式，按键排序）
    pub fn snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare("SELECT key, value FROM config_kv ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// 读取配置，读取失败或不存在时返回 None（记录告警）
    fn read_or_warn(&self, key: &str) -> Option<String> {
        match self.get_value(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(config_key = key, error = %e, "配置读取失败，使用默认值");
                None
            }
        }
    }

    /// 读取数值配置，格式错误时回退默认值
    fn read_usize(&self, key: &str, default: usize) -> usize {
        match self.read_or_warn(key) {
            None => default,
            Some(raw) => raw.trim().parse::<usize>().unwrap_or_else(|_| {
                warn!(config_key = key, raw_value = %raw, "配置格式错误，使用默认值");
                default
            }),
        }
    }

    fn read_string(&self, key: &str, default: &str) -> String {
        self.read_or_warn(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string())
    }
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
impl ImportConfigReader for ConfigManager {
    fn max_file_size_bytes(&self) -> usize {
        self.read_usize(
            config_keys::MAX_FILE_SIZE_BYTES,
            defaults::MAX_FILE_SIZE_BYTES,
        )
    }

    fn document_root(&self) -> String {
        self.read_string(config_keys::DOCUMENT_ROOT, defaults::DOCUMENT_ROOT)
    }

    fn default_category(&self) -> String {
        self.read_string(config_keys::DEFAULT_CATEGORY, defaults::DEFAULT_CATEGORY)
    }

    fn csv_sniff_bytes(&self) -> usize {
        self.read_usize(config_keys::CSV_SNIFF_BYTES, defaults::CSV_SNIFF_BYTES)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 上传
    pub const MAX_FILE_SIZE_BYTES: &str = "upload.max_file_size_bytes";
    pub const DOCUMENT_ROOT: &str = "upload.document_root";

    // 导入
    pub const DEFAULT_CATEGORY: &str = "import.default_category";
    pub const CSV_SNIFF_BYTES: &str = "import.csv_sniff_bytes";
}

/// 配置默认值
pub mod defaults {
    pub const MAX_FILE_SIZE_BYTES: usize = 16 * 1024 * 1024;
    pub const DOCUMENT_ROOT: &str = "uploads/kontrak";
    pub const DEFAULT_CATEGORY: &str = "C3mr";
    pub const CSV_SNIFF_BYTES: usize = 1024;
}
