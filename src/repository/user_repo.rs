// ==========================================
// 客户账单监控系统 - 用户 Repository
// ==========================================
// 职责: users 表只读查询（客户经理名单 / 外键校验）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::types::Role;
use crate::domain::user::User;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::record_store::enum_column;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

pub struct UserRepository {
    conn: Arc<Mutex<Connection>>,
}

impl UserRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            name: row.get(2)?,
            role: enum_column(row, 3)?,
            active: row.get(4)?,
        })
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>> {
        let conn = self.get_conn()?;
        Ok(conn
            .query_row(
                "SELECT id, username, name, role, active FROM users WHERE id = ?1",
                params![id],
                Self::map_row,
            )
            .optional()?)
    }

    pub fn exists(&self, id: i64) -> RepositoryResult<bool> {
        Ok(self.find_by_id(id)?.is_some())
    }

    /// 启用状态的客户经理（role = am），按姓名排序
    pub fn list_active_managers(&self) -> RepositoryResult<Vec<User>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, username, name, role, active FROM users \
             WHERE role = 'am' AND active = 1 ORDER BY name, id",
        )?;
        let rows = stmt.query_map([], Self::map_row)?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    /// 新建用户（用于初始化与测试数据准备）
    pub fn insert(&self, username: &str, name: &str, role: Role) -> RepositoryResult<User> {
        let id = {
            let conn = self.get_conn()?;
            conn.execute(
                "INSERT INTO users (username, name, role, active) VALUES (?1, ?2, ?3, 1)",
                params![username, name, role.as_str()],
            )?;
            conn.last_insert_rowid()
        };
        self.find_by_id(id)?
            .ok_or_else(|| RepositoryError::not_found("User", id))
    }
}
