// ==========================================
// 客户账单监控系统 - 客户账单 Repository
// ==========================================
// 职责: billing_records 表 CRUD（使用 rusqlite）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::billing::{BillingPatch, BillingRecord, NewBillingRecord};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::record_store::{
    decimal_column, enum_column, BillingStore, NaturalKeyLookup, StageFn,
};
use crate::repository::transaction::run_batch;
use chrono::{Local, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = "id, account_number, customer_name, owner_id, product, category, \
     period_start, period_end, billed_amount, invoice_status, paid_amount, created_at, updated_at";

const INSERT_SQL: &str = r#"
    INSERT INTO billing_records (
        account_number, customer_name, owner_id, product, category,
        period_start, period_end, billed_amount, invoice_status, paid_amount,
        created_at, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
"#;

// ==========================================
// BillingRepository
// ==========================================
pub struct BillingRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BillingRepository {
    /// 创建新的 Repository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从共享连接创建
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<BillingRecord> {
        Ok(BillingRecord {
            id: row.get(0)?,
            account_number: row.get(1)?,
            customer_name: row.get(2)?,
            owner_id: row.get(3)?,
            product: row.get(4)?,
            category: row.get(5)?,
            period_start: row.get(6)?,
            period_end: row.get(7)?,
            billed_amount: decimal_column(row, 8)?,
            invoice_status: enum_column(row, 9)?,
            paid_amount: decimal_column(row, 10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }

    fn insert_with(conn: &Connection, record: &NewBillingRecord, now: NaiveDateTime) -> RepositoryResult<i64> {
        conn.execute(
            INSERT_SQL,
            params![
                record.account_number,
                record.customer_name,
                record.owner_id,
                record.product,
                record.category,
                record.period_start,
                record.period_end,
                record.billed_amount.to_string(),
                record.invoice_status.as_str(),
                record.paid_amount.to_string(),
                now,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 按 ID 查询
    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<BillingRecord>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM billing_records WHERE id = ?1", SELECT_COLUMNS);
        Ok(conn.query_row(&sql, params![id], Self::map_row).optional()?)
    }

    /// 列出账单（owner_id 为 None 表示全部），按创建时间倒序
    pub fn list(&self, owner_id: Option<i64>) -> RepositoryResult<Vec<BillingRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM billing_records WHERE (?1 IS NULL OR owner_id = ?1) \
             ORDER BY created_at DESC, id DESC",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![owner_id], Self::map_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// 总记录数
    pub fn count(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM billing_records", [], |row| row.get(0))?)
    }

    /// 最近更新时间
    pub fn last_updated_at(&self, owner_id: Option<i64>) -> RepositoryResult<Option<NaiveDateTime>> {
        let conn = self.get_conn()?;
        let value: Option<NaiveDateTime> = conn.query_row(
            "SELECT MAX(updated_at) FROM billing_records WHERE (?1 IS NULL OR owner_id = ?1)",
            params![owner_id],
            |row| row.get(0),
        )?;
        Ok(value)
    }

    /// 按客户账号查询（账号须已规范化）
    pub fn find_by_account(&self, account_number: &str) -> RepositoryResult<Option<BillingRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM billing_records WHERE account_number = ?1",
            SELECT_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![account_number], Self::map_row)
            .optional()?)
    }

    /// 新建单条账单
    pub fn insert(&self, record: &NewBillingRecord) -> RepositoryResult<BillingRecord> {
        let id = {
            let conn = self.get_conn()?;
            Self::insert_with(&conn, record, Local::now().naive_local())?
        };
        self.find_by_id(id)?
            .ok_or_else(|| RepositoryError::not_found("BillingRecord", id))
    }

    /// 更新发票状态 / 回款金额
    pub fn update(&self, id: i64, patch: &BillingPatch) -> RepositoryResult<BillingRecord> {
        let mut record = self
            .find_by_id(id)?
            .ok_or_else(|| RepositoryError::not_found("BillingRecord", id))?;

        if let Some(status) = patch.invoice_status {
            record.invoice_status = status;
        }
        if let Some(paid) = patch.paid_amount {
            record.paid_amount = paid;
        }
        record.updated_at = Local::now().naive_local();

        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE billing_records SET invoice_status = ?1, paid_amount = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                record.invoice_status.as_str(),
                record.paid_amount.to_string(),
                record.updated_at,
                id
            ],
        )?;
        Ok(record)
    }

    /// 删除账单
    pub fn delete(&self, id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM billing_records WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(RepositoryError::not_found("BillingRecord", id));
        }
        Ok(())
    }
}

impl NaturalKeyLookup for BillingRepository {
    fn key_exists(&self, key: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM billing_records WHERE account_number = ?1 LIMIT 1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

impl BillingStore for BillingRepository {
    fn manager_exists(&self, owner_id: i64) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM users WHERE id = ?1 LIMIT 1",
                params![owner_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn write_batch(&self, stage: &mut StageFn<'_, NewBillingRecord>) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        run_batch(&conn, Self::insert_with, stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::record_store::BatchWriter;
    use crate::db::{configure_sqlite_connection, init_schema};
    use crate::domain::types::{InvoiceStatus, PaymentStatus};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn setup() -> BillingRepository {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO users (id, username, name, role) VALUES (1, 'andi', 'Andi', 'am')",
            [],
        )
        .unwrap();
        BillingRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn new_record(account: &str) -> NewBillingRecord {
        NewBillingRecord {
            account_number: account.to_string(),
            customer_name: "PT Maju".to_string(),
            owner_id: 1,
            product: "Internet".to_string(),
            category: "C3mr".to_string(),
            period_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            billed_amount: dec!(1500000.50),
            invoice_status: InvoiceStatus::NotSent,
            paid_amount: dec!(0),
        }
    }

    #[test]
    fn test_insert_and_find_roundtrip_keeps_decimals() {
        let repo = setup();
        let saved = repo.insert(&new_record("A-1")).unwrap();
        assert_eq!(saved.billed_amount, dec!(1500000.50));
        assert_eq!(saved.payment_status(), PaymentStatus::Unpaid);

        let found = repo.find_by_account("A-1").unwrap().unwrap();
        assert_eq!(found.id, saved.id);
        assert!(repo.key_exists("A-1").unwrap());
        assert!(!repo.key_exists("A-2").unwrap());
    }

    fn write_all(repo: &BillingRepository, records: &[NewBillingRecord]) -> RepositoryResult<usize> {
        repo.write_batch(&mut |batch: &mut dyn BatchWriter<NewBillingRecord>| {
            records.iter().try_for_each(|r| batch.stage(r))
        })
    }

    #[test]
    fn test_write_batch_is_atomic() {
        let repo = setup();
        repo.insert(&new_record("A-1")).unwrap();

        // 第二行与已有记录冲突 → 整批回滚
        let result = write_all(&repo, &[new_record("B-1"), new_record("A-1")]);
        assert!(matches!(result, Err(RepositoryError::UniqueConstraintViolation(_))));
        assert_eq!(repo.count().unwrap(), 1);
        assert!(!repo.key_exists("B-1").unwrap());

        assert_eq!(write_all(&repo, &[new_record("B-1"), new_record("C-1")]).unwrap(), 2);
        assert_eq!(repo.count().unwrap(), 3);
    }

    #[test]
    fn test_update_and_delete() {
        let repo = setup();
        let saved = repo.insert(&new_record("A-1")).unwrap();

        let updated = repo
            .update(
                saved.id,
                &BillingPatch {
                    invoice_status: Some(InvoiceStatus::Sent),
                    paid_amount: Some(dec!(500000)),
                },
            )
            .unwrap();
        assert_eq!(updated.invoice_status, InvoiceStatus::Sent);
        assert_eq!(updated.payment_status(), PaymentStatus::Partial);

        repo.delete(saved.id).unwrap();
        assert!(matches!(
            repo.delete(saved.id),
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_list_scoped_by_owner() {
        let repo = setup();
        repo.insert(&new_record("A-1")).unwrap();
        assert_eq!(repo.list(Some(1)).unwrap().len(), 1);
        assert_eq!(repo.list(Some(2)).unwrap().len(), 0);
        assert_eq!(repo.list(None).unwrap().len(), 1);
        assert!(repo.last_updated_at(Some(2)).unwrap().is_none());
        assert!(repo.manager_exists(1).unwrap());
        assert!(!repo.manager_exists(42).unwrap());
    }
}
