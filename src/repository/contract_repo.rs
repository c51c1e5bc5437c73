// ==========================================
// 客户账单监控系统 - 合同 Repository
// ==========================================
// 职责: contracts 表 CRUD（使用 rusqlite）
// 红线: 附件文件的读写不在此处，仅保存 blob 路径
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::contract::{ContractRecord, NewContractRecord};
use crate::domain::types::Segment;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::record_store::{
    decimal_column, enum_column, ContractStore, NaturalKeyLookup, StageFn,
};
use crate::repository::transaction::run_batch;
use chrono::{Local, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = "id, contract_number, contract_date, contract_value, period_start, \
     period_end, job_title, customer_name, transaction_type, segment, responsible_person, \
     document_path, created_at, updated_at";

const INSERT_SQL: &str = r#"
    INSERT INTO contracts (
        contract_number, contract_date, contract_value, period_start, period_end,
        job_title, customer_name, transaction_type, segment, responsible_person,
        document_path, created_at, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
"#;

pub struct ContractRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ContractRepository {
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

    fn map_row(row: &Row<'_>) -> rusqlite::Result<ContractRecord> {
        Ok(ContractRecord {
            id: row.get(0)?,
            contract_number: row.get(1)?,
            contract_date: row.get(2)?,
            contract_value: decimal_column(row, 3)?,
            period_start: row.get(4)?,
            period_end: row.get(5)?,
            job_title: row.get(6)?,
            customer_name: row.get(7)?,
            transaction_type: enum_column(row, 8)?,
            segment: enum_column(row, 9)?,
            responsible_person: row.get(10)?,
            document_path: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }

    fn insert_with(conn: &Connection, record: &NewContractRecord, now: NaiveDateTime) -> RepositoryResult<i64> {
        conn.execute(
            INSERT_SQL,
            params![
                record.contract_number,
                record.contract_date,
                record.contract_value.to_string(),
                record.period_start,
                record.period_end,
                record.job_title,
                record.customer_name,
                record.transaction_type.as_str(),
                record.segment.as_str(),
                record.responsible_person,
                record.document_path,
                now,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<ContractRecord>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM contracts WHERE id = ?1", SELECT_COLUMNS);
        Ok(conn.query_row(&sql, params![id], Self::map_row).optional()?)
    }

    /// 列出合同（可按板块过滤），按创建时间倒序
    pub fn list(&self, segment: Option<Segment>) -> RepositoryResult<Vec<ContractRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM contracts WHERE (?1 IS NULL OR segment = ?1) \
             ORDER BY created_at DESC, id DESC",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![segment.map(|s| s.as_str())], Self::map_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    pub fn count(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM contracts", [], |row| row.get(0))?)
    }

    /// 按合同号查询
    pub fn find_by_number(&self, contract_number: &str) -> RepositoryResult<Option<ContractRecord>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM contracts WHERE contract_number = ?1", SELECT_COLUMNS);
        Ok(conn
            .query_row(&sql, params![contract_number], Self::map_row)
            .optional()?)
    }

    /// 新建单条合同
    pub fn insert(&self, record: &NewContractRecord) -> RepositoryResult<ContractRecord> {
        let id = {
            let conn = self.get_conn()?;
            Self::insert_with(&conn, record, Local::now().naive_local())?
        };
        self.find_by_id(id)?
            .ok_or_else(|| RepositoryError::not_found("ContractRecord", id))
    }

    /// 整体覆盖更新（id 与 created_at 不变）
    pub fn update(&self, record: &ContractRecord) -> RepositoryResult<ContractRecord> {
        let now = Local::now().naive_local();
        {
            let conn = self.get_conn()?;
            let affected = conn.execute(
                r#"
                UPDATE contracts SET
                    contract_number = ?1, contract_date = ?2, contract_value = ?3,
                    period_start = ?4, period_end = ?5, job_title = ?6, customer_name = ?7,
                    transaction_type = ?8, segment = ?9, responsible_person = ?10,
                    document_path = ?11, updated_at = ?12
                WHERE id = ?13
                "#,
                params![
                    record.contract_number,
                    record.contract_date,
                    record.contract_value.to_string(),
                    record.period_start,
                    record.period_end,
                    record.job_title,
                    record.customer_name,
                    record.transaction_type.as_str(),
                    record.segment.as_str(),
                    record.responsible_person,
                    record.document_path,
                    now,
                    record.id,
                ],
            )?;
            if affected == 0 {
                return Err(RepositoryError::not_found("ContractRecord", record.id));
            }
        }
        self.find_by_id(record.id)?
            .ok_or_else(|| RepositoryError::not_found("ContractRecord", record.id))
    }

    /// 替换附件路径
    pub fn set_document_path(&self, id: i64, document_path: Option<&str>) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE contracts SET document_path = ?1, updated_at = ?2 WHERE id = ?3",
            params![document_path, Local::now().naive_local(), id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("ContractRecord", id));
        }
        Ok(())
    }

    pub fn delete(&self, id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM contracts WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(RepositoryError::not_found("ContractRecord", id));
        }
        Ok(())
    }
}

impl NaturalKeyLookup for ContractRepository {
    fn key_exists(&self, key: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM contracts WHERE contract_number = ?1 LIMIT 1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

impl ContractStore for ContractRepository {
    fn write_batch(&self, stage: &mut StageFn<'_, NewContractRecord>) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        run_batch(&conn, Self::insert_with, stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::record_store::BatchWriter;
    use crate::db::{configure_sqlite_connection, init_schema};
    use crate::domain::contract::ContractPeriod;
    use crate::domain::types::TransactionType;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn setup() -> ContractRepository {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        ContractRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn new_contract(number: &str, segment: Segment) -> NewContractRecord {
        NewContractRecord {
            contract_number: number.to_string(),
            contract_date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            contract_value: dec!(250000000),
            period_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            job_title: "Pengadaan Jaringan".to_string(),
            customer_name: "Dinas Kominfo".to_string(),
            transaction_type: TransactionType::Gtma,
            segment,
            responsible_person: None,
            document_path: None,
        }
    }

    #[test]
    fn test_insert_and_list_by_segment() {
        let repo = setup();
        let saved = repo.insert(&new_contract("K-001", Segment::Government)).unwrap();
        repo.insert(&new_contract("K-002", Segment::Business)).unwrap();

        assert_eq!(saved.transaction_type, TransactionType::Gtma);
        assert_eq!(
            saved.contract_period(),
            ContractPeriod::Years { years: 2, months: 2 }
        );
        assert_eq!(repo.list(Some(Segment::Government)).unwrap().len(), 1);
        assert_eq!(repo.list(None).unwrap().len(), 2);
        assert!(repo.key_exists("K-001").unwrap());
        assert!(repo.find_by_number("K-404").unwrap().is_none());
    }

    #[test]
    fn test_update_and_document_path() {
        let repo = setup();
        let mut saved = repo.insert(&new_contract("K-001", Segment::Business)).unwrap();

        saved.job_title = "Migrasi Data".to_string();
        let updated = repo.update(&saved).unwrap();
        assert_eq!(updated.job_title, "Migrasi Data");
        assert_eq!(updated.created_at, saved.created_at);

        repo.set_document_path(saved.id, Some("uploads/kontrak/a.pdf")).unwrap();
        let found = repo.find_by_id(saved.id).unwrap().unwrap();
        assert_eq!(found.document_path.as_deref(), Some("uploads/kontrak/a.pdf"));

        repo.delete(saved.id).unwrap();
        assert!(matches!(
            repo.set_document_path(saved.id, None),
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_write_batch_rolls_back_on_duplicate() {
        let repo = setup();
        let batch = vec![
            new_contract("K-001", Segment::Business),
            new_contract("K-001", Segment::Business),
        ];
        let result = repo.write_batch(&mut |writer: &mut dyn BatchWriter<NewContractRecord>| {
            batch.iter().try_for_each(|c| writer.stage(c))
        });
        assert!(result.is_err());
        assert_eq!(repo.count().unwrap(), 0);
    }
}
