// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库 / 种子用户 / CSV 构造
// ==========================================
#![allow(dead_code)]

use monitor_pelanggan::app::AppState;
use monitor_pelanggan::config::config_keys;
use monitor_pelanggan::db::{init_schema, open_sqlite_connection};
use monitor_pelanggan::domain::{Principal, Role};
use monitor_pelanggan::repository::UserRepository;
use std::error::Error;
use std::path::Path;
use tempfile::NamedTempFile;

pub const BILLING_HEADER: &str = "no_akun,nama_pelanggan,am_id,produk,kategori,start_date,end_date,jumlah_tagihan,status_invoice,progres_pembayaran";

pub const CONTRACT_HEADER: &str = "no_kontrak,tanggal_kontrak,nilai_kontrak,start_date,end_date,nama_pekerjaan,nama_customer,jenis_transaksi,segmen,pic_name";

/// 种子用户 id
#[derive(Debug, Clone, Copy)]
pub struct SeededUsers {
    pub superadmin: i64,
    pub admin: i64,
    pub am_budi: i64,
    pub am_sari: i64,
}

impl SeededUsers {
    pub fn superadmin(&self) -> Principal {
        Principal::new(self.superadmin, Role::Superadmin)
    }

    pub fn admin(&self) -> Principal {
        Principal::new(self.admin, Role::Admin)
    }

    pub fn am_budi(&self) -> Principal {
        Principal::new(self.am_budi, Role::Am)
    }

    pub fn am_sari(&self) -> Principal {
        Principal::new(self.am_sari, Role::Am)
    }
}

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时路径不是合法 UTF-8")?
        .to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 写入种子用户（superadmin / admin / 两名客户经理）
pub fn seed_users(db_path: &str) -> Result<SeededUsers, Box<dyn Error>> {
    let repo = UserRepository::new(db_path)?;
    Ok(SeededUsers {
        superadmin: repo.insert("root", "Root", Role::Superadmin)?.id,
        admin: repo.insert("admin", "Admin", Role::Admin)?.id,
        am_budi: repo.insert("budi", "Budi", Role::Am)?.id,
        am_sari: repo.insert("sari", "Sari", Role::Am)?.id,
    })
}

/// 指定附件根目录（需在 AppState 创建前写入）
pub fn set_document_root(db_path: &str, root: &Path) -> Result<(), Box<dyn Error>> {
    let conn = open_sqlite_connection(db_path)?;
    conn.execute(
        "INSERT INTO config_kv (key, value) VALUES (?1, ?2)",
        rusqlite::params![config_keys::DOCUMENT_ROOT, root.to_string_lossy().to_string()],
    )?;
    Ok(())
}

/// 临时数据库 + 种子用户 + AppState（附件根目录指向 doc_root）
pub fn create_app_state(
    doc_root: &Path,
) -> Result<(NamedTempFile, AppState, SeededUsers), Box<dyn Error>> {
    let (temp_file, db_path) = create_test_db()?;
    let users = seed_users(&db_path)?;
    set_document_root(&db_path, doc_root)?;
    let state = AppState::new(db_path)?;
    Ok((temp_file, state, users))
}

/// 客户账单 CSV 行
pub fn billing_line(account: &str, name: &str, am_id: i64, billed: &str, paid: &str) -> String {
    format!(
        "{},{},{},Internet,C3mr,2024-01-01,2024-12-31,{},Belum Terkirim,{}",
        account, name, am_id, billed, paid
    )
}

/// 合同 CSV 行
pub fn contract_line(number: &str, segment: &str) -> String {
    format!(
        "{},2024-01-05,250000000,2024-01-01,2026-03-01,Pengadaan Jaringan,PT Nusantara,GTMA,{},Taufik",
        number, segment
    )
}

/// 拼接表头与数据行
pub fn csv_bytes(header: &str, lines: &[String]) -> Vec<u8> {
    let mut text = String::from(header);
    for line in lines {
        text.push('\n');
        text.push_str(line);
    }
    text.push('\n');
    text.into_bytes()
}
