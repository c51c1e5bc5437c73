// ==========================================
// 客户账单导入集成测试（全有或全无）
// ==========================================

use monitor_pelanggan::api::ApiError;
use monitor_pelanggan::importer::batch::row_message;
use monitor_pelanggan::importer::field_mapper::COL_BILLED_AMOUNT;
use monitor_pelanggan::importer::ImportError;
use monitor_pelanggan::repository::BillingRepository;
use rust_decimal_macros::dec;
use tempfile::TempDir;

mod test_helpers;
use test_helpers::{billing_line, create_app_state, csv_bytes, BILLING_HEADER};

#[test]
fn test_import_billing_commits_valid_batch() {
    let docs = TempDir::new().unwrap();
    let (_db, state, users) = create_app_state(docs.path()).unwrap();

    let bytes = csv_bytes(
        BILLING_HEADER,
        &[
            billing_line("ACC-1", "PT Satu", users.am_budi, "1000000", "250000"),
            billing_line("ACC-2", "PT Dua", users.am_sari, "500000", "0"),
        ],
    );
    let report = state
        .import_api
        .import_billing(&users.admin(), "tagihan.csv", &bytes)
        .unwrap();

    assert!(report.is_committed());
    assert_eq!(report.imported_count, 2);
    assert!(!report.batch_id.is_empty());

    let repo = BillingRepository::new(&state.db_path).unwrap();
    assert_eq!(repo.count().unwrap(), 2);
}

#[test]
fn test_import_billing_rejects_whole_batch_on_one_bad_row() {
    let docs = TempDir::new().unwrap();
    let (_db, state, users) = create_app_state(docs.path()).unwrap();

    let bytes = csv_bytes(
        BILLING_HEADER,
        &[
            billing_line("ACC-1", "PT Satu", users.am_budi, "1000000", "0"),
            billing_line("ACC-2", "PT Dua", users.am_budi, "bukan angka", "0"),
            billing_line("ACC-3", "PT Tiga", users.am_budi, "300000", "0"),
        ],
    );
    let report = state
        .import_api
        .import_billing(&users.superadmin(), "tagihan.csv", &bytes)
        .unwrap();

    assert!(!report.is_committed());
    assert_eq!(report.imported_count, 0);
    assert_eq!(report.errors.len(), 1);
    // 物理行号：表头为第 1 行，坏行为第 3 行
    let expected = row_message(&ImportError::InvalidAmount {
        row: 3,
        field: COL_BILLED_AMOUNT.to_string(),
        value: "bukan angka".to_string(),
    });
    assert_eq!(report.errors[0], expected);

    let repo = BillingRepository::new(&state.db_path).unwrap();
    assert_eq!(repo.count().unwrap(), 0, "存储不应有任何变化");
}

#[test]
fn test_import_billing_resubmission_is_rejected_as_duplicates() {
    let docs = TempDir::new().unwrap();
    let (_db, state, users) = create_app_state(docs.path()).unwrap();

    let bytes = csv_bytes(
        BILLING_HEADER,
        &[
            billing_line("ACC-1", "PT Satu", users.am_budi, "1000000", "0"),
            billing_line("ACC-2", "PT Dua", users.am_budi, "200000", "0"),
        ],
    );
    let first = state
        .import_api
        .import_billing(&users.admin(), "tagihan.csv", &bytes)
        .unwrap();
    assert_eq!(first.imported_count, 2);

    let second = state
        .import_api
        .import_billing(&users.admin(), "tagihan.csv", &bytes)
        .unwrap();
    assert_eq!(second.imported_count, 0);
    assert_eq!(second.errors.len(), 2);
    assert!(second.errors.iter().any(|e| e.contains("ACC-1")));

    let repo = BillingRepository::new(&state.db_path).unwrap();
    assert_eq!(repo.count().unwrap(), 2);
}

#[test]
fn test_import_billing_normalizes_float_like_account_number() {
    let docs = TempDir::new().unwrap();
    let (_db, state, users) = create_app_state(docs.path()).unwrap();

    let bytes = csv_bytes(
        BILLING_HEADER,
        &[billing_line("123.0", "PT Angka", users.am_budi, "1000.005", "")],
    );
    let report = state
        .import_api
        .import_billing(&users.admin(), "tagihan.csv", &bytes)
        .unwrap();
    assert_eq!(report.imported_count, 1);

    let repo = BillingRepository::new(&state.db_path).unwrap();
    let records = repo.list(None).unwrap();
    assert_eq!(records[0].account_number, "123");
    assert_eq!(records[0].billed_amount, dec!(1000.01));
    assert_eq!(records[0].paid_amount, dec!(0));

    // 同一账号的 "123" 形式视为重复
    let again = csv_bytes(
        BILLING_HEADER,
        &[billing_line("123", "PT Angka", users.am_budi, "1000", "0")],
    );
    let report = state
        .import_api
        .import_billing(&users.admin(), "tagihan.csv", &again)
        .unwrap();
    assert_eq!(report.imported_count, 0);
    assert_eq!(report.errors.len(), 1);
}

#[test]
fn test_import_billing_unknown_manager_is_row_error() {
    let docs = TempDir::new().unwrap();
    let (_db, state, users) = create_app_state(docs.path()).unwrap();

    let bytes = csv_bytes(
        BILLING_HEADER,
        &[
            billing_line("ACC-1", "PT Satu", users.am_budi, "1000", "0"),
            billing_line("ACC-2", "PT Dua", 9_999, "1000", "0"),
        ],
    );
    let report = state
        .import_api
        .import_billing(&users.admin(), "tagihan.csv", &bytes)
        .unwrap();
    assert_eq!(report.imported_count, 0);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("9999"));
}

#[test]
fn test_import_billing_missing_column_aborts() {
    let docs = TempDir::new().unwrap();
    let (_db, state, users) = create_app_state(docs.path()).unwrap();

    let bytes = b"no_akun,nama_pelanggan,produk\nACC-1,PT Satu,Internet\n".to_vec();
    let result = state
        .import_api
        .import_billing(&users.admin(), "tagihan.csv", &bytes);

    match result {
        Err(ApiError::Import(ImportError::MissingColumns(columns))) => {
            assert!(columns.contains(&"am_id".to_string()));
            assert!(columns.contains(&"jumlah_tagihan".to_string()));
        }
        other => panic!("应返回缺列错误: {:?}", other),
    }
}

#[test]
fn test_import_billing_rejects_unsupported_format_and_am() {
    let docs = TempDir::new().unwrap();
    let (_db, state, users) = create_app_state(docs.path()).unwrap();

    let result = state
        .import_api
        .import_billing(&users.admin(), "tagihan.txt", b"apa saja");
    assert!(matches!(
        result,
        Err(ApiError::Import(ImportError::UnsupportedFormat { .. }))
    ));

    let bytes = csv_bytes(
        BILLING_HEADER,
        &[billing_line("ACC-1", "PT Satu", users.am_budi, "1000", "0")],
    );
    let result = state
        .import_api
        .import_billing(&users.am_budi(), "tagihan.csv", &bytes);
    assert!(matches!(result, Err(ApiError::Forbidden(_))));
}

#[test]
fn test_billing_template_is_importable_header() {
    let docs = TempDir::new().unwrap();
    let (_db, state, _users) = create_app_state(docs.path()).unwrap();

    let template = state.import_api.billing_template_csv().unwrap();
    let mut lines = template.lines();
    assert_eq!(lines.next(), Some(test_helpers::BILLING_HEADER));
    assert!(lines.next().unwrap().starts_with("EXAMPLE001,PT Example Company,1,"));
}

/// 同批内重复账号不做行级查重，由提交时的唯一约束兜底（整批回滚）
#[test]
fn test_import_billing_intra_batch_duplicate_fails_at_commit() {
    let docs = TempDir::new().unwrap();
    let (_db, state, users) = create_app_state(docs.path()).unwrap();

    let bytes = csv_bytes(
        BILLING_HEADER,
        &[
            billing_line("ACC-1", "PT Satu", users.am_budi, "1000", "0"),
            billing_line("ACC-1", "PT Satu Lagi", users.am_budi, "2000", "0"),
        ],
    );
    let report = state
        .import_api
        .import_billing(&users.admin(), "tagihan.csv", &bytes)
        .unwrap();

    assert_eq!(report.imported_count, 0);
    assert_eq!(report.errors.len(), 1);

    let repo = BillingRepository::new(&state.db_path).unwrap();
    assert_eq!(repo.count().unwrap(), 0);
}
