// ==========================================
// 客户账单监控系统 - 字段映射器实现
// ==========================================
// 职责: 原始行 → 待写入领域记录（类型转换 + 枚举解析）
// 前置: 必填字段已由 RowValidator 校验
// 约束: 未知列一律忽略，不报错
// ==========================================

use crate::domain::billing::NewBillingRecord;
use crate::domain::contract::NewContractRecord;
use crate::domain::import::{RawCell, RawRow, UploadCandidate};
use crate::domain::types::{InvoiceStatus, Segment, TransactionType};
use crate::importer::data_cleaner::{to_currency_scale, DataCleaner};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::importer_trait::FieldNormalizer;
use rust_decimal::Decimal;
use std::str::FromStr;

// ===== 客户账单列 =====
pub const COL_ACCOUNT_NUMBER: &str = "no_akun";
pub const COL_CUSTOMER_NAME: &str = "nama_pelanggan";
pub const COL_OWNER_ID: &str = "am_id";
pub const COL_PRODUCT: &str = "produk";
pub const COL_CATEGORY: &str = "kategori";
pub const COL_PERIOD_START: &str = "start_date";
pub const COL_PERIOD_END: &str = "end_date";
pub const COL_BILLED_AMOUNT: &str = "jumlah_tagihan";
pub const COL_INVOICE_STATUS: &str = "status_invoice";
pub const COL_PAID_AMOUNT: &str = "progres_pembayaran";

/// 客户账单必填列
pub const BILLING_REQUIRED_COLUMNS: &[&str] = &[
    COL_ACCOUNT_NUMBER,
    COL_CUSTOMER_NAME,
    COL_OWNER_ID,
    COL_PRODUCT,
    COL_CATEGORY,
    COL_PERIOD_START,
    COL_PERIOD_END,
    COL_BILLED_AMOUNT,
];

// ===== 合同列 =====
pub const COL_CONTRACT_NUMBER: &str = "no_kontrak";
pub const COL_CONTRACT_DATE: &str = "tanggal_kontrak";
pub const COL_CONTRACT_VALUE: &str = "nilai_kontrak";
pub const COL_JOB_TITLE: &str = "nama_pekerjaan";
pub const COL_CONTRACT_CUSTOMER: &str = "nama_customer";
pub const COL_TRANSACTION_TYPE: &str = "jenis_transaksi";
pub const COL_SEGMENT: &str = "segmen";
pub const COL_RESPONSIBLE_PERSON: &str = "pic_name";

/// 合同必填字段
pub const CONTRACT_REQUIRED_FIELDS: &[&str] = &[
    COL_CONTRACT_NUMBER,
    COL_CONTRACT_DATE,
    COL_CONTRACT_VALUE,
    COL_PERIOD_START,
    COL_PERIOD_END,
    COL_JOB_TITLE,
    COL_CONTRACT_CUSTOMER,
    COL_TRANSACTION_TYPE,
    COL_SEGMENT,
];

pub struct FieldMapper {
    normalizer: Box<dyn FieldNormalizer>,
}

impl Default for FieldMapper {
    fn default() -> Self {
        Self::new(Box::new(DataCleaner))
    }
}

impl FieldMapper {
    pub fn new(normalizer: Box<dyn FieldNormalizer>) -> Self {
        Self { normalizer }
    }

    /// 取必填单元格（缺失值 → MissingRequiredField）
    fn required<'r>(&self, row: &'r RawRow, field: &str) -> ImportResult<&'r RawCell> {
        match row.get(field) {
            Some(cell) if !self.normalizer.is_missing(Some(cell)) => Ok(cell),
            _ => Err(ImportError::MissingRequiredField {
                row: row.row_number,
                fields: vec![field.to_string()],
            }),
        }
    }

    /// 取可选单元格（缺失值 → None）
    fn optional<'r>(&self, row: &'r RawRow, field: &str) -> Option<&'r RawCell> {
        row.get(field).filter(|cell| !self.normalizer.is_missing(Some(*cell)))
    }

    fn text(&self, row: &RawRow, field: &str) -> ImportResult<String> {
        Ok(self.normalizer.clean_text(self.required(row, field)?))
    }

    fn amount(&self, row: &RawRow, field: &str) -> ImportResult<Decimal> {
        let cell = self.required(row, field)?;
        let amount = self.normalizer.parse_amount(cell, row.row_number, field)?;
        Ok(to_currency_scale(amount))
    }

    fn enum_value<T: FromStr>(&self, row: &RawRow, field: &str) -> ImportResult<T> {
        let text = self.text(row, field)?;
        text.parse::<T>().map_err(|_| ImportError::InvalidValue {
            row: row.row_number,
            field: field.to_string(),
            value: text,
        })
    }

    /// 读取归一化后的自然键（"123.0" → "123"）
    pub fn natural_key(&self, row: &RawRow, field: &str) -> ImportResult<String> {
        Ok(self.normalizer.natural_key(self.required(row, field)?))
    }

    /// 客户经理 ID（整数，兼容浮点渲染）
    pub fn owner_id(&self, row: &RawRow) -> ImportResult<i64> {
        let key = self.natural_key(row, COL_OWNER_ID)?;
        key.parse::<i64>().map_err(|_| ImportError::InvalidValue {
            row: row.row_number,
            field: COL_OWNER_ID.to_string(),
            value: key,
        })
    }

    /// 映射客户账单行
    pub fn map_billing(&self, row: &RawRow) -> ImportResult<NewBillingRecord> {
        let n = row.row_number;

        let invoice_status = match self.optional(row, COL_INVOICE_STATUS) {
            None => InvoiceStatus::default(),
            Some(cell) => {
                let text = self.normalizer.clean_text(cell);
                text.parse::<InvoiceStatus>()
                    .map_err(|_| ImportError::InvalidValue {
                        row: n,
                        field: COL_INVOICE_STATUS.to_string(),
                        value: text,
                    })?
            }
        };

        let paid_amount = match self.optional(row, COL_PAID_AMOUNT) {
            None => Decimal::ZERO,
            Some(cell) => to_currency_scale(self.normalizer.parse_amount(cell, n, COL_PAID_AMOUNT)?),
        };

        Ok(NewBillingRecord {
            account_number: self.natural_key(row, COL_ACCOUNT_NUMBER)?,
            customer_name: self.text(row, COL_CUSTOMER_NAME)?,
            owner_id: self.owner_id(row)?,
            product: self.text(row, COL_PRODUCT)?,
            category: self.text(row, COL_CATEGORY)?,
            period_start: self
                .normalizer
                .parse_date(self.required(row, COL_PERIOD_START)?, n, COL_PERIOD_START)?,
            period_end: self
                .normalizer
                .parse_date(self.required(row, COL_PERIOD_END)?, n, COL_PERIOD_END)?,
            billed_amount: self.amount(row, COL_BILLED_AMOUNT)?,
            invoice_status,
            paid_amount,
        })
    }

    /// 映射合同行
    pub fn map_contract(&self, row: &RawRow) -> ImportResult<NewContractRecord> {
        let n = row.row_number;
        Ok(NewContractRecord {
            contract_number: self.natural_key(row, COL_CONTRACT_NUMBER)?,
            contract_date: self
                .normalizer
                .parse_date(self.required(row, COL_CONTRACT_DATE)?, n, COL_CONTRACT_DATE)?,
            contract_value: self.amount(row, COL_CONTRACT_VALUE)?,
            period_start: self
                .normalizer
                .parse_date(self.required(row, COL_PERIOD_START)?, n, COL_PERIOD_START)?,
            period_end: self
                .normalizer
                .parse_date(self.required(row, COL_PERIOD_END)?, n, COL_PERIOD_END)?,
            job_title: self.text(row, COL_JOB_TITLE)?,
            customer_name: self.text(row, COL_CONTRACT_CUSTOMER)?,
            transaction_type: self.enum_value::<TransactionType>(row, COL_TRANSACTION_TYPE)?,
            segment: self.enum_value::<Segment>(row, COL_SEGMENT)?,
            responsible_person: self
                .optional(row, COL_RESPONSIBLE_PERSON)
                .map(|cell| self.normalizer.clean_text(cell))
                .filter(|s| !s.is_empty()),
            document_path: None,
        })
    }

    /// 通用上传预览行（只要求账号与客户名称，其余按原样带出）
    ///
    /// # 返回
    /// - None: 缺少账号或客户名称，该行被忽略
    pub fn map_upload_candidate(&self, row: &RawRow, default_category: &str) -> Option<UploadCandidate> {
        let account_number = self.optional(row, COL_ACCOUNT_NUMBER)?;
        let customer_name = self.optional(row, COL_CUSTOMER_NAME)?;

        let text_or = |field: &str, fallback: &str| {
            self.optional(row, field)
                .map(|cell| self.normalizer.clean_text(cell))
                .unwrap_or_else(|| fallback.to_string())
        };

        Some(UploadCandidate {
            row: row.row_number,
            account_number: self.normalizer.natural_key(account_number),
            customer_name: self.normalizer.clean_text(customer_name),
            product: text_or(COL_PRODUCT, ""),
            category: text_or(COL_CATEGORY, default_category),
            billed_amount: text_or(COL_BILLED_AMOUNT, "0"),
            invoice_status: text_or(COL_INVOICE_STATUS, InvoiceStatus::NotSent.label().as_str()),
            paid_amount: text_or(COL_PAID_AMOUNT, "0"),
            owner_id: self
                .optional(row, COL_OWNER_ID)
                .map(|cell| self.normalizer.natural_key(cell))
                .unwrap_or_default(),
            period_start: text_or(COL_PERIOD_START, ""),
            period_end: text_or(COL_PERIOD_END, ""),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn billing_row() -> RawRow {
        RawRow::new(2)
            .with_cell(COL_ACCOUNT_NUMBER, RawCell::Number(123.0))
            .with_cell(COL_CUSTOMER_NAME, RawCell::text("  PT Maju Jaya "))
            .with_cell(COL_OWNER_ID, RawCell::text("1.0"))
            .with_cell(COL_PRODUCT, RawCell::text("Astinet"))
            .with_cell(COL_CATEGORY, RawCell::text("CYC"))
            .with_cell(COL_PERIOD_START, RawCell::text("2024-01-01"))
            .with_cell(
                COL_PERIOD_END,
                RawCell::Date(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()),
            )
            .with_cell(COL_BILLED_AMOUNT, RawCell::text("1500000.555"))
    }

    #[test]
    fn test_map_billing_defaults_and_normalisation() {
        let record = FieldMapper::default().map_billing(&billing_row()).unwrap();
        assert_eq!(record.account_number, "123");
        assert_eq!(record.customer_name, "PT Maju Jaya");
        assert_eq!(record.owner_id, 1);
        assert_eq!(record.billed_amount, dec!(1500000.56));
        assert_eq!(record.invoice_status, InvoiceStatus::NotSent);
        assert_eq!(record.paid_amount, Decimal::ZERO);
        assert_eq!(record.period_end, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
    }

    #[test]
    fn test_map_billing_optional_fields() {
        let row = billing_row()
            .with_cell(COL_INVOICE_STATUS, RawCell::text("Terkirim"))
            .with_cell(COL_PAID_AMOUNT, RawCell::Int(250000));
        let record = FieldMapper::default().map_billing(&row).unwrap();
        assert_eq!(record.invoice_status, InvoiceStatus::Sent);
        assert_eq!(record.paid_amount, dec!(250000));

        let row = billing_row().with_cell(COL_INVOICE_STATUS, RawCell::text("Lunas"));
        assert!(matches!(
            FieldMapper::default().map_billing(&row),
            Err(ImportError::InvalidValue { row: 2, .. })
        ));
    }

    #[test]
    fn test_map_billing_reports_bad_values() {
        let row = billing_row().with_cell(COL_PERIOD_START, RawCell::text("31/01/2024"));
        assert!(matches!(
            FieldMapper::default().map_billing(&row),
            Err(ImportError::InvalidDate { .. })
        ));

        let row = billing_row().with_cell(COL_OWNER_ID, RawCell::text("andi"));
        assert!(matches!(
            FieldMapper::default().map_billing(&row),
            Err(ImportError::InvalidValue { .. })
        ));

        let row = billing_row().with_cell(COL_BILLED_AMOUNT, RawCell::text("satu juta"));
        assert!(matches!(
            FieldMapper::default().map_billing(&row),
            Err(ImportError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_map_contract() {
        let row = RawRow::new(5)
            .with_cell(COL_CONTRACT_NUMBER, RawCell::text("K/2024/001"))
            .with_cell(COL_CONTRACT_DATE, RawCell::text("2024-01-05"))
            .with_cell(COL_CONTRACT_VALUE, RawCell::Number(250000000.0))
            .with_cell(COL_PERIOD_START, RawCell::text("2024-01-01"))
            .with_cell(COL_PERIOD_END, RawCell::text("2024-12-31"))
            .with_cell(COL_JOB_TITLE, RawCell::text("Jaringan Kantor"))
            .with_cell(COL_CONTRACT_CUSTOMER, RawCell::text("Dinas Kominfo"))
            .with_cell(COL_TRANSACTION_TYPE, RawCell::text("own channel"))
            .with_cell(COL_SEGMENT, RawCell::text("GOVERNMENT"))
            .with_cell(COL_RESPONSIBLE_PERSON, RawCell::text("nan"));

        let record = FieldMapper::default().map_contract(&row).unwrap();
        assert_eq!(record.contract_value, dec!(250000000));
        assert_eq!(record.transaction_type, TransactionType::OwnChannel);
        assert_eq!(record.segment, Segment::Government);
        assert_eq!(record.responsible_person, None);

        let bad = row.with_cell(COL_SEGMENT, RawCell::text("Retail"));
        assert!(matches!(
            FieldMapper::default().map_contract(&bad),
            Err(ImportError::InvalidValue { row: 5, .. })
        ));
    }

    #[test]
    fn test_map_upload_candidate() {
        let mapper = FieldMapper::default();
        let row = RawRow::new(3)
            .with_cell(COL_ACCOUNT_NUMBER, RawCell::text("ABC-1"))
            .with_cell(COL_CUSTOMER_NAME, RawCell::text("Budi"));
        let candidate = mapper.map_upload_candidate(&row, "C3mr").unwrap();
        assert_eq!(candidate.category, "C3mr");
        assert_eq!(candidate.billed_amount, "0");
        assert_eq!(candidate.owner_id, "");

        let row = RawRow::new(4).with_cell(COL_ACCOUNT_NUMBER, RawCell::text("ABC-2"));
        assert!(mapper.map_upload_candidate(&row, "C3mr").is_none());
    }
}
