// ==========================================
// 客户账单监控系统 - 必填字段校验器实现
// ==========================================
// 职责: 检查必填字段是否缺失 / 为空 / 为 NA 哨兵
// 红线: 不做跨字段一致性校验（start_date > end_date 照常放行）
// ==========================================

use crate::domain::import::RawRow;
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::importer_trait::{FieldNormalizer, RowValidator};

pub struct RequiredFieldValidator {
    normalizer: Box<dyn FieldNormalizer>,
}

impl Default for RequiredFieldValidator {
    fn default() -> Self {
        Self::new(Box::new(DataCleaner))
    }
}

impl RequiredFieldValidator {
    pub fn new(normalizer: Box<dyn FieldNormalizer>) -> Self {
        Self { normalizer }
    }
}

impl RowValidator for RequiredFieldValidator {
    fn missing_fields(&self, row: &RawRow, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|field| self.normalizer.is_missing(row.get(field)))
            .map(|field| field.to_string())
            .collect()
    }

    fn validate(&self, row: &RawRow, required: &[&str]) -> ImportResult<()> {
        let fields = self.missing_fields(row, required);
        if fields.is_empty() {
            Ok(())
        } else {
            Err(ImportError::MissingRequiredField {
                row: row.row_number,
                fields,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::import::RawCell;

    const REQUIRED: &[&str] = &["no_akun", "nama_pelanggan", "am_id"];

    #[test]
    fn test_validate_complete_row() {
        let validator = RequiredFieldValidator::default();
        let row = RawRow::new(2)
            .with_cell("no_akun", RawCell::text("A-1"))
            .with_cell("nama_pelanggan", RawCell::text("Budi"))
            .with_cell("am_id", RawCell::Int(3));
        assert!(validator.validate(&row, REQUIRED).is_ok());
    }

    #[test]
    fn test_validate_reports_all_missing_fields() {
        let validator = RequiredFieldValidator::default();
        let row = RawRow::new(7)
            .with_cell("no_akun", RawCell::text("  "))
            .with_cell("nama_pelanggan", RawCell::text("NaN"));

        match validator.validate(&row, REQUIRED) {
            Err(ImportError::MissingRequiredField { row, fields }) => {
                assert_eq!(row, 7);
                assert_eq!(fields, vec!["no_akun", "nama_pelanggan", "am_id"]);
            }
            other => panic!("Expected MissingRequiredField, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_ignores_unknown_columns() {
        let validator = RequiredFieldValidator::default();
        let row = RawRow::new(2)
            .with_cell("no_akun", RawCell::text("A-1"))
            .with_cell("nama_pelanggan", RawCell::text("Budi"))
            .with_cell("am_id", RawCell::text("1"))
            .with_cell("catatan", RawCell::Empty);
        assert!(validator.missing_fields(&row, REQUIRED).is_empty());
    }
}
