// ==========================================
// 客户账单监控系统 - 导入管道数据结构
// ==========================================
// 职责: 原始单元格 / 原始行 / 解析结果 / 导入报告
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ==========================================
// RawCell - 原始单元格
// ==========================================
// 保留来源格式的原生类型（文本 / 数字 / 日期），由 FieldNormalizer 统一转换
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Text(String),
    Number(f64),
    Int(i64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// 表格错误单元格（#N/A、#DIV/0! 等）
    Error(String),
}

impl RawCell {
    pub fn text(value: impl Into<String>) -> Self {
        RawCell::Text(value.into())
    }

    /// 是否为空白单元格（空 / 仅空白字符）
    pub fn is_blank(&self) -> bool {
        match self {
            RawCell::Empty => true,
            RawCell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for RawCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawCell::Empty => Ok(()),
            RawCell::Text(s) => f.write_str(s),
            RawCell::Number(n) => write!(f, "{}", n),
            RawCell::Int(i) => write!(f, "{}", i),
            RawCell::Bool(b) => write!(f, "{}", b),
            RawCell::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            RawCell::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            RawCell::Error(e) => f.write_str(e),
        }
    }
}

// ==========================================
// RawRow - 原始行
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    /// 源文件中的物理行号（表头为第 1 行，首个数据行为第 2 行）
    pub row_number: usize,
    /// 归一化列名 → 单元格
    pub cells: HashMap<String, RawCell>,
}

impl RawRow {
    pub fn new(row_number: usize) -> Self {
        Self {
            row_number,
            cells: HashMap::new(),
        }
    }

    pub fn with_cell(mut self, column: &str, cell: RawCell) -> Self {
        self.cells.insert(column.to_string(), cell);
        self
    }

    pub fn get(&self, column: &str) -> Option<&RawCell> {
        self.cells.get(column)
    }

    /// 整行是否全部为空白
    pub fn is_blank(&self) -> bool {
        self.cells.values().all(RawCell::is_blank)
    }
}

/// 表格解析结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedSheet {
    /// 归一化后的列名（保持源顺序）
    pub columns: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl ParsedSheet {
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// 缺失的列（按传入顺序）
    pub fn missing_columns<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|c| !self.has_column(c))
            .collect()
    }
}

// ==========================================
// 导入报告
// ==========================================

/// 行级错误（部分成功策略）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

/// 部分成功策略的导入结果（合同导入）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialImportReport {
    pub batch_id: String,
    pub imported_count: usize,
    pub errors: Vec<RowError>,
    pub message: String,
}

/// 全部成功或全部回滚策略的导入结果（客户账单导入）
///
/// errors 非空时 imported_count 恒为 0
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllOrNothingReport {
    pub batch_id: String,
    pub imported_count: usize,
    pub errors: Vec<String>,
    pub message: String,
}

impl AllOrNothingReport {
    pub fn is_committed(&self) -> bool {
        self.errors.is_empty()
    }
}

// ==========================================
// 通用上传预览
// ==========================================

/// 上传文件中识别出的候选客户行（仅预览，不落库）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadCandidate {
    pub row: usize,
    pub account_number: String,
    pub customer_name: String,
    pub product: String,
    pub category: String,
    pub billed_amount: String,
    pub invoice_status: String,
    pub paid_amount: String,
    pub owner_id: String,
    pub period_start: String,
    pub period_end: String,
}

/// 通用上传预览结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadPreview {
    pub file_name: String,
    pub format: String,
    pub row_count: usize,
    pub rows: Vec<UploadCandidate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_row_blank() {
        let row = RawRow::new(2)
            .with_cell("no_akun", RawCell::text("  "))
            .with_cell("nama_pelanggan", RawCell::Empty);
        assert!(row.is_blank());

        let row = row.with_cell("produk", RawCell::Int(0));
        assert!(!row.is_blank());
    }

    #[test]
    fn test_missing_columns_keeps_order() {
        let sheet = ParsedSheet {
            columns: vec!["no_akun".to_string(), "produk".to_string()],
            rows: Vec::new(),
        };
        assert_eq!(
            sheet.missing_columns(&["no_akun", "nama_pelanggan", "produk", "am_id"]),
            vec!["nama_pelanggan", "am_id"]
        );
    }

    #[test]
    fn test_raw_cell_display() {
        assert_eq!(RawCell::Number(1.5).to_string(), "1.5");
        assert_eq!(RawCell::Int(42).to_string(), "42");
        assert_eq!(
            RawCell::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()).to_string(),
            "2024-02-29"
        );
    }
}
