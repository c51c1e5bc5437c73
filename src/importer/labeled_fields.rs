// ==========================================
// 客户账单监控系统 - 自由文本字段抽取
// ==========================================
// 职责: 从 PDF 抽取的纯文本中按 "标签: 值" 识别客户行
// 规则: 每行独立匹配；至少命中 2 个标签才产生候选行
// 说明: 尽力而为，不符合标签约定的行直接忽略，不报错
// ==========================================

use crate::domain::import::{ParsedSheet, RawCell, RawRow};
use crate::domain::types::InvoiceStatus;
use crate::importer::data_cleaner::parse_locale_amount;
use crate::importer::field_mapper::{
    COL_ACCOUNT_NUMBER, COL_BILLED_AMOUNT, COL_CATEGORY, COL_CUSTOMER_NAME, COL_INVOICE_STATUS,
    COL_PAID_AMOUNT, COL_PRODUCT,
};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// 产生候选行所需的最少命中标签数
pub const MIN_MATCHED_LABELS: usize = 2;

struct LabeledField {
    column: &'static str,
    label: Regex,
    value: Regex,
}

fn labeled_fields() -> &'static [LabeledField] {
    static FIELDS: OnceLock<Vec<LabeledField>> = OnceLock::new();
    FIELDS.get_or_init(|| {
        vec![
            LabeledField {
                column: COL_ACCOUNT_NUMBER,
                label: Regex::new(r"(?i)\b(?:No\.?\s*Akun|Account\s*No\.?)[:\s]+")
                    .expect("invalid account label regex"),
                value: Regex::new(r"(?i)^[A-Z0-9\-]+").expect("invalid account value regex"),
            },
            LabeledField {
                column: COL_CUSTOMER_NAME,
                label: Regex::new(r"(?i)\b(?:Nama|Name)[:\s]+").expect("invalid name label regex"),
                value: Regex::new(r"^[A-Za-z\s]+").expect("invalid name value regex"),
            },
            LabeledField {
                column: COL_PRODUCT,
                label: Regex::new(r"(?i)\b(?:Produk|Product)[:\s]+")
                    .expect("invalid product label regex"),
                value: Regex::new(r"^[A-Za-z0-9\s]+").expect("invalid product value regex"),
            },
            LabeledField {
                column: COL_BILLED_AMOUNT,
                label: Regex::new(r"(?i)\b(?:Tagihan|Bill|Amount)[:\s]+(?:Rp\.?\s*)?")
                    .expect("invalid amount label regex"),
                value: Regex::new(r"^[0-9,\.]+").expect("invalid amount value regex"),
            },
        ]
    })
}

/// 单行抽取
///
/// 每个标签的取值截止到其后出现的下一个标签，
/// 避免 "Nama: Budi Produk: Astinet" 中姓名吞掉后续标签
///
/// # 返回
/// - Vec<(列名, 值)>: 按标签定义顺序
pub fn extract_line(line: &str) -> Vec<(&'static str, String)> {
    let fields = labeled_fields();

    // (字段下标, 标签起点, 取值起点)
    let hits: Vec<(usize, usize, usize)> = fields
        .iter()
        .enumerate()
        .filter_map(|(idx, field)| field.label.find(line).map(|m| (idx, m.start(), m.end())))
        .collect();

    let mut values = Vec::new();
    for &(idx, _, value_start) in &hits {
        let value_end = hits
            .iter()
            .map(|&(_, start, _)| start)
            .filter(|&start| start >= value_start)
            .min()
            .unwrap_or(line.len());

        let segment = &line[value_start..value_end];
        if let Some(m) = fields[idx].value.find(segment) {
            let value = m.as_str().trim();
            if !value.is_empty() {
                values.push((fields[idx].column, value.to_string()));
            }
        }
    }
    values
}

/// 从整篇文本抽取候选行
///
/// # 参数
/// - text: 按页顺序拼接的文本
/// - default_category: 未识别字段的默认分类
///
/// # 返回
/// - ParsedSheet: 行号为文本中的行号（从 1 开始）
pub fn extract_rows(text: &str, default_category: &str) -> ParsedSheet {
    let mut rows = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let values = extract_line(line);
        if values.len() < MIN_MATCHED_LABELS {
            continue;
        }

        let mut row = RawRow::new(idx + 1)
            .with_cell(COL_CATEGORY, RawCell::text(default_category))
            .with_cell(COL_INVOICE_STATUS, RawCell::text(InvoiceStatus::NotSent.label()))
            .with_cell(COL_PAID_AMOUNT, RawCell::text("0"));

        for (column, value) in values {
            let value = if column == COL_BILLED_AMOUNT {
                parse_locale_amount(&value)
                    .map(|amount| amount.normalize().to_string())
                    .unwrap_or(value)
            } else {
                value
            };
            row.cells.insert(column.to_string(), RawCell::Text(value));
        }
        rows.push(row);
    }

    debug!(candidates = rows.len(), "自由文本抽取完成");

    ParsedSheet {
        columns: vec![
            COL_ACCOUNT_NUMBER.to_string(),
            COL_CUSTOMER_NAME.to_string(),
            COL_PRODUCT.to_string(),
            COL_BILLED_AMOUNT.to_string(),
            COL_CATEGORY.to_string(),
            COL_INVOICE_STATUS.to_string(),
            COL_PAID_AMOUNT.to_string(),
        ],
        rows,
    }
}
