// ==========================================
// 客户账单监控系统 - 数据清洗器实现
// ==========================================
// 职责: TRIM / NULL 标准化 / 自然键归一化 / 日期与金额解析
// 红线: 金额全程使用十进制，不经过二进制浮点运算
// ==========================================

use crate::domain::import::RawCell;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::importer_trait::FieldNormalizer;
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// 表格读取中视为“无值”的文本哨兵
pub const NA_SENTINELS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null", "NaT",
];

/// 日期格式（严格）
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// 金额精度（小数位）
pub const CURRENCY_SCALE: u32 = 2;

pub struct DataCleaner;

impl DataCleaner {
    /// 单元格字符串化（不做 TRIM）
    fn stringify(cell: &RawCell) -> String {
        cell.to_string()
    }

    /// 文本是否为 NA 哨兵
    pub fn is_na_text(value: &str) -> bool {
        let trimmed = value.trim();
        trimmed.is_empty() || NA_SENTINELS.contains(&trimmed)
    }

    /// 可选文本字段：缺失值 → None
    pub fn optional_text(&self, cell: Option<&RawCell>) -> Option<String> {
        if self.is_missing(cell) {
            return None;
        }
        cell.map(|c| self.clean_text(c)).filter(|s| !s.is_empty())
    }
}

/// 自然键归一化（字符串层面）
///
/// 当前缀全部为数字时去掉 ".0" / ".00" 尾巴：
/// "123.0" → "123"，"12.50" 保持不变，"AB.0" 保持不变
pub fn normalize_key_text(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some((head, tail)) = trimmed.split_once('.') {
        let head_is_digits = !head.is_empty() && head.chars().all(|c| c.is_ascii_digit());
        let tail_is_zeros = !tail.is_empty() && tail.chars().all(|c| c == '0');
        if head_is_digits && tail_is_zeros {
            return head.to_string();
        }
    }
    trimmed.to_string()
}

/// 金额按 2 位小数落库（四舍五入，远离零）
pub fn to_currency_scale(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// 解析带本地化格式的金额文本（用于 PDF 等自由文本）
///
/// 支持 "Rp" 前缀与千分位：
/// - "1.500.000" / "1,500,000" → 1500000
/// - "1.500.000,50" → 1500000.50
/// - "1,500,000.50" → 1500000.50
/// - "2500.5" → 2500.5
pub fn parse_locale_amount(raw: &str) -> Option<Decimal> {
    let mut text = raw.trim();
    for prefix in ["Rp.", "Rp", "rp.", "rp", "RP.", "RP", "IDR"] {
        if let Some(rest) = text.strip_prefix(prefix) {
            text = rest.trim_start();
            break;
        }
    }
    let text: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if text.is_empty() {
        return None;
    }

    let last_dot = text.rfind('.');
    let last_comma = text.rfind(',');
    let canonical = match (last_dot, last_comma) {
        (Some(dot), Some(comma)) => {
            if comma > dot {
                // 印尼格式：. 为千分位，, 为小数点
                text.replace('.', "").replace(',', ".")
            } else {
                text.replace(',', "")
            }
        }
        (None, Some(_)) => {
            if is_grouped(&text, ',') {
                text.replace(',', "")
            } else {
                text.replace(',', ".")
            }
        }
        (Some(_), None) => {
            if is_grouped(&text, '.') {
                text.replace('.', "")
            } else {
                text
            }
        }
        (None, None) => text,
    };

    Decimal::from_str(&canonical).ok()
}

/// 是否为规范的千分位写法（1-3 位开头，之后每组 3 位，且至少两组分隔或唯一一组恰好 3 位）
fn is_grouped(text: &str, separator: char) -> bool {
    let groups: Vec<&str> = text.split(separator).collect();
    if groups.len() < 2 {
        return false;
    }
    let head = groups[0];
    if head.is_empty() || head.len() > 3 || !head.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    groups[1..]
        .iter()
        .all(|g| g.len() == 3 && g.chars().all(|c| c.is_ascii_digit()))
}

impl FieldNormalizer for DataCleaner {
    fn is_missing(&self, cell: Option<&RawCell>) -> bool {
        match cell {
            None | Some(RawCell::Empty) | Some(RawCell::Error(_)) => true,
            Some(RawCell::Text(s)) => Self::is_na_text(s),
            Some(RawCell::Number(f)) => f.is_nan(),
            Some(_) => false,
        }
    }

    fn clean_text(&self, cell: &RawCell) -> String {
        Self::stringify(cell).trim().to_string()
    }

    fn natural_key(&self, cell: &RawCell) -> String {
        normalize_key_text(&self.clean_text(cell))
    }

    fn parse_date(&self, cell: &RawCell, row: usize, field: &str) -> ImportResult<NaiveDate> {
        let invalid = |value: String| ImportError::InvalidDate {
            row,
            field: field.to_string(),
            value,
        };

        match cell {
            // 已结构化的日期/时间：直接取日期部分
            RawCell::Date(d) => Ok(*d),
            RawCell::DateTime(dt) => Ok(dt.date()),
            RawCell::Empty => Err(invalid(String::new())),
            other => {
                let text = self.clean_text(other);
                NaiveDate::parse_from_str(&text, DATE_FORMAT).map_err(|_| invalid(text))
            }
        }
    }

    fn parse_amount(&self, cell: &RawCell, row: usize, field: &str) -> ImportResult<Decimal> {
        let text = self.clean_text(cell);
        let invalid = || ImportError::InvalidAmount {
            row,
            field: field.to_string(),
            value: text.clone(),
        };

        let amount = match cell {
            RawCell::Int(i) => Decimal::from(*i),
            RawCell::Number(f) if !f.is_finite() => return Err(invalid()),
            RawCell::Number(_) | RawCell::Text(_) => Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .map_err(|_| invalid())?,
            _ => return Err(invalid()),
        };

        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(invalid());
        }
        Ok(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_is_missing() {
        let cleaner = DataCleaner;
        assert!(cleaner.is_missing(None));
        assert!(cleaner.is_missing(Some(&RawCell::Empty)));
        assert!(cleaner.is_missing(Some(&RawCell::text("   "))));
        assert!(cleaner.is_missing(Some(&RawCell::text("nan"))));
        assert!(cleaner.is_missing(Some(&RawCell::text(" N/A "))));
        assert!(cleaner.is_missing(Some(&RawCell::Number(f64::NAN))));
        assert!(cleaner.is_missing(Some(&RawCell::Error("#DIV/0!".to_string()))));
        assert!(!cleaner.is_missing(Some(&RawCell::Int(0))));
        assert!(!cleaner.is_missing(Some(&RawCell::text("Budi"))));
    }

    #[test]
    fn test_natural_key() {
        let cleaner = DataCleaner;
        assert_eq!(cleaner.natural_key(&RawCell::text("123.0")), "123");
        assert_eq!(cleaner.natural_key(&RawCell::text(" 123 ")), "123");
        assert_eq!(cleaner.natural_key(&RawCell::Number(123.0)), "123");
        assert_eq!(cleaner.natural_key(&RawCell::Int(123)), "123");
        assert_eq!(cleaner.natural_key(&RawCell::text("12.50")), "12.50");
        assert_eq!(cleaner.natural_key(&RawCell::text("AB-1.0")), "AB-1.0");
    }

    #[test]
    fn test_parse_date() {
        let cleaner = DataCleaner;
        let expected = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();

        assert_eq!(
            cleaner.parse_date(&RawCell::text(" 2024-01-31 "), 2, "start_date").unwrap(),
            expected
        );
        assert_eq!(
            cleaner
                .parse_date(&RawCell::DateTime(expected.and_hms_opt(13, 45, 0).unwrap()), 2, "start_date")
                .unwrap(),
            expected
        );

        let err = cleaner
            .parse_date(&RawCell::text("31/01/2024"), 5, "end_date")
            .unwrap_err();
        match err {
            ImportError::InvalidDate { row, field, value } => {
                assert_eq!(row, 5);
                assert_eq!(field, "end_date");
                assert_eq!(value, "31/01/2024");
            }
            other => panic!("Expected InvalidDate, got {:?}", other),
        }

        assert!(cleaner.parse_date(&RawCell::Int(20240131), 2, "start_date").is_err());
    }

    #[test]
    fn test_parse_amount() {
        let cleaner = DataCleaner;
        assert_eq!(
            cleaner.parse_amount(&RawCell::text(" 1500000.50 "), 2, "jumlah_tagihan").unwrap(),
            dec!(1500000.50)
        );
        assert_eq!(
            cleaner.parse_amount(&RawCell::Number(2500.5), 2, "jumlah_tagihan").unwrap(),
            dec!(2500.5)
        );
        assert_eq!(
            cleaner.parse_amount(&RawCell::Int(100), 2, "jumlah_tagihan").unwrap(),
            dec!(100)
        );
        assert_eq!(
            cleaner.parse_amount(&RawCell::text("1e3"), 2, "jumlah_tagihan").unwrap(),
            dec!(1000)
        );
        // 十进制精确：0.1 + 0.2 不会出现浮点误差
        let a = cleaner.parse_amount(&RawCell::text("0.1"), 2, "x").unwrap();
        let b = cleaner.parse_amount(&RawCell::text("0.2"), 2, "x").unwrap();
        assert_eq!(a + b, dec!(0.3));

        assert!(matches!(
            cleaner.parse_amount(&RawCell::text("seratus"), 3, "jumlah_tagihan"),
            Err(ImportError::InvalidAmount { row: 3, .. })
        ));
        assert!(cleaner.parse_amount(&RawCell::text("-5"), 3, "jumlah_tagihan").is_err());
        assert!(cleaner.parse_amount(&RawCell::Bool(true), 3, "jumlah_tagihan").is_err());
    }

    #[test]
    fn test_to_currency_scale() {
        assert_eq!(to_currency_scale(dec!(10.005)), dec!(10.01));
        assert_eq!(to_currency_scale(dec!(10.004)), dec!(10.00));
        assert_eq!(to_currency_scale(dec!(7)), dec!(7));
    }

    #[test]
    fn test_parse_locale_amount() {
        assert_eq!(parse_locale_amount("Rp 1.500.000"), Some(dec!(1500000)));
        assert_eq!(parse_locale_amount("Rp. 1.500.000,50"), Some(dec!(1500000.50)));
        assert_eq!(parse_locale_amount("1,500,000"), Some(dec!(1500000)));
        assert_eq!(parse_locale_amount("1,500,000.25"), Some(dec!(1500000.25)));
        assert_eq!(parse_locale_amount("2500.5"), Some(dec!(2500.5)));
        assert_eq!(parse_locale_amount("12,5"), Some(dec!(12.5)));
        assert_eq!(parse_locale_amount("Rp"), None);
        assert_eq!(parse_locale_amount("abc"), None);
    }
}
