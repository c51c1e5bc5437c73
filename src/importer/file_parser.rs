// ==========================================
// 客户账单监控系统 - 文件解析器实现
// ==========================================
// 支持: Excel (.xlsx/.xls) / CSV (.csv) / PDF (.pdf, 纯文本抽取)
// 约定: 列名归一化为小写 + 下划线，行号为源文件物理行号
// ==========================================

use crate::domain::import::{ParsedSheet, RawCell, RawRow};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::importer_trait::FileParser;
use calamine::{Data, Range, Reader, Xls, Xlsx};
use chrono::{NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use std::fmt;
use std::io::Cursor;
use tracing::debug;

/// 默认分隔符嗅探字节数
pub const DEFAULT_SNIFF_BYTES: usize = 1024;

/// 候选分隔符（按优先级）
const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

// ==========================================
// FileFormat - 文件格式
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Xlsx,
    Xls,
    Pdf,
}

impl FileFormat {
    /// 批量导入（账单/合同）允许的格式
    pub const TABULAR: [FileFormat; 3] = [FileFormat::Csv, FileFormat::Xlsx, FileFormat::Xls];

    /// 通用上传允许的格式
    pub const UPLOAD: [FileFormat; 4] = [
        FileFormat::Csv,
        FileFormat::Xlsx,
        FileFormat::Xls,
        FileFormat::Pdf,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Xlsx => "xlsx",
            FileFormat::Xls => "xls",
            FileFormat::Pdf => "pdf",
        }
    }

    /// 按文件名扩展名识别格式（大小写不敏感）
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let ext = file_name.rsplit_once('.')?.1.trim().to_lowercase();
        match ext.as_str() {
            "csv" => Some(FileFormat::Csv),
            "xlsx" => Some(FileFormat::Xlsx),
            "xls" => Some(FileFormat::Xls),
            "pdf" => Some(FileFormat::Pdf),
            _ => None,
        }
    }

    pub fn is_tabular(&self) -> bool {
        !matches!(self, FileFormat::Pdf)
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// 校验文件扩展名，在任何解析之前执行
///
/// # 返回
/// - Ok(FileFormat): 识别出的格式
/// - Err(UnsupportedFormat): 扩展名缺失或不在允许列表中
pub fn detect_format(file_name: &str, allowed: &[FileFormat]) -> ImportResult<FileFormat> {
    let allowed_list = allowed
        .iter()
        .map(|f| format!(".{}", f.extension()))
        .collect::<Vec<_>>()
        .join(", ");

    match FileFormat::from_file_name(file_name) {
        Some(format) if allowed.contains(&format) => Ok(format),
        _ => {
            let ext = file_name
                .rsplit_once('.')
                .map(|(_, e)| e.to_lowercase())
                .unwrap_or_default();
            Err(ImportError::UnsupportedFormat {
                ext,
                allowed: allowed_list,
            })
        }
    }
}

/// 列名归一化：TRIM + 小写 + 连续空白折叠为下划线
///
/// 例: " Nama  Pelanggan " → "nama_pelanggan"
pub fn normalize_header(raw: &str) -> String {
    raw.split_whitespace()
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser {
    sniff_bytes: usize,
}

impl Default for CsvParser {
    fn default() -> Self {
        Self::new(DEFAULT_SNIFF_BYTES)
    }
}

impl CsvParser {
    pub fn new(sniff_bytes: usize) -> Self {
        Self {
            sniff_bytes: sniff_bytes.max(1),
        }
    }

    /// 从文件开头的样本中嗅探分隔符
    ///
    /// 选择在每个完整样本行中出现次数一致且 > 0 的候选；
    /// 都不一致时取首行出现最多的候选；仍无则回退为 ','
    pub fn sniff_delimiter(&self, bytes: &[u8]) -> u8 {
        let sample = &bytes[..bytes.len().min(self.sniff_bytes)];
        let text = String::from_utf8_lossy(sample);

        let mut lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        // 样本被截断时最后一行可能不完整
        if bytes.len() > self.sniff_bytes && lines.len() > 1 {
            lines.pop();
        }
        if lines.is_empty() {
            return b',';
        }

        let counts: Vec<Vec<usize>> = DELIMITER_CANDIDATES
            .iter()
            .map(|d| lines.iter().map(|l| count_unquoted(l, *d)).collect())
            .collect();

        let consistent = DELIMITER_CANDIDATES
            .iter()
            .zip(counts.iter())
            .filter(|(_, per_line)| per_line[0] > 0 && per_line.iter().all(|c| *c == per_line[0]))
            .max_by_key(|(_, per_line)| per_line[0]);
        if let Some((delimiter, _)) = consistent {
            return *delimiter;
        }

        DELIMITER_CANDIDATES
            .iter()
            .zip(counts.iter())
            .filter(|(_, per_line)| per_line[0] > 0)
            .max_by_key(|(_, per_line)| per_line[0])
            .map(|(d, _)| *d)
            .unwrap_or(b',')
    }

    pub fn parse(&self, bytes: &[u8]) -> ImportResult<ParsedSheet> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let delimiter = self.sniff_delimiter(bytes);
        debug!(delimiter = %(delimiter as char).escape_default(), "CSV 分隔符嗅探完成");

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(bytes);

        // 读取表头
        let headers: Vec<String> = reader.headers()?.iter().map(normalize_header).collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(ImportError::ParseFailure("文件为空或缺少表头".to_string()));
        }

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            let row_number = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(rows.len() + 2);

            let mut row = RawRow::new(row_number);
            for (col_idx, value) in record.iter().enumerate() {
                if let Some(header) = headers.get(col_idx).filter(|h| !h.is_empty()) {
                    let cell = if value.is_empty() {
                        RawCell::Empty
                    } else {
                        RawCell::text(value)
                    };
                    row.cells.insert(header.clone(), cell);
                }
            }

            // 跳过完全空白的行
            if row.is_blank() {
                continue;
            }
            rows.push(row);
        }

        Ok(ParsedSheet {
            columns: headers.into_iter().filter(|h| !h.is_empty()).collect(),
            rows,
        })
    }
}

/// 统计引号外出现的分隔符次数
fn count_unquoted(line: &str, delimiter: u8) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for b in line.bytes() {
        if b == b'"' {
            in_quotes = !in_quotes;
        } else if b == delimiter && !in_quotes {
            count += 1;
        }
    }
    count
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

impl ExcelParser {
    pub fn parse(&self, format: FileFormat, bytes: &[u8]) -> ImportResult<ParsedSheet> {
        let cursor = Cursor::new(bytes.to_vec());
        let range = match format {
            FileFormat::Xlsx => first_sheet(Xlsx::new(cursor)?)?,
            FileFormat::Xls => first_sheet(Xls::new(cursor)?)?,
            other => {
                return Err(ImportError::UnsupportedFormat {
                    ext: other.extension().to_string(),
                    allowed: ".xlsx, .xls".to_string(),
                })
            }
        };
        sheet_from_range(&range)
    }
}

/// 读取第一个工作表
fn first_sheet<R>(mut workbook: R) -> ImportResult<Range<Data>>
where
    R: Reader<Cursor<Vec<u8>>>,
    R::Error: fmt::Display,
{
    workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ImportError::ParseFailure("Excel 文件无工作表".to_string()))?
        .map_err(|e| ImportError::ParseFailure(format!("Excel: {}", e)))
}

/// 将工作表区域转换为 ParsedSheet（首行为表头）
fn sheet_from_range(range: &Range<Data>) -> ImportResult<ParsedSheet> {
    // 区域起点（0 基），用于换算物理行号
    let start_row = range.start().map(|(r, _)| r as usize).unwrap_or(0);

    let mut rows_iter = range.rows();
    let header_row = rows_iter
        .next()
        .ok_or_else(|| ImportError::ParseFailure("文件为空或缺少表头".to_string()))?;

    let headers: Vec<String> = header_row
        .iter()
        .map(|cell| normalize_header(&cell.to_string()))
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(ImportError::ParseFailure("文件为空或缺少表头".to_string()));
    }

    let mut rows = Vec::new();
    for (idx, data_row) in rows_iter.enumerate() {
        // 表头物理行号 = start_row + 1，数据行依次递增
        let mut row = RawRow::new(start_row + idx + 2);
        for (col_idx, cell) in data_row.iter().enumerate() {
            if let Some(header) = headers.get(col_idx).filter(|h| !h.is_empty()) {
                row.cells.insert(header.clone(), convert_cell(cell));
            }
        }

        // 跳过完全空白的行
        if row.is_blank() {
            continue;
        }
        rows.push(row);
    }

    Ok(ParsedSheet {
        columns: headers.into_iter().filter(|h| !h.is_empty()).collect(),
        rows,
    })
}

/// calamine 单元格 → RawCell
fn convert_cell(cell: &Data) -> RawCell {
    match cell {
        Data::Empty => RawCell::Empty,
        Data::String(s) => RawCell::Text(s.clone()),
        Data::Float(f) => RawCell::Number(*f),
        Data::Int(i) => RawCell::Int(*i),
        Data::Bool(b) => RawCell::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) => RawCell::DateTime(value),
            None => RawCell::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
            .map(RawCell::DateTime)
            .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d").map(RawCell::Date))
            .unwrap_or_else(|_| RawCell::Text(s.clone())),
        Data::DurationIso(s) => RawCell::Text(s.clone()),
        Data::Error(e) => RawCell::Error(e.to_string()),
    }
}

// ==========================================
// PDF 文本抽取
// ==========================================
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    pub fn extract(&self, bytes: &[u8]) -> ImportResult<String> {
        pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ImportError::ParseFailure(format!("PDF: {}", e)))
    }
}

// ==========================================
// 通用文件解析器（根据格式自动选择）
// ==========================================
pub struct UniversalFileParser {
    csv: CsvParser,
}

impl Default for UniversalFileParser {
    fn default() -> Self {
        Self::new(DEFAULT_SNIFF_BYTES)
    }
}

impl UniversalFileParser {
    pub fn new(sniff_bytes: usize) -> Self {
        Self {
            csv: CsvParser::new(sniff_bytes),
        }
    }
}

impl FileParser for UniversalFileParser {
    fn parse_tabular(&self, format: FileFormat, bytes: &[u8]) -> ImportResult<ParsedSheet> {
        let sheet = match format {
            FileFormat::Csv => self.csv.parse(bytes)?,
            FileFormat::Xlsx | FileFormat::Xls => ExcelParser.parse(format, bytes)?,
            FileFormat::Pdf => {
                return Err(ImportError::UnsupportedFormat {
                    ext: "pdf".to_string(),
                    allowed: ".csv, .xlsx, .xls".to_string(),
                })
            }
        };
        debug!(
            format = %format,
            columns = sheet.columns.len(),
            rows = sheet.rows.len(),
            "表格解析完成"
        );
        Ok(sheet)
    }

    fn extract_text(&self, bytes: &[u8]) -> ImportResult<String> {
        PdfTextExtractor.extract(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format() {
        assert_eq!(
            detect_format("Data Pelanggan.XLSX", &FileFormat::TABULAR).unwrap(),
            FileFormat::Xlsx
        );
        assert!(matches!(
            detect_format("kontrak.pdf", &FileFormat::TABULAR),
            Err(ImportError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            detect_format("noext", &FileFormat::UPLOAD),
            Err(ImportError::UnsupportedFormat { .. })
        ));
        assert_eq!(
            detect_format("scan.pdf", &FileFormat::UPLOAD).unwrap(),
            FileFormat::Pdf
        );
    }

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header(" Nama  Pelanggan "), "nama_pelanggan");
        assert_eq!(normalize_header("NO_AKUN"), "no_akun");
        assert_eq!(normalize_header("   "), "");
    }

    #[test]
    fn test_sniff_delimiter() {
        let parser = CsvParser::default();
        assert_eq!(parser.sniff_delimiter(b"a;b;c\n1;2;3\n"), b';');
        assert_eq!(parser.sniff_delimiter(b"a\tb\n1\t2\n"), b'\t');
        assert_eq!(parser.sniff_delimiter(b"a,b\n\"1,5\",2\n"), b',');
        assert_eq!(parser.sniff_delimiter(b"single\nvalue\n"), b',');
    }

    #[test]
    fn test_csv_parser_rows_and_numbers() {
        let data = "\u{feff}No Akun;Nama Pelanggan;Jumlah Tagihan\nA-1;Budi;1000\n;;\nA-2;Sari;2500.50\n";
        let sheet = CsvParser::default().parse(data.as_bytes()).unwrap();

        assert_eq!(
            sheet.columns,
            vec!["no_akun", "nama_pelanggan", "jumlah_tagihan"]
        );
        // 全空白行被跳过，但物理行号保持不变
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0].row_number, 2);
        assert_eq!(sheet.rows[1].row_number, 4);
        assert_eq!(sheet.rows[1].get("jumlah_tagihan"), Some(&RawCell::text("2500.50")));
    }

    #[test]
    fn test_csv_parser_empty_file() {
        let result = CsvParser::default().parse(b"");
        assert!(matches!(result, Err(ImportError::ParseFailure(_))));
    }

    #[test]
    fn test_csv_short_row_leaves_columns_absent() {
        let sheet = CsvParser::default().parse(b"a,b,c\n1,2\n").unwrap();
        assert_eq!(sheet.rows.len(), 1);
        assert!(sheet.rows[0].get("c").is_none());
    }

    #[test]
    fn test_excel_parser_rejects_garbage() {
        let result = ExcelParser.parse(FileFormat::Xlsx, b"not a workbook");
        assert!(matches!(result, Err(ImportError::ParseFailure(_))));
    }

    #[test]
    fn test_convert_cell() {
        assert_eq!(convert_cell(&Data::Float(123.0)), RawCell::Number(123.0));
        assert_eq!(convert_cell(&Data::Empty), RawCell::Empty);
        assert_eq!(
            convert_cell(&Data::DateTimeIso("2024-01-31".to_string())),
            RawCell::Date(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap())
        );
    }
}
