// ==========================================
// 客户账单监控系统 - 通用上传预览
// ==========================================
// 职责: csv / xlsx / xls / pdf → 候选客户行（只解析，不落库）
// 规则: 仅保留同时带有账号与客户名称的行
// ==========================================

use crate::config::ImportConfigReader;
use crate::domain::import::{ParsedSheet, UploadPreview};
use crate::importer::batch::ensure_size;
use crate::importer::error::ImportResult;
use crate::importer::field_mapper::FieldMapper;
use crate::importer::file_parser::{detect_format, FileFormat, UniversalFileParser};
use crate::importer::importer_trait::FileParser;
use crate::importer::labeled_fields::extract_rows;
use tracing::info;

pub struct UploadPreviewer {
    file_parser: Box<dyn FileParser>,
    field_mapper: FieldMapper,
    max_file_size_bytes: usize,
    default_category: String,
}

impl UploadPreviewer {
    pub fn new<C: ImportConfigReader + ?Sized>(config: &C) -> Self {
        Self::with_components(
            Box::new(UniversalFileParser::new(config.csv_sniff_bytes())),
            FieldMapper::default(),
            config.max_file_size_bytes(),
            config.default_category(),
        )
    }

    pub fn with_components(
        file_parser: Box<dyn FileParser>,
        field_mapper: FieldMapper,
        max_file_size_bytes: usize,
        default_category: String,
    ) -> Self {
        Self {
            file_parser,
            field_mapper,
            max_file_size_bytes,
            default_category,
        }
    }

    /// 解析上传文件并返回候选行
    ///
    /// # 返回
    /// - Ok(UploadPreview): 可能为空（调用方决定如何提示）
    /// - Err: 大小 / 格式 / 解析失败
    pub fn preview(&self, file_name: &str, bytes: &[u8]) -> ImportResult<UploadPreview> {
        ensure_size(bytes.len(), self.max_file_size_bytes)?;
        let format = detect_format(file_name, &FileFormat::UPLOAD)?;

        let sheet: ParsedSheet = if format.is_tabular() {
            self.file_parser.parse_tabular(format, bytes)?
        } else {
            let text = self.file_parser.extract_text(bytes)?;
            extract_rows(&text, &self.default_category)
        };

        let rows: Vec<_> = sheet
            .rows
            .iter()
            .filter_map(|row| self.field_mapper.map_upload_candidate(row, &self.default_category))
            .collect();

        info!(file_name, format = %format, candidates = rows.len(), "上传预览完成");

        Ok(UploadPreview {
            file_name: file_name.to_string(),
            format: format.to_string(),
            row_count: rows.len(),
            rows,
        })
    }
}
