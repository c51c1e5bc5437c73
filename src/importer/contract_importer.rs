// ==========================================
// 客户账单监控系统 - 合同批量导入器
// ==========================================
// 策略: 部分成功（失败行跳过并记录，成功行整体一次提交）
// 流程: 大小检查 → 格式识别 → 解析 → 逐行(校验 → 映射 → 查重) → 提交
// 说明: 同批次内重复合同号不做检测，提交时由唯一约束兜底
// ==========================================

use crate::config::ImportConfigReader;
use crate::domain::contract::NewContractRecord;
use crate::domain::import::{ParsedSheet, PartialImportReport, RawRow, RowError};
use crate::i18n::t_with_args;
use crate::importer::batch::{drive_rows, ensure_size, row_message};
use crate::importer::conflict_handler::DuplicateChecker;
use crate::importer::dq_validator::RequiredFieldValidator;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::{FieldMapper, COL_CONTRACT_NUMBER, CONTRACT_REQUIRED_FIELDS};
use crate::importer::file_parser::{detect_format, FileFormat, UniversalFileParser};
use crate::importer::importer_trait::{FileParser, RowValidator};
use crate::repository::record_store::{BatchWriter, ContractStore};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, Span};
use uuid::Uuid;

pub struct ContractImporter<S, C>
where
    S: ContractStore,
    C: ImportConfigReader,
{
    store: Arc<S>,
    config: Arc<C>,
    file_parser: Box<dyn FileParser>,
    validator: Box<dyn RowValidator>,
    field_mapper: FieldMapper,
}

impl<S, C> ContractImporter<S, C>
where
    S: ContractStore,
    C: ImportConfigReader,
{
    pub fn new(store: Arc<S>, config: Arc<C>) -> Self {
        let file_parser = Box::new(UniversalFileParser::new(config.csv_sniff_bytes()));
        Self::with_components(
            store,
            config,
            file_parser,
            Box::new(RequiredFieldValidator::default()),
            FieldMapper::default(),
        )
    }

    pub fn with_components(
        store: Arc<S>,
        config: Arc<C>,
        file_parser: Box<dyn FileParser>,
        validator: Box<dyn RowValidator>,
        field_mapper: FieldMapper,
    ) -> Self {
        Self {
            store,
            config,
            file_parser,
            validator,
            field_mapper,
        }
    }

    /// 导入上传文件
    ///
    /// # 返回
    /// - Ok(PartialImportReport): 成功条数 + 逐行错误
    /// - Err: 结构性错误（格式 / 大小 / 解析）
    pub fn import_file(&self, file_name: &str, bytes: &[u8]) -> ImportResult<PartialImportReport> {
        ensure_size(bytes.len(), self.config.max_file_size_bytes())?;
        let format = detect_format(file_name, &FileFormat::TABULAR)?;
        let sheet = self.file_parser.parse_tabular(format, bytes)?;
        info!(file_name, format = %format, rows = sheet.rows.len(), "合同文件解析完成");
        self.import_sheet(&sheet)
    }

    /// 导入已解析的表格
    #[instrument(skip(self, sheet), fields(batch_id))]
    pub fn import_sheet(&self, sheet: &ParsedSheet) -> ImportResult<PartialImportReport> {
        let batch_id = Uuid::new_v4().to_string();
        Span::current().record("batch_id", batch_id.as_str());
        info!(batch_id = %batch_id, rows = sheet.rows.len(), "开始导入合同");

        // === 步骤 1: 逐行处理 ===
        let checker = DuplicateChecker::new(self.store.as_ref(), "contract");
        let outcomes = drive_rows(&sheet.rows, |row| {
            self.process_row(row, &checker).map(|record| (row.row_number, record))
        })?;
        debug!(
            staged = outcomes.staged.len(),
            rejected = outcomes.rejected.len(),
            "逐行处理完成"
        );

        let mut errors: Vec<RowError> = outcomes.rejected.iter().map(to_row_error).collect();

        // === 步骤 2: 至少一行成功才提交 ===
        let mut imported_count = 0;
        if !outcomes.staged.is_empty() {
            let staged = &outcomes.staged;
            let committed = self
                .store
                .write_batch(&mut |batch: &mut dyn BatchWriter<NewContractRecord>| {
                    for (_, record) in staged {
                        batch.stage(record)?;
                    }
                    Ok(())
                });
            match committed {
                Ok(count) => imported_count = count,
                Err(e) => {
                    // 事务已回滚：原本成功的行全部改报为失败
                    error!(batch_id = %batch_id, error = %e, "提交失败，成功行回退为失败");
                    let err = ImportError::from(e);
                    let reason = err.user_message();
                    errors.extend(outcomes.staged.iter().map(|(row, _)| RowError {
                        row: *row,
                        message: t_with_args(
                            "import.row_message",
                            &[("row", &row.to_string()), ("message", &reason)],
                        ),
                    }));
                    errors.sort_by_key(|item| item.row);
                }
            }
        }

        info!(
            batch_id = %batch_id,
            imported = imported_count,
            failed = errors.len(),
            "合同导入完成"
        );

        Ok(PartialImportReport {
            batch_id,
            imported_count,
            errors,
            message: t_with_args(
                "import.partial_completed",
                &[("count", &imported_count.to_string())],
            ),
        })
    }

    /// 单行处理：校验 → 查重 → 映射
    fn process_row(
        &self,
        row: &RawRow,
        checker: &DuplicateChecker<'_, S>,
    ) -> ImportResult<NewContractRecord> {
        self.validator.validate(row, CONTRACT_REQUIRED_FIELDS)?;

        let key = self.field_mapper.natural_key(row, COL_CONTRACT_NUMBER)?;
        checker.check(&key, row.row_number)?;

        self.field_mapper.map_contract(row)
    }
}

fn to_row_error(err: &ImportError) -> RowError {
    RowError {
        row: err.row().unwrap_or_default(),
        message: row_message(err),
    }
}
