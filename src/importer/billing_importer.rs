// ==========================================
// 客户账单监控系统 - 客户账单批量导入器
// ==========================================
// 策略: 全部成功或全部回滚（任一行出错 → 整批不入库）
// 流程: 大小检查 → 格式识别 → 解析 → 列检查 → 逐行(校验 → 映射 → 查重 → 外键) → 提交
// ==========================================

use crate::config::ImportConfigReader;
use crate::domain::billing::NewBillingRecord;
use crate::domain::import::{AllOrNothingReport, ParsedSheet, RawRow};
use crate::i18n::{t, t_with_args};
use crate::importer::batch::{drive_rows, ensure_size, row_message};
use crate::importer::conflict_handler::DuplicateChecker;
use crate::importer::dq_validator::RequiredFieldValidator;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::{FieldMapper, BILLING_REQUIRED_COLUMNS, COL_ACCOUNT_NUMBER};
use crate::importer::file_parser::{detect_format, FileFormat, UniversalFileParser};
use crate::importer::importer_trait::{FileParser, RowValidator};
use crate::repository::record_store::{BatchWriter, BillingStore};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, Span};
use uuid::Uuid;

// ==========================================
// BillingImporter - 客户账单导入器
// ==========================================
pub struct BillingImporter<S, C>
where
    S: BillingStore,
    C: ImportConfigReader,
{
    // 数据访问层
    store: Arc<S>,

    // 配置读取器
    config: Arc<C>,

    // 导入组件
    file_parser: Box<dyn FileParser>,
    validator: Box<dyn RowValidator>,
    field_mapper: FieldMapper,
}

impl<S, C> BillingImporter<S, C>
where
    S: BillingStore,
    C: ImportConfigReader,
{
    /// 使用默认组件创建导入器
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

    /// 指定各组件创建导入器
    ///
    /// # 参数
    /// - store: 客户账单存储
    /// - config: 配置读取器
    /// - file_parser: 文件解析器
    /// - validator: 必填字段校验器
    /// - field_mapper: 字段映射器
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
    /// # 参数
    /// - file_name: 上传文件名（用于识别格式）
    /// - bytes: 文件内容
    ///
    /// # 返回
    /// - Ok(AllOrNothingReport): 行级错误非空时 imported_count 为 0
    /// - Err: 结构性错误（格式 / 大小 / 解析 / 缺列）
    pub fn import_file(&self, file_name: &str, bytes: &[u8]) -> ImportResult<AllOrNothingReport> {
        ensure_size(bytes.len(), self.config.max_file_size_bytes())?;
        let format = detect_format(file_name, &FileFormat::TABULAR)?;
        let sheet = self.file_parser.parse_tabular(format, bytes)?;
        info!(file_name, format = %format, rows = sheet.rows.len(), "客户账单文件解析完成");
        self.import_sheet(&sheet)
    }

    /// 导入已解析的表格
    #[instrument(skip(self, sheet), fields(batch_id))]
    pub fn import_sheet(&self, sheet: &ParsedSheet) -> ImportResult<AllOrNothingReport> {
        let batch_id = Uuid::new_v4().to_string();
        Span::current().record("batch_id", batch_id.as_str());
        info!(batch_id = %batch_id, rows = sheet.rows.len(), "开始导入客户账单");

        // === 步骤 1: 列检查（仅当列整体缺失时终止整批） ===
        let missing = sheet.missing_columns(BILLING_REQUIRED_COLUMNS);
        if !missing.is_empty() {
            error!(missing = ?missing, "缺少必需列，整批终止");
            return Err(ImportError::MissingColumns(
                missing.into_iter().map(str::to_string).collect(),
            ));
        }

        // === 步骤 2: 逐行处理 ===
        let checker = DuplicateChecker::new(self.store.as_ref(), "billing");
        let outcomes = drive_rows(&sheet.rows, |row| self.process_row(row, &checker))?;
        debug!(
            staged = outcomes.staged.len(),
            rejected = outcomes.rejected.len(),
            "逐行处理完成"
        );

        // === 步骤 3: 任一行出错 → 整批丢弃 ===
        if !outcomes.rejected.is_empty() {
            info!(
                batch_id = %batch_id,
                rejected = outcomes.rejected.len(),
                "存在错误行，整批不入库"
            );
            return Ok(AllOrNothingReport {
                batch_id,
                imported_count: 0,
                errors: outcomes.rejected.iter().map(row_message).collect(),
                message: t("import.batch_rejected"),
            });
        }

        // === 步骤 4: 批次事务内逐行暂存后提交 ===
        let staged = &outcomes.staged;
        let committed = self
            .store
            .write_batch(&mut |batch: &mut dyn BatchWriter<NewBillingRecord>| {
                for record in staged {
                    batch.stage(record)?;
                }
                Ok(())
            });
        match committed {
            Ok(count) => {
                info!(batch_id = %batch_id, imported = count, "客户账单导入完成");
                Ok(AllOrNothingReport {
                    batch_id,
                    imported_count: count,
                    errors: Vec::new(),
                    message: t_with_args("import.batch_committed", &[("count", &count.to_string())]),
                })
            }
            Err(e) => {
                // 提交失败（含唯一约束兜底）：事务已回滚，整批视为失败
                error!(batch_id = %batch_id, error = %e, "提交失败，整批回滚");
                let err = ImportError::from(e);
                Ok(AllOrNothingReport {
                    batch_id,
                    imported_count: 0,
                    errors: vec![row_message(&err)],
                    message: t("import.batch_rejected"),
                })
            }
        }
    }

    /// 单行处理：校验 → 映射 → 查重 → 客户经理存在性
    fn process_row(
        &self,
        row: &RawRow,
        checker: &DuplicateChecker<'_, S>,
    ) -> ImportResult<NewBillingRecord> {
        self.validator.validate(row, BILLING_REQUIRED_COLUMNS)?;

        let key = self.field_mapper.natural_key(row, COL_ACCOUNT_NUMBER)?;
        checker.check(&key, row.row_number)?;

        let record = self.field_mapper.map_billing(row)?;
        if !self.store.manager_exists(record.owner_id)? {
            return Err(ImportError::UnknownManager {
                row: row.row_number,
                owner: record.owner_id.to_string(),
            });
        }
        Ok(record)
    }
}
