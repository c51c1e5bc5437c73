// ==========================================
// 客户账单监控系统 - 合同 API
// ==========================================
// 职责: 合同增删改查 / PDF 附件管理 / 板块负责人名册
// 红线: 附件先写 blob 再落库；删除附件失败只记日志，不影响记录操作
// ==========================================

use chrono::{Local, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::access::require_privileged;
use crate::api::error::{ApiError, ApiResult};
use crate::domain::contract::{ContractPatch, ContractPeriod, ContractRecord, NewContractRecord};
use crate::domain::types::Segment;
use crate::domain::user::Principal;
use crate::i18n::{t, t_with_args};
use crate::importer::data_cleaner::{normalize_key_text, to_currency_scale};
use crate::importer::field_mapper::{
    COL_CONTRACT_CUSTOMER, COL_CONTRACT_NUMBER, COL_CONTRACT_VALUE, COL_JOB_TITLE,
};
use crate::repository::{ContractRepository, NaturalKeyLookup, RepositoryError};
use crate::storage::{contract_document_name, BlobStore, StorageError};

/// 合同附件唯一允许的扩展名
pub const DOCUMENT_EXTENSION: &str = "pdf";

// ==========================================
// 响应结构
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractView {
    #[serde(flatten)]
    pub record: ContractRecord,
    pub contract_period: ContractPeriod,
    pub contract_period_label: String,
}

impl From<ContractRecord> for ContractView {
    fn from(record: ContractRecord) -> Self {
        let contract_period = record.contract_period();
        Self {
            contract_period_label: contract_period.label(),
            contract_period,
            record,
        }
    }
}

/// 附件清单条目（仅列出文件仍存在的合同）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractDocumentInfo {
    pub id: i64,
    pub contract_number: String,
    pub job_title: String,
    pub customer_name: String,
    pub file_name: String,
    pub size_bytes: u64,
    /// 文件大小（MB，保留 2 位小数）
    pub size_mb: Decimal,
    /// 记录最近更新日期
    pub upload_date: NaiveDate,
}

/// 字节数换算为 MB（2 位小数）
pub fn size_in_mb(size_bytes: u64) -> Decimal {
    (Decimal::from(size_bytes) / Decimal::from(1024 * 1024))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

/// 批量删除结果（缺失的 id 逐条报告，不中断）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkDeleteReport {
    pub deleted_count: usize,
    pub errors: Vec<String>,
}

/// 板块负责人名册
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRoster {
    pub segment: Segment,
    pub label: String,
    pub members: Vec<String>,
}

impl From<Segment> for SegmentRoster {
    fn from(segment: Segment) -> Self {
        Self {
            segment,
            label: segment.to_string(),
            members: segment.roster().iter().map(|m| m.to_string()).collect(),
        }
    }
}

pub struct ContractApi {
    contract_repo: Arc<ContractRepository>,
    blob_store: Arc<dyn BlobStore>,
}

impl ContractApi {
    pub fn new(contract_repo: Arc<ContractRepository>, blob_store: Arc<dyn BlobStore>) -> Self {
        Self {
            contract_repo,
            blob_store,
        }
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 合同列表（附带合同周期标签）
    pub fn list_contracts(&self, segment: Option<Segment>) -> ApiResult<Vec<ContractView>> {
        let records = self.contract_repo.list(segment)?;
        Ok(records.into_iter().map(ContractView::from).collect())
    }

    pub fn get_contract(&self, id: i64) -> ApiResult<ContractView> {
        Ok(self.load(id)?.into())
    }

    /// 按合同号查询（合同号按导入规则归一化）
    pub fn get_contract_by_number(&self, contract_number: &str) -> ApiResult<ContractView> {
        let key = normalize_key_text(contract_number);
        self.contract_repo
            .find_by_number(&key)?
            .map(ContractView::from)
            .ok_or_else(|| RepositoryError::not_found("ContractRecord", &key).into())
    }

    /// 附件清单：跳过无附件或附件文件已丢失的合同
    pub fn list_documents(&self, principal: &Principal) -> ApiResult<Vec<ContractDocumentInfo>> {
        let mut documents = Vec::new();
        for record in self.contract_repo.list(None)? {
            let Some(path) = record.document_path.as_deref() else {
                continue;
            };
            let meta = match self.blob_store.metadata(path) {
                Ok(meta) => meta,
                Err(StorageError::NotFound(_)) => {
                    debug!(id = record.id, path, "附件文件缺失，跳过");
                    continue;
                }
                Err(e) => {
                    warn!(id = record.id, path, error = %e, "附件信息读取失败，跳过");
                    continue;
                }
            };
            let file_name = Path::new(path)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(path)
                .to_string();
            documents.push(ContractDocumentInfo {
                id: record.id,
                file_name,
                size_bytes: meta.size_bytes,
                size_mb: size_in_mb(meta.size_bytes),
                upload_date: record.updated_at.date(),
                contract_number: record.contract_number,
                job_title: record.job_title,
                customer_name: record.customer_name,
            });
        }
        debug!(user_id = principal.user_id, count = documents.len(), "查询合同附件清单");
        Ok(documents)
    }

    /// 合同附件路径（相对附件根目录）
    ///
    /// # 返回
    /// - Err(NotFound): 合同无附件，或附件文件已不存在
    pub fn document_path(&self, id: i64) -> ApiResult<String> {
        let record = self.load(id)?;
        let path = record.document_path.ok_or_else(|| {
            ApiError::NotFound(t_with_args(
                "import.file_not_found",
                &[("path", &record.contract_number)],
            ))
        })?;
        if !self.blob_store.exists(&path) {
            warn!(id, path = %path, "合同附件记录存在但文件缺失");
            return Err(ApiError::NotFound(t_with_args(
                "import.file_not_found",
                &[("path", &path)],
            )));
        }
        Ok(path)
    }

    /// 读取合同附件内容
    pub fn read_document(&self, id: i64) -> ApiResult<Vec<u8>> {
        let path = self.document_path(id)?;
        Ok(self.blob_store.read(&path)?)
    }

    pub fn segments(&self) -> Vec<SegmentRoster> {
        Segment::ALL.iter().copied().map(SegmentRoster::from).collect()
    }

    pub fn segment_roster(&self, segment: Segment) -> SegmentRoster {
        segment.into()
    }

    // ==========================================
    // 写接口
    // ==========================================

    pub fn create_contract(
        &self,
        principal: &Principal,
        input: NewContractRecord,
    ) -> ApiResult<ContractView> {
        require_privileged(principal, "create_contract")?;
        let input = self.prepare_new(input)?;
        let record = self.contract_repo.insert(&input)?;
        info!(user_id = principal.user_id, id = record.id, "新建合同");
        Ok(record.into())
    }

    /// 新建合同并上传 PDF 附件
    ///
    /// 附件先落盘；记录写入失败时尽力删除已写入的附件
    pub fn create_contract_with_document(
        &self,
        principal: &Principal,
        input: NewContractRecord,
        file_name: &str,
        bytes: &[u8],
    ) -> ApiResult<ContractView> {
        require_privileged(principal, "create_contract")?;
        ensure_pdf(file_name)?;
        let mut input = self.prepare_new(input)?;

        let path = self.save_document(&input.contract_number, file_name, bytes)?;
        input.document_path = Some(path.clone());

        match self.contract_repo.insert(&input) {
            Ok(record) => {
                info!(user_id = principal.user_id, id = record.id, path = %path, "新建合同（含附件）");
                Ok(record.into())
            }
            Err(e) => {
                self.discard_document(&path);
                Err(e.into())
            }
        }
    }

    /// 部分更新合同（附件不在此处修改）
    pub fn update_contract(
        &self,
        principal: &Principal,
        id: i64,
        patch: ContractPatch,
    ) -> ApiResult<ContractView> {
        require_privileged(principal, "update_contract")?;
        let mut record = self.load(id)?;

        if let Some(number) = patch.contract_number.as_deref() {
            let number = normalize_key_text(number);
            if number.is_empty() {
                return Err(missing_fields(&[COL_CONTRACT_NUMBER]));
            }
            if number != record.contract_number && self.contract_repo.key_exists(&number)? {
                return Err(duplicate_contract(&number));
            }
        }

        patch.apply_to(&mut record);
        record.contract_number = normalize_key_text(&record.contract_number);
        record.contract_value = non_negative_value(record.contract_value)?;

        let updated = self.contract_repo.update(&record)?;
        info!(user_id = principal.user_id, id, "更新合同");
        Ok(updated.into())
    }

    /// 替换合同附件：写入新附件 → 更新记录 → 尽力删除旧附件
    pub fn replace_document(
        &self,
        principal: &Principal,
        id: i64,
        file_name: &str,
        bytes: &[u8],
    ) -> ApiResult<ContractView> {
        require_privileged(principal, "replace_document")?;
        ensure_pdf(file_name)?;
        let record = self.load(id)?;

        let path = self.save_document(&record.contract_number, file_name, bytes)?;
        if let Err(e) = self.contract_repo.set_document_path(id, Some(&path)) {
            self.discard_document(&path);
            return Err(e.into());
        }
        if let Some(old) = record.document_path.as_deref() {
            if old != path {
                self.discard_document(old);
            }
        }

        info!(user_id = principal.user_id, id, path = %path, "合同附件已替换");
        Ok(self.load(id)?.into())
    }

    /// 删除合同（记录先删，附件尽力删除）
    pub fn delete_contract(&self, principal: &Principal, id: i64) -> ApiResult<()> {
        require_privileged(principal, "delete_contract")?;
        let record = self.load(id)?;
        self.remove(&record)?;
        info!(user_id = principal.user_id, id, "删除合同");
        Ok(())
    }

    /// 批量删除合同
    pub fn bulk_delete(&self, principal: &Principal, ids: &[i64]) -> ApiResult<BulkDeleteReport> {
        require_privileged(principal, "bulk_delete_contracts")?;
        if ids.is_empty() {
            return Err(ApiError::InvalidInput(t("contract.empty_id_list")));
        }

        let mut report = BulkDeleteReport::default();
        for &id in ids {
            let outcome = self
                .contract_repo
                .find_by_id(id)
                .map_err(ApiError::from)
                .and_then(|found| found.ok_or_else(|| RepositoryError::not_found("ContractRecord", id).into()))
                .and_then(|record| self.remove(&record));
            match outcome {
                Ok(()) => report.deleted_count += 1,
                Err(e) => {
                    warn!(id, error = %e, "批量删除: 跳过");
                    report.errors.push(e.user_message());
                }
            }
        }

        info!(
            user_id = principal.user_id,
            deleted = report.deleted_count,
            failed = report.errors.len(),
            "批量删除合同完成"
        );
        Ok(report)
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    fn load(&self, id: i64) -> ApiResult<ContractRecord> {
        self.contract_repo
            .find_by_id(id)?
            .ok_or_else(|| RepositoryError::not_found("ContractRecord", id).into())
    }

    fn remove(&self, record: &ContractRecord) -> ApiResult<()> {
        self.contract_repo.delete(record.id)?;
        if let Some(path) = record.document_path.as_deref() {
            self.discard_document(path);
        }
        Ok(())
    }

    fn prepare_new(&self, mut input: NewContractRecord) -> ApiResult<NewContractRecord> {
        input.contract_number = normalize_key_text(&input.contract_number);
        input.job_title = input.job_title.trim().to_string();
        input.customer_name = input.customer_name.trim().to_string();
        input.responsible_person = input
            .responsible_person
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        let missing: Vec<&str> = [
            (COL_CONTRACT_NUMBER, input.contract_number.is_empty()),
            (COL_JOB_TITLE, input.job_title.is_empty()),
            (COL_CONTRACT_CUSTOMER, input.customer_name.is_empty()),
        ]
        .into_iter()
        .filter(|(_, empty)| *empty)
        .map(|(column, _)| column)
        .collect();
        if !missing.is_empty() {
            return Err(missing_fields(&missing));
        }

        input.contract_value = non_negative_value(input.contract_value)?;
        if self.contract_repo.key_exists(&input.contract_number)? {
            return Err(duplicate_contract(&input.contract_number));
        }
        Ok(input)
    }

    fn save_document(&self, contract_number: &str, file_name: &str, bytes: &[u8]) -> ApiResult<String> {
        let name = contract_document_name(contract_number, file_name, Local::now().naive_local());
        Ok(self.blob_store.save(bytes, &name)?)
    }

    fn discard_document(&self, path: &str) {
        if let Err(e) = self.blob_store.delete(path) {
            warn!(path, error = %e, "合同附件删除失败（已忽略）");
        }
    }
}

fn ensure_pdf(file_name: &str) -> ApiResult<()> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if ext == DOCUMENT_EXTENSION {
        return Ok(());
    }
    Err(ApiError::InvalidInput(t_with_args(
        "import.unsupported_format",
        &[("ext", &ext), ("allowed", DOCUMENT_EXTENSION)],
    )))
}

fn missing_fields(fields: &[&str]) -> ApiError {
    ApiError::InvalidInput(t_with_args(
        "import.missing_required_field",
        &[("fields", &fields.join(", "))],
    ))
}

fn duplicate_contract(number: &str) -> ApiError {
    ApiError::Conflict(t_with_args("import.duplicate_contract", &[("key", number)]))
}

fn non_negative_value(value: rust_decimal::Decimal) -> ApiResult<rust_decimal::Decimal> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ApiError::InvalidInput(t_with_args(
            "import.invalid_amount",
            &[("field", COL_CONTRACT_VALUE), ("value", &value.to_string())],
        )));
    }
    Ok(to_currency_scale(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_pdf() {
        assert!(ensure_pdf("kontrak.PDF").is_ok());
        assert!(ensure_pdf("kontrak.pdf").is_ok());
        assert!(matches!(ensure_pdf("kontrak.docx"), Err(ApiError::InvalidInput(_))));
        assert!(matches!(ensure_pdf("kontrak"), Err(ApiError::InvalidInput(_))));
    }

    #[test]
    fn test_size_in_mb() {
        assert_eq!(size_in_mb(0), Decimal::ZERO);
        assert_eq!(size_in_mb(1024 * 1024), Decimal::ONE);
        assert_eq!(size_in_mb(1_572_864), Decimal::new(150, 2));
        assert_eq!(size_in_mb(10_000), Decimal::new(1, 2));
    }

    #[test]
    fn test_segment_roster_view() {
        let roster = SegmentRoster::from(Segment::Government);
        assert_eq!(roster.members, vec!["Taufik", "Tommy", "Noventi", "Mentari"]);
        assert_eq!(roster.label, "Government");
    }
}
