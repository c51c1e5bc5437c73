// ==========================================
// 客户账单监控系统 - 上传导入 API
// ==========================================
// 职责: 客户账单导入（全有或全无）/ 合同导入（部分成功）/ 通用上传预览
// 权限: 仅 superadmin / admin
// ==========================================

use std::sync::Arc;
use tracing::info;

use crate::api::access::require_privileged;
use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::import::{AllOrNothingReport, PartialImportReport, UploadPreview};
use crate::domain::types::InvoiceStatus;
use crate::domain::user::Principal;
use crate::i18n::t;
use crate::importer::field_mapper::{
    COL_ACCOUNT_NUMBER, COL_BILLED_AMOUNT, COL_CATEGORY, COL_CUSTOMER_NAME, COL_INVOICE_STATUS,
    COL_OWNER_ID, COL_PAID_AMOUNT, COL_PERIOD_END, COL_PERIOD_START, COL_PRODUCT,
};
use crate::importer::{BillingImporter, ContractImporter, UploadPreviewer};
use crate::repository::{BillingRepository, ContractRepository};

/// 客户账单模板列（顺序即模板列顺序）
pub const BILLING_TEMPLATE_COLUMNS: [&str; 10] = [
    COL_ACCOUNT_NUMBER,
    COL_CUSTOMER_NAME,
    COL_OWNER_ID,
    COL_PRODUCT,
    COL_CATEGORY,
    COL_PERIOD_START,
    COL_PERIOD_END,
    COL_BILLED_AMOUNT,
    COL_INVOICE_STATUS,
    COL_PAID_AMOUNT,
];

pub struct ImportApi {
    billing_repo: Arc<BillingRepository>,
    contract_repo: Arc<ContractRepository>,
    config: Arc<ConfigManager>,
}

impl ImportApi {
    pub fn new(
        billing_repo: Arc<BillingRepository>,
        contract_repo: Arc<ContractRepository>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            billing_repo,
            contract_repo,
            config,
        }
    }

    /// 客户账单批量导入（任一行出错则整批不入库）
    ///
    /// # 返回
    /// - Ok(AllOrNothingReport): errors 非空时 imported_count 为 0
    /// - Err(ApiError::Import): 格式 / 大小 / 解析 / 缺列
    pub fn import_billing(
        &self,
        principal: &Principal,
        file_name: &str,
        bytes: &[u8],
    ) -> ApiResult<AllOrNothingReport> {
        require_privileged(principal, "import_billing")?;
        info!(user_id = principal.user_id, file_name, size = bytes.len(), "收到客户账单导入请求");

        let importer = BillingImporter::new(self.billing_repo.clone(), self.config.clone());
        Ok(importer.import_file(file_name, bytes)?)
    }

    /// 合同批量导入（成功行提交，失败行逐行报告）
    pub fn import_contracts(
        &self,
        principal: &Principal,
        file_name: &str,
        bytes: &[u8],
    ) -> ApiResult<PartialImportReport> {
        require_privileged(principal, "import_contracts")?;
        info!(user_id = principal.user_id, file_name, size = bytes.len(), "收到合同导入请求");

        let importer = ContractImporter::new(self.contract_repo.clone(), self.config.clone());
        Ok(importer.import_file(file_name, bytes)?)
    }

    /// 通用上传预览（csv / xlsx / xls / pdf，不落库）
    pub fn preview_upload(
        &self,
        principal: &Principal,
        file_name: &str,
        bytes: &[u8],
    ) -> ApiResult<UploadPreview> {
        require_privileged(principal, "preview_upload")?;

        let preview = UploadPreviewer::new(self.config.as_ref()).preview(file_name, bytes)?;
        if preview.rows.is_empty() {
            return Err(ApiError::InvalidInput(t("import.empty_file")));
        }
        Ok(preview)
    }

    /// 客户账单导入模板（CSV，含一行示例）
    pub fn billing_template_csv(&self) -> ApiResult<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        let not_sent = InvoiceStatus::NotSent.label();
        let example = [
            "EXAMPLE001",
            "PT Example Company",
            "1",
            "Product Example",
            "C3mr",
            "2024-01-01",
            "2024-12-31",
            "1000000",
            not_sent.as_str(),
            "0",
        ];

        writer
            .write_record(BILLING_TEMPLATE_COLUMNS)
            .and_then(|_| writer.write_record(example))
            .map_err(|e| ApiError::InternalError(e.to_string()))?;

        let bytes = writer
            .into_inner()
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| ApiError::InternalError(e.to_string()))
    }
}
