// ==========================================
// 客户账单监控系统 - 客户账单 API
// ==========================================
// 职责: 客户账单增删改查 / 回款汇总 / 客户经理汇总
// 权限: am 只能查看自己名下客户；写操作仅管理角色
// ==========================================

use chrono::{Local, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::api::access::require_privileged;
use crate::api::error::{ApiError, ApiResult};
use crate::domain::billing::{BillingPatch, BillingRecord, NewBillingRecord};
use crate::domain::types::PaymentStatus;
use crate::domain::user::{Principal, User};
use crate::engine::{ManagerRollup, PaymentAggregator, PaymentTotals, StatusCounts};
use crate::i18n::t_with_args;
use crate::importer::data_cleaner::{normalize_key_text, to_currency_scale};
use crate::importer::field_mapper::{
    COL_ACCOUNT_NUMBER, COL_BILLED_AMOUNT, COL_CATEGORY, COL_CUSTOMER_NAME, COL_PAID_AMOUNT,
    COL_PRODUCT,
};
use crate::repository::{
    BillingRepository, BillingStore, NaturalKeyLookup, RepositoryError, UserRepository,
};

// ==========================================
// 响应结构
// ==========================================

/// 客户列表视图（账单 + 派生回款状态 + 客户经理姓名）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerView {
    #[serde(flatten)]
    pub record: BillingRecord,
    pub payment_status: PaymentStatus,
    pub payment_status_label: String,
    pub manager_name: Option<String>,
}

/// 调用方范围内的回款汇总
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotalsView {
    #[serde(flatten)]
    pub totals: PaymentTotals,
    pub status_counts: StatusCounts,
    /// 实际生效的客户经理过滤条件（am 调用时为自身 id）
    pub am_filter: Option<i64>,
}

pub struct BillingApi {
    billing_repo: Arc<BillingRepository>,
    user_repo: Arc<UserRepository>,
    aggregator: PaymentAggregator,
}

impl BillingApi {
    pub fn new(billing_repo: Arc<BillingRepository>, user_repo: Arc<UserRepository>) -> Self {
        Self {
            billing_repo,
            user_repo,
            aggregator: PaymentAggregator::new(),
        }
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 客户列表（最新在前）
    ///
    /// # 参数
    /// - principal: 调用主体
    /// - am_filter: 管理角色可选的客户经理过滤；am 调用时忽略
    pub fn list_customers(
        &self,
        principal: &Principal,
        am_filter: Option<i64>,
    ) -> ApiResult<Vec<CustomerView>> {
        let scope = principal.owner_scope(am_filter);
        let records = self.billing_repo.list(scope)?;
        debug!(user_id = principal.user_id, ?scope, count = records.len(), "查询客户列表");

        let mut names: HashMap<i64, Option<String>> = HashMap::new();
        records
            .into_iter()
            .map(|record| self.to_view(record, &mut names))
            .collect()
    }

    /// 按客户账号查询（账号按导入规则归一化，"123.0" 与 "123" 等价）
    ///
    /// # 返回
    /// - Err(NotFound): 账号不存在，或不在 am 调用方名下
    pub fn get_customer_by_account(
        &self,
        principal: &Principal,
        account_number: &str,
    ) -> ApiResult<CustomerView> {
        let key = normalize_key_text(account_number);
        let scope = principal.owner_scope(None);
        let record = self
            .billing_repo
            .find_by_account(&key)?
            .filter(|record| scope.map_or(true, |owner| owner == record.owner_id))
            .ok_or_else(|| ApiError::from(RepositoryError::not_found("BillingRecord", &key)))?;
        self.to_view(record, &mut HashMap::new())
    }

    /// 调用方范围内的回款汇总
    pub fn payment_totals(
        &self,
        principal: &Principal,
        am_filter: Option<i64>,
    ) -> ApiResult<TotalsView> {
        let scope = principal.owner_scope(am_filter);
        let records = self.billing_repo.list(scope)?;
        Ok(TotalsView {
            totals: self.aggregator.totals(&records),
            status_counts: self.aggregator.status_counts(&records),
            am_filter: scope,
        })
    }

    /// 客户经理汇总（仅管理角色）
    pub fn manager_rollup(&self, principal: &Principal) -> ApiResult<Vec<ManagerRollup>> {
        require_privileged(principal, "manager_rollup")?;
        let managers = self.user_repo.list_active_managers()?;
        let records = self.billing_repo.list(None)?;
        Ok(self.aggregator.rollup(&managers, &records))
    }

    /// 调用方范围内最近一次数据更新时间（无数据时返回当前时间）
    pub fn last_update(&self, principal: &Principal) -> ApiResult<NaiveDateTime> {
        let scope = principal.owner_scope(None);
        Ok(self
            .billing_repo
            .last_updated_at(scope)?
            .unwrap_or_else(|| Local::now().naive_local()))
    }

    /// 在职客户经理名单（按姓名排序）
    pub fn list_account_managers(&self) -> ApiResult<Vec<User>> {
        Ok(self.user_repo.list_active_managers()?)
    }

    // ==========================================
    // 写接口
    // ==========================================

    /// 新建客户账单
    ///
    /// # 返回
    /// - Err(Conflict): 客户账号已存在
    /// - Err(InvalidInput): 必填为空 / 金额为负 / 客户经理不存在
    pub fn create_customer(
        &self,
        principal: &Principal,
        input: NewBillingRecord,
    ) -> ApiResult<BillingRecord> {
        require_privileged(principal, "create_customer")?;
        let input = normalize_customer_input(input)?;

        if self.billing_repo.key_exists(&input.account_number)? {
            return Err(ApiError::Conflict(t_with_args(
                "import.duplicate_account",
                &[("key", &input.account_number)],
            )));
        }
        if !self.billing_repo.manager_exists(input.owner_id)? {
            return Err(ApiError::InvalidInput(t_with_args(
                "import.unknown_manager",
                &[("owner", &input.owner_id.to_string())],
            )));
        }

        let record = self.billing_repo.insert(&input)?;
        info!(
            user_id = principal.user_id,
            id = record.id,
            account_number = %record.account_number,
            "新建客户账单"
        );
        Ok(record)
    }

    /// 更新发票状态 / 回款金额
    pub fn update_customer(
        &self,
        principal: &Principal,
        id: i64,
        patch: BillingPatch,
    ) -> ApiResult<BillingRecord> {
        require_privileged(principal, "update_customer")?;

        let patch = BillingPatch {
            invoice_status: patch.invoice_status,
            paid_amount: match patch.paid_amount {
                Some(amount) => Some(non_negative(COL_PAID_AMOUNT, amount)?),
                None => None,
            },
        };
        if patch.is_empty() {
            // 无修改项时原样返回
            return self
                .billing_repo
                .find_by_id(id)?
                .ok_or_else(|| RepositoryError::not_found("BillingRecord", id).into());
        }

        let record = self.billing_repo.update(id, &patch)?;
        info!(user_id = principal.user_id, id, "更新客户账单");
        Ok(record)
    }

    pub fn delete_customer(&self, principal: &Principal, id: i64) -> ApiResult<()> {
        require_privileged(principal, "delete_customer")?;
        self.billing_repo.delete(id)?;
        info!(user_id = principal.user_id, id, "删除客户账单");
        Ok(())
    }

    // 客户经理姓名按请求缓存
    fn to_view(
        &self,
        record: BillingRecord,
        names: &mut HashMap<i64, Option<String>>,
    ) -> ApiResult<CustomerView> {
        let manager_name = match names.get(&record.owner_id) {
            Some(name) => name.clone(),
            None => {
                let name = self.user_repo.find_by_id(record.owner_id)?.map(|u| u.name);
                names.insert(record.owner_id, name.clone());
                name
            }
        };
        let payment_status = record.payment_status();
        Ok(CustomerView {
            payment_status,
            payment_status_label: payment_status.label(),
            manager_name,
            record,
        })
    }
}

/// 手工录入的校验与归一化（规则同批量导入）
fn normalize_customer_input(mut input: NewBillingRecord) -> ApiResult<NewBillingRecord> {
    input.account_number = normalize_key_text(&input.account_number);
    input.customer_name = input.customer_name.trim().to_string();
    input.product = input.product.trim().to_string();
    input.category = input.category.trim().to_string();

    let missing: Vec<&str> = [
        (COL_ACCOUNT_NUMBER, &input.account_number),
        (COL_CUSTOMER_NAME, &input.customer_name),
        (COL_PRODUCT, &input.product),
        (COL_CATEGORY, &input.category),
    ]
    .iter()
    .filter(|(_, value)| value.is_empty())
    .map(|(column, _)| *column)
    .collect();
    if !missing.is_empty() {
        return Err(ApiError::InvalidInput(t_with_args(
            "import.missing_required_field",
            &[("fields", &missing.join(", "))],
        )));
    }

    input.billed_amount = non_negative(COL_BILLED_AMOUNT, input.billed_amount)?;
    input.paid_amount = non_negative(COL_PAID_AMOUNT, input.paid_amount)?;
    Ok(input)
}

fn non_negative(field: &str, amount: Decimal) -> ApiResult<Decimal> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(ApiError::InvalidInput(t_with_args(
            "import.invalid_amount",
            &[("field", field), ("value", &amount.to_string())],
        )));
    }
    Ok(to_currency_scale(amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::InvoiceStatus;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn input() -> NewBillingRecord {
        NewBillingRecord {
            account_number: " ACC-1 ".to_string(),
            customer_name: "Budi".to_string(),
            owner_id: 1,
            product: "Internet".to_string(),
            category: "C3mr".to_string(),
            period_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            billed_amount: dec!(1000.456),
            invoice_status: InvoiceStatus::NotSent,
            paid_amount: dec!(0),
        }
    }

    #[test]
    fn test_normalize_customer_input() {
        let normalized = normalize_customer_input(input()).unwrap();
        assert_eq!(normalized.account_number, "ACC-1");
        assert_eq!(normalized.billed_amount, dec!(1000.46));

        let mut numeric = input();
        numeric.account_number = " 123.0 ".to_string();
        assert_eq!(normalize_customer_input(numeric).unwrap().account_number, "123");
    }

    #[test]
    fn test_normalize_rejects_negative_and_blank() {
        let mut bad = input();
        bad.billed_amount = dec!(-1);
        assert!(matches!(normalize_customer_input(bad), Err(ApiError::InvalidInput(_))));

        let mut bad = input();
        bad.product = "  ".to_string();
        assert!(matches!(normalize_customer_input(bad), Err(ApiError::InvalidInput(_))));
    }
}
