// ==========================================
// 客户账单监控系统 - 客户账单实体
// ==========================================
// 职责: 客户账单记录 + 回款状态派生
// 红线: payment_status 为纯函数派生，不落库
// ==========================================

use crate::domain::types::{InvoiceStatus, PaymentStatus};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ==========================================
// BillingRecord - 客户账单记录（已落库）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingRecord {
    // ===== 主键 =====
    pub id: i64,
    pub account_number: String, // 客户账号（自然键，全局唯一）

    // ===== 基本信息 =====
    pub customer_name: String, // 客户名称
    pub owner_id: i64,         // 归属客户经理 (users.id)
    pub product: String,       // 产品
    pub category: String,      // 类别（开放集合，如 C3mr / CYC / CR）

    // ===== 账期 =====
    pub period_start: NaiveDate, // 写入时不校验 start <= end
    pub period_end: NaiveDate,

    // ===== 金额与状态 =====
    pub billed_amount: Decimal,        // 应收金额（2 位小数）
    pub invoice_status: InvoiceStatus, // 发票状态
    pub paid_amount: Decimal,          // 已回款金额

    // ===== 审计 =====
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl BillingRecord {
    /// 当前回款状态
    pub fn payment_status(&self) -> PaymentStatus {
        payment_status(self.paid_amount, self.billed_amount)
    }
}

/// 待写入的客户账单（导入/新建共用）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBillingRecord {
    pub account_number: String,
    pub customer_name: String,
    pub owner_id: i64,
    pub product: String,
    pub category: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub billed_amount: Decimal,
    pub invoice_status: InvoiceStatus,
    pub paid_amount: Decimal,
}

/// 账单更新（仅发票状态与回款金额可改）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillingPatch {
    pub invoice_status: Option<InvoiceStatus>,
    pub paid_amount: Option<Decimal>,
}

impl BillingPatch {
    pub fn is_empty(&self) -> bool {
        self.invoice_status.is_none() && self.paid_amount.is_none()
    }
}

/// 回款状态判定
///
/// # 规则
/// - paid == 0 → Unpaid（优先判定，即使 billed 也为 0）
/// - paid >= billed → Paid（超额回款同样视为结清）
/// - 其余 → Partial
pub fn payment_status(paid_amount: Decimal, billed_amount: Decimal) -> PaymentStatus {
    if paid_amount.is_zero() {
        PaymentStatus::Unpaid
    } else if paid_amount >= billed_amount {
        PaymentStatus::Paid
    } else {
        PaymentStatus::Partial
    }
}
