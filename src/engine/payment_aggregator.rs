// ==========================================
// 客户账单监控系统 - 回款汇总引擎
// ==========================================
// 职责: 客户回款状态 / 调用方范围汇总 / 客户经理汇总
// 输入: 客户账单记录 + 客户经理名单
// 红线: 每次请求实时计算，不缓存、不增量维护；Engine 不拼 SQL
// ==========================================

use crate::domain::billing::BillingRecord;
use crate::domain::types::{PaymentStatus, Role};
use crate::domain::user::User;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 回款汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTotals {
    pub total_billed: Decimal,
    pub total_paid: Decimal,
    /// total_billed - total_paid（超额回款时为负）
    pub remaining: Decimal,
    /// 百分比，保留 2 位小数
    pub progress_percentage: Decimal,
    pub customer_count: usize,
    pub fully_paid_count: usize,
}

/// 单个客户经理的回款汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerRollup {
    pub manager_id: i64,
    pub manager_name: String,
    #[serde(flatten)]
    pub totals: PaymentTotals,
}

/// 各回款状态的客户数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub unpaid: usize,
    pub partial: usize,
    pub paid: usize,
}

/// 回款进度百分比：round(paid / billed * 100, 2)，billed 为 0 时返回 0
pub fn progress_percentage(total_paid: Decimal, total_billed: Decimal) -> Decimal {
    if total_billed <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (total_paid / total_billed * dec!(100))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

// ==========================================
// PaymentAggregator - 回款汇总引擎
// ==========================================
#[derive(Debug, Default, Clone, Copy)]
pub struct PaymentAggregator;

impl PaymentAggregator {
    pub fn new() -> Self {
        Self
    }

    /// 汇总一组账单
    pub fn totals<'a, I>(&self, records: I) -> PaymentTotals
    where
        I: IntoIterator<Item = &'a BillingRecord>,
    {
        let mut total_billed = Decimal::ZERO;
        let mut total_paid = Decimal::ZERO;
        let mut customer_count = 0;
        let mut fully_paid_count = 0;

        for record in records {
            total_billed += record.billed_amount;
            total_paid += record.paid_amount;
            customer_count += 1;
            if record.paid_amount >= record.billed_amount {
                fully_paid_count += 1;
            }
        }

        PaymentTotals {
            total_billed,
            total_paid,
            remaining: total_billed - total_paid,
            progress_percentage: progress_percentage(total_paid, total_billed),
            customer_count,
            fully_paid_count,
        }
    }

    /// 按客户经理汇总
    ///
    /// # 参数
    /// - managers: 候选客户经理（只统计启用状态的 am 角色）
    /// - records: 全部账单
    ///
    /// # 返回
    /// - 每个至少拥有一条账单的客户经理一条汇总，顺序同 managers
    pub fn rollup(&self, managers: &[User], records: &[BillingRecord]) -> Vec<ManagerRollup> {
        let mut by_owner: HashMap<i64, Vec<&BillingRecord>> = HashMap::new();
        for record in records {
            by_owner.entry(record.owner_id).or_default().push(record);
        }

        managers
            .iter()
            .filter(|m| m.active && m.role == Role::Am)
            .filter_map(|m| {
                let owned = by_owner.get(&m.id)?;
                Some(ManagerRollup {
                    manager_id: m.id,
                    manager_name: m.name.clone(),
                    totals: self.totals(owned.iter().copied()),
                })
            })
            .collect()
    }

    /// 各回款状态的客户数
    pub fn status_counts(&self, records: &[BillingRecord]) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for record in records {
            match record.payment_status() {
                PaymentStatus::Unpaid => counts.unpaid += 1,
                PaymentStatus::Partial => counts.partial += 1,
                PaymentStatus::Paid => counts.paid += 1,
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::InvoiceStatus;
    use chrono::NaiveDate;

    fn record(owner_id: i64, paid: Decimal, billed: Decimal) -> BillingRecord {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        BillingRecord {
            id: 0,
            account_number: format!("A-{}-{}", owner_id, paid),
            customer_name: "PT Maju".to_string(),
            owner_id,
            product: "Astinet".to_string(),
            category: "C3mr".to_string(),
            period_start: day,
            period_end: day,
            billed_amount: billed,
            invoice_status: InvoiceStatus::Sent,
            paid_amount: paid,
            created_at: day.and_hms_opt(0, 0, 0).unwrap(),
            updated_at: day.and_hms_opt(0, 0, 0).unwrap(),
        }
    }

    fn manager(id: i64, name: &str, role: Role, active: bool) -> User {
        User {
            id,
            username: name.to_lowercase(),
            name: name.to_string(),
            role,
            active,
        }
    }

    #[test]
    fn test_totals_mixed_progress() {
        let records = vec![record(1, dec!(50), dec!(100)), record(1, dec!(100), dec!(100))];
        let totals = PaymentAggregator::new().totals(&records);

        assert_eq!(totals.progress_percentage, dec!(75.00));
        assert_eq!(totals.remaining, dec!(50));
        assert_eq!(totals.fully_paid_count, 1);
        assert_eq!(totals.customer_count, 2);
    }

    #[test]
    fn test_progress_percentage_edges() {
        assert_eq!(progress_percentage(dec!(10), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(progress_percentage(dec!(1), dec!(3)), dec!(33.33));
        assert_eq!(progress_percentage(dec!(2), dec!(3)), dec!(66.67));
        assert_eq!(progress_percentage(dec!(150), dec!(100)), dec!(150));
    }

    #[test]
    fn test_rollup_skips_inactive_and_empty_managers() {
        let managers = vec![
            manager(1, "Andi", Role::Am, true),
            manager(2, "Budi", Role::Am, true),
            manager(3, "Citra", Role::Am, false),
            manager(4, "Admin", Role::Admin, true),
        ];
        let records = vec![
            record(1, dec!(0), dec!(100)),
            record(3, dec!(100), dec!(100)),
            record(4, dec!(100), dec!(100)),
        ];

        let rollup = PaymentAggregator::new().rollup(&managers, &records);
        assert_eq!(rollup.len(), 1);
        assert_eq!(rollup[0].manager_name, "Andi");
        assert_eq!(rollup[0].totals.progress_percentage, Decimal::ZERO);
        assert_eq!(rollup[0].totals.remaining, dec!(100));
    }

    #[test]
    fn test_status_counts() {
        let records = vec![
            record(1, dec!(0), dec!(100)),
            record(1, dec!(30), dec!(100)),
            record(1, dec!(150), dec!(100)),
            record(1, dec!(100), dec!(100)),
        ];
        let counts = PaymentAggregator::new().status_counts(&records);
        assert_eq!(
            counts,
            StatusCounts {
                unpaid: 1,
                partial: 1,
                paid: 2
            }
        );
    }
}
