// ==========================================
// 客户账单监控系统 - 合同实体
// ==========================================
// 职责: 合同记录 + 合同周期派生
// 红线: contract_period 为纯函数派生，不落库
// ==========================================

use crate::domain::types::{Segment, TransactionType};
use crate::i18n::{t, t_with_args};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// 平均每月天数（天数 → 月数换算）
pub const AVG_DAYS_PER_MONTH: Decimal = dec!(30.44);

// ==========================================
// ContractRecord - 合同记录（已落库）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractRecord {
    // ===== 主键 =====
    pub id: i64,
    pub contract_number: String, // 合同号（自然键，全局唯一）

    // ===== 合同信息 =====
    pub contract_date: NaiveDate,
    pub contract_value: Decimal,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub job_title: String,     // 项目名称
    pub customer_name: String, // 客户名称
    pub transaction_type: TransactionType,
    pub segment: Segment,
    pub responsible_person: Option<String>, // 负责人（通常取自板块名册）

    // ===== 附件 =====
    pub document_path: Option<String>, // PDF 附件（blob 路径，访问时才校验存在性）

    // ===== 审计 =====
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl ContractRecord {
    pub fn contract_period(&self) -> ContractPeriod {
        contract_period(Some(self.period_start), Some(self.period_end))
    }
}

/// 待写入的合同
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewContractRecord {
    pub contract_number: String,
    pub contract_date: NaiveDate,
    pub contract_value: Decimal,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub job_title: String,
    pub customer_name: String,
    pub transaction_type: TransactionType,
    pub segment: Segment,
    pub responsible_person: Option<String>,
    pub document_path: Option<String>,
}

/// 合同部分更新（None 表示不修改）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractPatch {
    pub contract_number: Option<String>,
    pub contract_date: Option<NaiveDate>,
    pub contract_value: Option<Decimal>,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub job_title: Option<String>,
    pub customer_name: Option<String>,
    pub transaction_type: Option<TransactionType>,
    pub segment: Option<Segment>,
    pub responsible_person: Option<String>,
}

impl ContractPatch {
    /// 将更新应用到已有记录
    pub fn apply_to(self, record: &mut ContractRecord) {
        if let Some(v) = self.contract_number {
            record.contract_number = v;
        }
        if let Some(v) = self.contract_date {
            record.contract_date = v;
        }
        if let Some(v) = self.contract_value {
            record.contract_value = v;
        }
        if let Some(v) = self.period_start {
            record.period_start = v;
        }
        if let Some(v) = self.period_end {
            record.period_end = v;
        }
        if let Some(v) = self.job_title {
            record.job_title = v;
        }
        if let Some(v) = self.customer_name {
            record.customer_name = v;
        }
        if let Some(v) = self.transaction_type {
            record.transaction_type = v;
        }
        if let Some(v) = self.segment {
            record.segment = v;
        }
        if let Some(v) = self.responsible_person {
            let trimmed = v.trim().to_string();
            record.responsible_person = if trimmed.is_empty() { None } else { Some(trimmed) };
        }
    }
}

// ==========================================
// ContractPeriod - 合同周期
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContractPeriod {
    /// 起止日期缺失
    Unknown,
    /// 起始日期晚于结束日期（仅展示层标记，写入时不拦截）
    Invalid,
    /// 不足一个月
    Days { days: i64 },
    /// 1-11 个月
    Months { months: i64 },
    /// 满一年（months 为余数月份）
    Years { years: i64, months: i64 },
}

impl ContractPeriod {
    /// 本地化展示标签（例如 "9 hari" / "2 tahun 2 bulan"）
    pub fn label(&self) -> String {
        match *self {
            ContractPeriod::Unknown => t("contract_period.unknown"),
            ContractPeriod::Invalid => t("contract_period.invalid"),
            ContractPeriod::Days { days } => {
                t_with_args("contract_period.days", &[("days", &days.to_string())])
            }
            ContractPeriod::Months { months } => {
                t_with_args("contract_period.months", &[("months", &months.to_string())])
            }
            ContractPeriod::Years { years, months: 0 } => {
                t_with_args("contract_period.years", &[("years", &years.to_string())])
            }
            ContractPeriod::Years { years, months } => t_with_args(
                "contract_period.years_months",
                &[("years", &years.to_string()), ("months", &months.to_string())],
            ),
        }
    }
}

/// 计算合同周期
///
/// # 规则
/// 1. 任一日期缺失 → Unknown
/// 2. start > end → Invalid
/// 3. 月数 = round(天数 / 30.44)，银行家舍入
/// 4. 月数 < 1 → 按天；< 12 → 按月；否则拆成年 + 余月
pub fn contract_period(start: Option<NaiveDate>, end: Option<NaiveDate>) -> ContractPeriod {
    let (start, end) = match (start, end) {
        (Some(s), Some(e)) => (s, e),
        _ => return ContractPeriod::Unknown,
    };

    if start > end {
        return ContractPeriod::Invalid;
    }

    let days = (end - start).num_days();
    let months = (Decimal::from(days) / AVG_DAYS_PER_MONTH)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
        .to_i64()
        .unwrap_or(0);

    if months < 1 {
        ContractPeriod::Days { days }
    } else if months < 12 {
        ContractPeriod::Months { months }
    } else {
        ContractPeriod::Years {
            years: months / 12,
            months: months % 12,
        }
    }
}
