// ==========================================
// 客户账单监控系统 - 领域类型定义
// ==========================================
// 职责: 角色 / 发票状态 / 回款状态 / 交易类型 / 业务板块
// 约定: 落库使用 SCREAMING_SNAKE_CASE，展示标签走 i18n
// ==========================================

use crate::i18n::t;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 标签归一化：小写 + 去掉空白/下划线/连字符
///
/// 用于宽松匹配表格里的枚举文本（"Own Channel" / "own_channel" / "OWN-CHANNEL"）
fn squash_label(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// 枚举解析失败
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "未知的{}取值: {}", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

// ==========================================
// 用户角色 (Role)
// ==========================================
// am 为最低权限，只能看到自己名下的客户
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Superadmin,
    Admin,
    Am,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Superadmin => "superadmin",
            Role::Admin => "admin",
            Role::Am => "am",
        }
    }

    /// 是否为管理角色（superadmin / admin）
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Superadmin | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match squash_label(s).as_str() {
            "superadmin" => Ok(Role::Superadmin),
            "admin" => Ok(Role::Admin),
            "am" => Ok(Role::Am),
            _ => Err(UnknownVariant {
                kind: "角色",
                value: s.to_string(),
            }),
        }
    }
}

// ==========================================
// 发票状态 (Invoice Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Sent,
    #[default]
    NotSent,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Sent => "SENT",
            InvoiceStatus::NotSent => "NOT_SENT",
        }
    }

    /// 本地化展示标签
    pub fn label(&self) -> String {
        match self {
            InvoiceStatus::Sent => t("invoice_status.sent"),
            InvoiceStatus::NotSent => t("invoice_status.not_sent"),
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = UnknownVariant;

    /// 兼容印尼语标签（Terkirim / Belum Terkirim）与英文标签
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match squash_label(s).as_str() {
            "sent" | "terkirim" => Ok(InvoiceStatus::Sent),
            "notsent" | "belumterkirim" | "" => Ok(InvoiceStatus::NotSent),
            _ => Err(UnknownVariant {
                kind: "发票状态",
                value: s.to_string(),
            }),
        }
    }
}

// ==========================================
// 回款状态 (Payment Status)
// ==========================================
// 派生值，从不落库
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Unpaid,  // 未回款
    Partial, // 部分回款
    Paid,    // 已结清
}

impl PaymentStatus {
    pub fn label(&self) -> String {
        match self {
            PaymentStatus::Unpaid => t("payment_status.unpaid"),
            PaymentStatus::Partial => t("payment_status.partial"),
            PaymentStatus::Paid => t("payment_status.paid"),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Unpaid => write!(f, "UNPAID"),
            PaymentStatus::Partial => write!(f, "PARTIAL"),
            PaymentStatus::Paid => write!(f, "PAID"),
        }
    }
}

// ==========================================
// 交易类型 (Transaction Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    OwnChannel,
    Gtma,
    Ngtma,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::OwnChannel => "OWN_CHANNEL",
            TransactionType::Gtma => "GTMA",
            TransactionType::Ngtma => "NGTMA",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::OwnChannel => write!(f, "Own Channel"),
            TransactionType::Gtma => write!(f, "GTMA"),
            TransactionType::Ngtma => write!(f, "NGTMA"),
        }
    }
}

impl FromStr for TransactionType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match squash_label(s).as_str() {
            "ownchannel" => Ok(TransactionType::OwnChannel),
            "gtma" => Ok(TransactionType::Gtma),
            "ngtma" => Ok(TransactionType::Ngtma),
            _ => Err(UnknownVariant {
                kind: "交易类型",
                value: s.to_string(),
            }),
        }
    }
}

// ==========================================
// 业务板块 (Segment)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Segment {
    Business,
    Government,
    Enterprise,
}

impl Segment {
    pub const ALL: [Segment; 3] = [Segment::Business, Segment::Government, Segment::Enterprise];

    pub fn as_str(&self) -> &'static str {
        match self {
            Segment::Business => "BUSINESS",
            Segment::Government => "GOVERNMENT",
            Segment::Enterprise => "ENTERPRISE",
        }
    }

    /// 板块负责人名册（约定俗成，不做强校验）
    pub fn roster(&self) -> &'static [&'static str] {
        match self {
            Segment::Business => &["Aldi", "Bayu", "Dian", "Fitrah", "Vivi"],
            Segment::Government => &["Taufik", "Tommy", "Noventi", "Mentari"],
            Segment::Enterprise => &["Cintia", "Yuda"],
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Business => write!(f, "Business"),
            Segment::Government => write!(f, "Government"),
            Segment::Enterprise => write!(f, "Enterprise"),
        }
    }
}

impl FromStr for Segment {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match squash_label(s).as_str() {
            "business" => Ok(Segment::Business),
            "government" => Ok(Segment::Government),
            "enterprise" => Ok(Segment::Enterprise),
            _ => Err(UnknownVariant {
                kind: "业务板块",
                value: s.to_string(),
            }),
        }
    }
}
