// ==========================================
// 客户账单监控系统 - 记录存储接口
// ==========================================
// 职责: 导入管道所依赖的存储能力（查重 / 外键查询 / 批次事务写入）
// 实现者: BillingRepository, ContractRepository
// ==========================================

use crate::domain::billing::NewBillingRecord;
use crate::domain::contract::NewContractRecord;
use crate::repository::error::RepositoryResult;
use rust_decimal::Decimal;
use std::str::FromStr;

// ==========================================
// NaturalKeyLookup Trait
// ==========================================
// 用途: 按自然键查询是否已存在（查重）
pub trait NaturalKeyLookup: Send + Sync {
    fn key_exists(&self, key: &str) -> RepositoryResult<bool>;
}

// ==========================================
// BatchWriter Trait
// ==========================================
// 用途: 导入器在存储开启的批次事务内逐行暂存
pub trait BatchWriter<R> {
    /// 暂存一行（事务提交前对其他读者不可见）
    fn stage(&mut self, record: &R) -> RepositoryResult<()>;
}

/// 批次暂存回调：返回 Err 即整批回滚
pub type StageFn<'a, R> = dyn FnMut(&mut dyn BatchWriter<R>) -> RepositoryResult<()> + 'a;

// ==========================================
// BillingStore Trait
// ==========================================
pub trait BillingStore: NaturalKeyLookup {
    /// 客户经理（用户）是否存在
    fn manager_exists(&self, owner_id: i64) -> RepositoryResult<bool>;

    /// 开启批次事务，由 stage 回调逐行暂存
    ///
    /// # 返回
    /// - Ok(usize): 提交的行数
    /// - Err: 回调或提交失败（含唯一约束兜底），事务已回滚
    fn write_batch(&self, stage: &mut StageFn<'_, NewBillingRecord>) -> RepositoryResult<usize>;
}

// ==========================================
// ContractStore Trait
// ==========================================
pub trait ContractStore: NaturalKeyLookup {
    /// 语义同 BillingStore::write_batch
    fn write_batch(&self, stage: &mut StageFn<'_, NewContractRecord>) -> RepositoryResult<usize>;
}

// ==========================================
// 列读取辅助
// ==========================================

/// 读取 TEXT 存储的十进制金额
pub(crate) fn decimal_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(raw.trim()).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// 读取 TEXT 存储的枚举
pub(crate) fn enum_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
