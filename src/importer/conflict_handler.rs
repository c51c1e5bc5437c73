// ==========================================
// 客户账单监控系统 - 重复检测器
// ==========================================
// 职责: 按自然键检测与已落库记录的重复（跨批次）
// 说明: 同批次内重复不在此检测，提交时由唯一约束兜底
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::repository::record_store::NaturalKeyLookup;
use tracing::debug;

pub struct DuplicateChecker<'s, L: NaturalKeyLookup + ?Sized> {
    lookup: &'s L,
    entity: &'static str,
}

impl<'s, L: NaturalKeyLookup + ?Sized> DuplicateChecker<'s, L> {
    /// # 参数
    /// - lookup: 自然键查询能力（通常为 Repository）
    /// - entity: 实体名（"billing" / "contract"），用于错误消息
    pub fn new(lookup: &'s L, entity: &'static str) -> Self {
        Self { lookup, entity }
    }

    /// 检查自然键是否已存在
    ///
    /// # 返回
    /// - Ok(()): 不存在，可导入
    /// - Err(DuplicateKey): 已存在（绝不覆盖）
    /// - Err(StoreError): 查询失败
    pub fn check(&self, key: &str, row: usize) -> ImportResult<()> {
        if self.lookup.key_exists(key)? {
            debug!(row, key, entity = self.entity, "自然键已存在");
            return Err(ImportError::DuplicateKey {
                row,
                entity: self.entity,
                key: key.to_string(),
            });
        }
        Ok(())
    }
}
