// ==========================================
// 客户账单监控系统 - 批次处理公共逻辑
// ==========================================
// 职责: 逐行驱动 + 错误分类 + 上传前置检查
// 约束: 严格按源文件顺序处理，不重排
// ==========================================

use crate::domain::import::RawRow;
use crate::i18n::t_with_args;
use crate::importer::error::{ImportError, ImportResult};
use tracing::warn;

/// 逐行处理结果
#[derive(Debug)]
pub struct RowOutcomes<T> {
    /// 处理成功、等待提交的记录（保持源顺序）
    pub staged: Vec<T>,
    /// 行级错误（保持源顺序）
    pub rejected: Vec<ImportError>,
}

/// 逐行驱动
///
/// # 参数
/// - rows: 源文件中的数据行
/// - process: 单行处理（校验 → 映射 → 查重）
///
/// # 返回
/// - Ok(RowOutcomes): 行级错误被收集，不中断
/// - Err: 非行级错误（例如查重时存储不可用），整批终止
pub fn drive_rows<T, F>(rows: &[RawRow], mut process: F) -> ImportResult<RowOutcomes<T>>
where
    F: FnMut(&RawRow) -> ImportResult<T>,
{
    let mut staged = Vec::with_capacity(rows.len());
    let mut rejected = Vec::new();

    for row in rows {
        match process(row) {
            Ok(record) => staged.push(record),
            Err(e) if e.is_row_level() => {
                warn!(row = row.row_number, error = %e, "行被拒绝");
                rejected.push(e);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(RowOutcomes { staged, rejected })
}

/// 本地化的行级错误消息（"Baris N: ..."）
pub fn row_message(err: &ImportError) -> String {
    match err.row() {
        Some(row) => t_with_args(
            "import.row_message",
            &[("row", &row.to_string()), ("message", &err.user_message())],
        ),
        None => err.user_message(),
    }
}

/// 上传大小检查（解析前）
pub fn ensure_size(size: usize, limit: usize) -> ImportResult<()> {
    if size > limit {
        return Err(ImportError::FileTooLarge { size, limit });
    }
    Ok(())
}
