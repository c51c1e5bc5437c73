// ==========================================
// 客户账单监控系统 - 导入管道 Trait
// ==========================================
// 职责: 定义导入管道各组件接口（不包含实现）
// 流程: 解析 → 校验 → 查重 → 归一化/映射 → 提交
// ==========================================

use crate::domain::import::{ParsedSheet, RawCell, RawRow};
use crate::importer::error::ImportResult;
use crate::importer::file_parser::FileFormat;
use chrono::NaiveDate;
use rust_decimal::Decimal;

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 文件解析接口
// 实现者: UniversalFileParser
pub trait FileParser: Send + Sync {
    /// 解析表格类文件（csv / xlsx / xls）
    ///
    /// # 参数
    /// - format: 已按扩展名识别的文件格式
    /// - bytes: 文件内容
    ///
    /// # 返回
    /// - Ok(ParsedSheet): 归一化列名 + 原始行（已跳过全空白行）
    /// - Err: ParseFailure / UnsupportedFormat
    fn parse_tabular(&self, format: FileFormat, bytes: &[u8]) -> ImportResult<ParsedSheet>;

    /// 抽取文档类文件（pdf）的纯文本，按页顺序拼接
    fn extract_text(&self, bytes: &[u8]) -> ImportResult<String>;
}

// ==========================================
// FieldNormalizer Trait
// ==========================================
// 用途: 单元格 → 领域类型（纯函数）
// 实现者: DataCleaner
pub trait FieldNormalizer: Send + Sync {
    /// 是否视为缺失值（空 / 空白 / NA 哨兵 / NaN / 错误单元格）
    fn is_missing(&self, cell: Option<&RawCell>) -> bool;

    /// 文本归一化（字符串化 + TRIM）
    fn clean_text(&self, cell: &RawCell) -> String;

    /// 自然键归一化（去掉浮点渲染的 ".0" 尾巴）
    fn natural_key(&self, cell: &RawCell) -> String;

    /// 日期解析（YYYY-MM-DD，或已结构化的日期/时间）
    fn parse_date(&self, cell: &RawCell, row: usize, field: &str) -> ImportResult<NaiveDate>;

    /// 金额解析（精确十进制，非负）
    fn parse_amount(&self, cell: &RawCell, row: usize, field: &str) -> ImportResult<Decimal>;
}

// ==========================================
// RowValidator Trait
// ==========================================
// 用途: 必填字段校验（不做跨字段一致性校验）
// 实现者: RequiredFieldValidator
pub trait RowValidator: Send + Sync {
    /// 返回缺失的必填字段（按 required 顺序）
    fn missing_fields(&self, row: &RawRow, required: &[&str]) -> Vec<String>;

    /// 校验必填字段
    ///
    /// # 返回
    /// - Ok(()): 全部存在
    /// - Err(MissingRequiredField): 列出所有缺失字段
    fn validate(&self, row: &RawRow, required: &[&str]) -> ImportResult<()>;
}
