// ==========================================
// 客户账单监控系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入 / 上传所需的配置读取接口（不包含实现）
// 红线: 读取失败一律回退默认值，不向调用方抛错
// ==========================================

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
pub trait ImportConfigReader: Send + Sync {
    /// 上传文件大小上限（字节）
    ///
    /// # 默认值
    /// - 16 MiB
    fn max_file_size_bytes(&self) -> usize;

    /// 合同附件存储根目录
    ///
    /// # 默认值
    /// - uploads/kontrak
    fn document_root(&self) -> String;

    /// 自由文本（PDF）识别时的默认客户分类
    ///
    /// # 默认值
    /// - C3mr
    fn default_category(&self) -> String;

    /// CSV 分隔符嗅探的样本字节数
    ///
    /// # 默认值
    /// - 1024
    fn csv_sniff_bytes(&self) -> usize;
}
