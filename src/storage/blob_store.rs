// ==========================================
// 客户账单监控系统 - 附件存储
// ==========================================
// 职责: 合同 PDF 附件的保存 / 读取 / 删除 / 存在性检查
// 约束: 附件写入与记录提交不在同一事务内（可能残留孤立文件）
// ==========================================

use chrono::{Local, NaiveDateTime};
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// 附件存储错误
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("附件读写失败: {0}")]
    Io(String),

    #[error("附件不存在: {0}")]
    NotFound(String),

    #[error("非法附件路径: {0}")]
    InvalidPath(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// 附件文件信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobMetadata {
    pub size_bytes: u64,
}

// ==========================================
// BlobStore Trait
// ==========================================
// 实现者: FsBlobStore
pub trait BlobStore: Send + Sync {
    /// 保存附件
    ///
    /// # 返回
    /// - Ok(String): 附件路径（相对于存储根目录，写入 document_path）
    fn save(&self, bytes: &[u8], suggested_name: &str) -> StorageResult<String>;

    fn read(&self, path: &str) -> StorageResult<Vec<u8>>;

    /// 删除附件（调用方按尽力而为处理失败）
    fn delete(&self, path: &str) -> StorageResult<()>;

    fn exists(&self, path: &str) -> bool;

    /// 附件文件信息
    ///
    /// # 返回
    /// - Err(NotFound): 附件文件已不存在
    fn metadata(&self, path: &str) -> StorageResult<BlobMetadata>;
}

/// 文件名清洗：仅保留 ASCII 字母数字与 `._-`，空白折叠为下划线
///
/// 例: "../Kontrak Final (rev).pdf" → "Kontrak_Final_rev.pdf"
pub fn sanitize_file_name(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') || c.is_whitespace())
        .collect();

    replaced
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// 合同附件名：`{YYYYmmdd_HHMMSS}_{合同号}_{清洗后的文件名}`
pub fn contract_document_name(contract_number: &str, file_name: &str, now: NaiveDateTime) -> String {
    sanitize_file_name(&format!(
        "{}_{}_{}",
        now.format("%Y%m%d_%H%M%S"),
        contract_number,
        sanitize_file_name(file_name)
    ))
}

// ==========================================
// FsBlobStore - 本地文件系统实现
// ==========================================
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// 创建存储（根目录不存在时自动创建）
    pub fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            StorageError::Io(format!("无法创建附件目录 '{}': {}", root.display(), e))
        })?;
        info!(path = %root.display(), "附件存储已初始化");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 解析附件路径，拒绝越出根目录
    fn resolve(&self, path: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(path);
        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(c) => resolved.push(c),
                Component::CurDir => {}
                _ => return Err(StorageError::InvalidPath(path.to_string())),
            }
        }
        if resolved == self.root {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(resolved)
    }
}

impl BlobStore for FsBlobStore {
    fn save(&self, bytes: &[u8], suggested_name: &str) -> StorageResult<String> {
        let mut name = sanitize_file_name(suggested_name);
        if name.is_empty() {
            name = format!("{}", Local::now().format("%Y%m%d_%H%M%S_%f"));
        }
        let target = self.resolve(&name)?;
        fs::write(&target, bytes)
            .map_err(|e| StorageError::Io(format!("写入 '{}' 失败: {}", name, e)))?;
        debug!(name = %name, size = bytes.len(), "附件已保存");
        Ok(name)
    }

    fn read(&self, path: &str) -> StorageResult<Vec<u8>> {
        let target = self.resolve(path)?;
        if !target.is_file() {
            return Err(StorageError::NotFound(path.to_string()));
        }
        fs::read(&target).map_err(|e| StorageError::Io(format!("读取 '{}' 失败: {}", path, e)))
    }

    fn delete(&self, path: &str) -> StorageResult<()> {
        let target = self.resolve(path)?;
        if !target.is_file() {
            return Err(StorageError::NotFound(path.to_string()));
        }
        fs::remove_file(&target)
            .map_err(|e| StorageError::Io(format!("删除 '{}' 失败: {}", path, e)))?;
        debug!(path, "附件已删除");
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.is_file()).unwrap_or(false)
    }

    fn metadata(&self, path: &str) -> StorageResult<BlobMetadata> {
        let target = self.resolve(path)?;
        match fs::metadata(&target) {
            Ok(meta) if meta.is_file() => Ok(BlobMetadata {
                size_bytes: meta.len(),
            }),
            Ok(_) => Err(StorageError::NotFound(path.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(StorageError::Io(format!("读取 '{}' 信息失败: {}", path, e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("../Kontrak Final (rev).pdf"), "Kontrak_Final_rev.pdf");
        assert_eq!(sanitize_file_name("a/b\\c.pdf"), "a_b_c.pdf");
        assert_eq!(sanitize_file_name("..."), "");
    }

    #[test]
    fn test_contract_document_name() {
        let now = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 5, 7)
            .unwrap();
        assert_eq!(
            contract_document_name("K/2024/001", "scan kontrak.pdf", now),
            "20240301_090507_K_2024_001_scan_kontrak.pdf"
        );
    }

    #[test]
    fn test_save_read_delete() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path().join("kontrak")).unwrap();

        let path = store.save(b"%PDF-1.4", "a.pdf").unwrap();
        assert_eq!(path, "a.pdf");
        assert!(store.exists(&path));
        assert_eq!(store.read(&path).unwrap(), b"%PDF-1.4".to_vec());

        assert_eq!(store.metadata(&path).unwrap().size_bytes, 8);

        store.delete(&path).unwrap();
        assert!(!store.exists(&path));
        assert!(matches!(store.metadata(&path), Err(StorageError::NotFound(_))));
        assert!(matches!(store.delete(&path), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path()).unwrap();
        assert!(matches!(store.read("../etc/passwd"), Err(StorageError::InvalidPath(_))));
        assert!(!store.exists("/etc/passwd"));
    }
}
