//! Artifact Storage Port - 出站端口
//!
//! 生成产物先写入暂存目录，成功后整体移动到输出目录，失败则丢弃，
//! 输出目录中不会出现不完整的文件。

use std::path::{Path, PathBuf};
use thiserror::Error;

/// 产物存储错误
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::IoError(err.to_string())
    }
}

/// Artifact Storage Port
///
/// 同步接口：只在阻塞线程中被 ModelHandle 调用
pub trait ArtifactStoragePort: Send + Sync {
    /// 确保目录存在
    fn ensure_directory(&self, path: &Path) -> Result<(), StorageError>;

    /// 为任务创建独立的暂存目录
    fn create_staging(&self, task_id: &str) -> Result<PathBuf, StorageError>;

    /// 把暂存目录中的文件移动到输出目录，返回最终路径
    fn commit(
        &self,
        staging_dir: &Path,
        files: &[PathBuf],
        subdir: Option<&str>,
    ) -> Result<Vec<PathBuf>, StorageError>;

    /// 丢弃暂存目录（尽力而为）
    fn discard(&self, staging_dir: &Path);
}
