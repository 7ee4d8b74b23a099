//! File Storage - 文件系统产物存储实现
//!
//! 实现 ArtifactStoragePort trait

use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::application::ports::{ArtifactStoragePort, StorageError};

/// 文件系统产物存储
pub struct FileArtifactStorage {
    /// 产物输出根目录
    output_dir: PathBuf,
    /// 暂存根目录
    staging_dir: PathBuf,
}

impl FileArtifactStorage {
    /// 创建新的文件存储
    pub fn new(
        output_dir: impl AsRef<Path>,
        staging_dir: impl AsRef<Path>,
    ) -> Result<Self, StorageError> {
        let output_dir = output_dir.as_ref().to_path_buf();
        let staging_dir = staging_dir.as_ref().to_path_buf();

        let storage = Self {
            output_dir,
            staging_dir,
        };
        storage.ensure_directory(&storage.output_dir)?;
        storage.ensure_directory(&storage.staging_dir)?;

        Ok(storage)
    }

    /// 获取输出根目录
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn target_dir(&self, subdir: Option<&str>) -> PathBuf {
        match subdir {
            Some(subdir) => self.output_dir.join(subdir),
            None => self.output_dir.clone(),
        }
    }

    /// 目标已存在时加短后缀，不覆盖其他任务的产物
    fn unique_destination(target_dir: &Path, file_name: &std::ffi::OsStr) -> PathBuf {
        let candidate = target_dir.join(file_name);
        if !candidate.exists() {
            return candidate;
        }

        let name = Path::new(file_name);
        let stem = name
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let suffix = Uuid::new_v4().simple().to_string();
        let renamed = match name.extension() {
            Some(ext) => format!("{}_{}.{}", stem, &suffix[..8], ext.to_string_lossy()),
            None => format!("{}_{}", stem, &suffix[..8]),
        };
        target_dir.join(renamed)
    }

    fn move_file(from: &Path, to: &Path) -> Result<(), StorageError> {
        if fs::rename(from, to).is_ok() {
            return Ok(());
        }

        // 跨文件系统时 rename 失败，退化为复制
        Self::copy_then_rename(from, to)?;
        if let Err(e) = fs::remove_file(from) {
            // 暂存目录随后整体删除
            tracing::warn!(source = %from.display(), error = %e, "Failed to remove staged file");
        }
        Ok(())
    }

    /// 先复制到目标目录下的临时文件再 rename，`to` 要么完整要么不存在
    fn copy_then_rename(from: &Path, to: &Path) -> Result<(), StorageError> {
        let target_dir = to
            .parent()
            .ok_or_else(|| StorageError::InvalidPath(to.display().to_string()))?;
        let name = to
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let partial = target_dir.join(format!(".{}.{}.partial", name, Uuid::new_v4().simple()));

        let result = fs::copy(from, &partial).and_then(|_| fs::rename(&partial, to));
        if let Err(e) = result {
            let _ = fs::remove_file(&partial);
            let _ = fs::remove_file(to);
            return Err(e.into());
        }
        Ok(())
    }
}

impl ArtifactStoragePort for FileArtifactStorage {
    fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        fs::create_dir_all(path)?;
        Ok(())
    }

    fn create_staging(&self, task_id: &str) -> Result<PathBuf, StorageError> {
        let safe_id: String = task_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let dir = self
            .staging_dir
            .join(format!("{}-{}", safe_id, Uuid::new_v4().simple()));
        self.ensure_directory(&dir)?;

        tracing::debug!(task_id = %task_id, staging = %dir.display(), "Staging directory created");
        Ok(dir)
    }

    fn commit(
        &self,
        staging_dir: &Path,
        files: &[PathBuf],
        subdir: Option<&str>,
    ) -> Result<Vec<PathBuf>, StorageError> {
        for file in files {
            if !file.starts_with(staging_dir) {
                return Err(StorageError::InvalidPath(file.display().to_string()));
            }
            if !file.is_file() {
                return Err(StorageError::FileNotFound(file.display().to_string()));
            }
        }

        let target_dir = self.target_dir(subdir);
        self.ensure_directory(&target_dir)?;

        let mut committed = Vec::with_capacity(files.len());
        for file in files {
            let file_name = file
                .file_name()
                .ok_or_else(|| StorageError::InvalidPath(file.display().to_string()))?;
            let destination = Self::unique_destination(&target_dir, file_name);

            if let Err(e) = Self::move_file(file, &destination) {
                // 回滚已移动的文件，输出目录里不留半套产物
                for moved in &committed {
                    let _ = fs::remove_file(moved);
                }
                return Err(e);
            }
            committed.push(destination);
        }

        self.discard(staging_dir);

        tracing::debug!(
            files = committed.len(),
            target = %target_dir.display(),
            "Artifacts committed"
        );
        Ok(committed)
    }

    fn discard(&self, staging_dir: &Path) {
        if !staging_dir.exists() {
            return;
        }
        if let Err(e) = fs::remove_dir_all(staging_dir) {
            tracing::warn!(
                staging = %staging_dir.display(),
                error = %e,
                "Failed to remove staging directory"
            );
        }
    }
}
