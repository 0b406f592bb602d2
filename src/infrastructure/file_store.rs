//! 文件持久化
//!
//! 记录以 JSON 文件保存。`create_new` 通过"临时文件 + 硬链接"实现原子的
//! insert-if-absent：硬链接在目标已存在时失败，因此并发写入同一键只会有一个成功。

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Serialize};
use tokio::io::AsyncWriteExt;

use crate::domain::{CustodyError, CustodyResult};

/// 写入结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    /// 读取原始字节；文件不存在返回 None
    pub async fn read_bytes(&self, file_name: &str) -> CustodyResult<Option<Vec<u8>>> {
        let path = self.path_of(file_name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CustodyError::Storage(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// 读取并反序列化；文件不存在返回 None
    pub async fn read<T: DeserializeOwned>(&self, file_name: &str) -> CustodyResult<Option<T>> {
        let Some(bytes) = self.read_bytes(file_name).await? else {
            return Ok(None);
        };

        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            CustodyError::Storage(format!(
                "corrupt record {}: {}",
                self.path_of(file_name).display(),
                e
            ))
        })
    }

    /// 文件是否存在（不解析内容）
    pub async fn exists(&self, file_name: &str) -> CustodyResult<bool> {
        tokio::fs::try_exists(self.path_of(file_name))
            .await
            .map_err(CustodyError::storage)
    }

    /// 原子地创建新文件；目标已存在时不覆盖
    pub async fn create_new<T: Serialize>(
        &self,
        file_name: &str,
        value: &T,
    ) -> CustodyResult<CreateOutcome> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(CustodyError::storage)?;

        let body = serde_json::to_vec_pretty(value).map_err(CustodyError::storage)?;
        let target = self.path_of(file_name);
        let tmp = self
            .root
            .join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

        let result = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(&body).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::hard_link(&tmp, &target).await
        }
        .await;

        // 临时文件无论成败都清理
        if let Err(e) = tokio::fs::remove_file(&tmp).await {
            tracing::warn!(error = %e, path = %tmp.display(), "failed to remove temp file");
        }

        match result {
            Ok(()) => Ok(CreateOutcome::Created),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(CreateOutcome::AlreadyExists),
            Err(e) => Err(CustodyError::Storage(format!(
                "failed to write {}: {}",
                target.display(),
                e
            ))),
        }
    }

    /// 列出目录中的 `*.json` 文件名（不含扩展名），按名称排序
    pub async fn list_keys(&self) -> CustodyResult<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CustodyError::storage(e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(CustodyError::storage)? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with('.') {
                continue;
            }
            if let Some(key) = name.strip_suffix(".json") {
                keys.push(key.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}
