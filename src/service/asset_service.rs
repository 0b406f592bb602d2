//! NFT 元数据与图片
//!
//! 目录布局：`<assets_dir>/<tokenId>`（或 `<tokenId>.json`）为元数据，
//! `<assets_dir>/images/<tokenId>.png` 为图片。

use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::domain::{CustodyError, CustodyResult};

static TOKEN_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{1,78}$").expect("valid regex"));

pub struct AssetService {
    assets_dir: PathBuf,
}

impl AssetService {
    pub fn new(assets_dir: impl Into<PathBuf>) -> Self {
        Self {
            assets_dir: assets_dir.into(),
        }
    }

    /// tokenId 只允许十进制数字，保证不会逃出资产目录
    fn validate_token_id(token_id: &str) -> CustodyResult<()> {
        if TOKEN_ID.is_match(token_id) {
            Ok(())
        } else {
            Err(CustodyError::InvalidInput(format!("invalid token id {:?}", token_id)))
        }
    }

    pub async fn metadata(&self, token_id: &str) -> CustodyResult<Value> {
        Self::validate_token_id(token_id)?;

        let candidates = [
            self.assets_dir.join(token_id),
            self.assets_dir.join(format!("{}.json", token_id)),
        ];
        for path in candidates {
            match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    return serde_json::from_slice(&bytes).map_err(|e| {
                        CustodyError::Storage(format!("invalid metadata {}: {}", path.display(), e))
                    })
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                // `<id>` 可能是目录
                Err(_) if path.is_dir() => continue,
                Err(e) => return Err(CustodyError::storage(e)),
            }
        }

        Err(CustodyError::NotFound(format!("metadata for token {}", token_id)))
    }

    pub async fn image(&self, token_id: &str) -> CustodyResult<Vec<u8>> {
        Self::validate_token_id(token_id)?;

        let path = self
            .assets_dir
            .join("images")
            .join(format!("{}.png", token_id));
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(CustodyError::NotFound(
                format!("image for token {}", token_id),
            )),
            Err(e) => Err(CustodyError::storage(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_metadata_lookup() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("0"), r#"{"name":"Asset #0"}"#).unwrap();
        std::fs::write(dir.path().join("1.json"), r#"{"name":"Asset #1"}"#).unwrap();
        let service = AssetService::new(dir.path());

        assert_eq!(service.metadata("0").await.unwrap()["name"], "Asset #0");
        assert_eq!(service.metadata("1").await.unwrap()["name"], "Asset #1");
        assert_eq!(service.metadata("2").await.unwrap_err().kind(), "not_found");
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let service = AssetService::new(dir.path());

        assert_eq!(service.metadata("../secret").await.unwrap_err().kind(), "invalid_input");
        assert_eq!(service.image("1/../../x").await.unwrap_err().kind(), "invalid_input");
    }

    #[tokio::test]
    async fn test_image() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("images")).unwrap();
        std::fs::write(dir.path().join("images").join("3.png"), [0x89, b'P', b'N', b'G']).unwrap();
        let service = AssetService::new(dir.path());

        assert_eq!(service.image("3").await.unwrap(), vec![0x89, b'P', b'N', b'G']);
        assert_eq!(service.image("4").await.unwrap_err().kind(), "not_found");
    }
}
