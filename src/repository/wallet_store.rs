// 钱包持久化 Repository
// 单钱包：`<data_dir>/wallet.json`，只写一次

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{CustodyError, CustodyResult, WalletPublicInfo},
    infrastructure::{CreateOutcome, JsonFileStore},
};

const WALLET_FILE: &str = "wallet.json";

/// 钱包记录（只含加密后的密钥材料，不含口令）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecord {
    pub address: String,
    pub keystore_json: String,
    pub created_at: DateTime<Utc>,
}

impl From<WalletRecord> for WalletPublicInfo {
    fn from(record: WalletRecord) -> Self {
        WalletPublicInfo {
            address: record.address,
            keystore_json: record.keystore_json,
        }
    }
}

#[async_trait]
pub trait WalletStore: Send + Sync {
    /// 记录损坏（无法解析）时返回 `DecryptionFailed`
    async fn load(&self) -> CustodyResult<Option<WalletRecord>>;

    /// 是否已有钱包文件，不论内容能否解析
    async fn exists(&self) -> CustodyResult<bool>;

    /// 已存在时返回 `AlreadyExists`，不覆盖
    async fn create(&self, record: &WalletRecord) -> CustodyResult<()>;
}

pub struct FileWalletStore {
    store: JsonFileStore,
}

impl FileWalletStore {
    pub fn new(store: JsonFileStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl WalletStore for FileWalletStore {
    async fn load(&self) -> CustodyResult<Option<WalletRecord>> {
        let Some(bytes) = self.store.read_bytes(WALLET_FILE).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| CustodyError::DecryptionFailed(format!("corrupt wallet record: {}", e)))
    }

    async fn exists(&self) -> CustodyResult<bool> {
        self.store.exists(WALLET_FILE).await
    }

    async fn create(&self, record: &WalletRecord) -> CustodyResult<()> {
        match self.store.create_new(WALLET_FILE, record).await? {
            CreateOutcome::Created => Ok(()),
            CreateOutcome::AlreadyExists => Err(CustodyError::AlreadyExists("wallet".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(address: &str) -> WalletRecord {
        WalletRecord {
            address: address.into(),
            keystore_json: "{}".into(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileWalletStore::new(JsonFileStore::new(dir.path()));

        assert!(store.load().await.unwrap().is_none());
        store.create(&record("0x01")).await.unwrap();

        let err = store.create(&record("0x02")).await.unwrap_err();
        assert_eq!(err.kind(), "already_exists");
        assert_eq!(store.load().await.unwrap().unwrap().address, "0x01");
    }

    #[tokio::test]
    async fn test_legacy_fields_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(WALLET_FILE),
            r#"{"address":"0xabc","keystoreJson":"{}","createdAt":"2024-01-01T00:00:00Z","password":"old"}"#,
        )
        .unwrap();

        let store = FileWalletStore::new(JsonFileStore::new(dir.path()));
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.address, "0xabc");
    }

    #[tokio::test]
    async fn test_unparsable_record_is_decryption_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(WALLET_FILE), b"{not json").unwrap();

        let store = FileWalletStore::new(JsonFileStore::new(dir.path()));
        assert_eq!(store.load().await.unwrap_err().kind(), "decryption_failed");
        assert!(store.exists().await.unwrap());
    }
}
