//! 凭证金库服务
//!
//! 持有唯一的托管钱包：生成、公开信息查询、按次解锁。
//! 口令只在单次调用内存在；私钥明文只以 `SigningHandle` 形式短暂存在于内存。

use std::sync::Arc;

use chrono::Utc;
use ethers::utils::{secret_key_to_address, to_checksum};
use k256::ecdsa::SigningKey;
use zeroize::Zeroizing;

use crate::{
    domain::{CustodyError, CustodyResult, Passphrase, SigningHandle, WalletPublicInfo},
    infrastructure::{
        keystore,
        log_redact::{redact_address, SensitiveRedact},
    },
    repository::{WalletRecord, WalletStore},
};

pub struct CredentialVault {
    store: Arc<dyn WalletStore>,
    kdf_iterations: u32,
}

impl CredentialVault {
    pub fn new(store: Arc<dyn WalletStore>, kdf_iterations: u32) -> Self {
        Self {
            store,
            kdf_iterations,
        }
    }

    /// 生成新密钥对并以口令加密保存；已有钱包时返回 `AlreadyExists`
    pub async fn generate(&self, passphrase: &Passphrase) -> CustodyResult<WalletPublicInfo> {
        if passphrase.is_empty() {
            return Err(CustodyError::InvalidInput("password must not be empty".into()));
        }

        // 快速路径：避免在已有钱包时做昂贵的密钥派生
        if self.store.exists().await? {
            return Err(CustodyError::AlreadyExists("wallet".into()));
        }

        let key = SigningKey::random(&mut rand::rngs::OsRng);
        let address = secret_key_to_address(&key);
        let secret = Zeroizing::new(key.to_bytes().to_vec());
        drop(key);

        let iterations = self.kdf_iterations;
        let pass = passphrase.clone();
        // PBKDF2 是 CPU 密集操作，放到阻塞线程池
        let keystore_json = tokio::task::spawn_blocking(move || {
            keystore::encrypt_key(&secret, &address, &pass, iterations)
        })
        .await
        .map_err(|e| CustodyError::Storage(format!("key encryption task failed: {}", e)))??;

        let record = WalletRecord {
            address: to_checksum(&address, None),
            keystore_json,
            created_at: Utc::now(),
        };

        // 并发生成时只有一个写入成功，其余得到 AlreadyExists
        self.store.create(&record).await?;

        let info = WalletPublicInfo::from(record);
        tracing::info!(
            wallet = %info.redact(),
            kdf_iterations = iterations,
            "wallet_generated"
        );

        Ok(info)
    }

    /// 公开信息（地址 + 加密密钥材料）
    pub async fn get_public_info(&self) -> CustodyResult<WalletPublicInfo> {
        self.store
            .load()
            .await?
            .map(WalletPublicInfo::from)
            .ok_or(CustodyError::NoCredential)
    }

    /// 用口令解锁签名句柄；每次调用都重新派生，不缓存
    pub async fn unlock(&self, passphrase: &Passphrase) -> CustodyResult<SigningHandle> {
        let record = self.store.load().await?.ok_or(CustodyError::NoCredential)?;

        let keystore_json = record.keystore_json.clone();
        let pass = passphrase.clone();
        let secret = tokio::task::spawn_blocking(move || keystore::decrypt_key(&keystore_json, &pass))
            .await
            .map_err(|e| CustodyError::Storage(format!("key decryption task failed: {}", e)))?
            .map_err(|e| {
                tracing::warn!(error_kind = e.kind(), "wallet_unlock_failed");
                e
            })?;

        let handle = SigningHandle::from_secret_bytes(&secret)?;
        if !handle.checksum_address().eq_ignore_ascii_case(&record.address) {
            return Err(CustodyError::DecryptionFailed(
                "decrypted key does not match the stored address".into(),
            ));
        }

        tracing::debug!(address = %redact_address(&record.address), "wallet_unlocked");
        Ok(handle)
    }
}
