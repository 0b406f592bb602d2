//! 钱包领域模型
//!
//! - `WalletPublicInfo`：可对外返回的地址与加密密钥材料
//! - `Passphrase`：人工输入的口令，仅在单次操作内存在，释放时清零
//! - `SigningHandle`：解锁后的签名句柄，只在核心内部流转，从不跨越 HTTP 边界

use std::fmt;

use ethers::{
    signers::{LocalWallet, Signer},
    types::{transaction::eip2718::TypedTransaction, Address, Signature},
    utils::to_checksum,
};
use k256::ecdsa::SigningKey;
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use zeroize::Zeroizing;

use crate::domain::errors::{CustodyError, CustodyResult};

/// 钱包公开信息（不含任何可直接使用的秘密）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WalletPublicInfo {
    /// EIP-55 校验和格式地址
    pub address: String,
    /// 自描述的加密密钥材料（JSON 文本）
    pub keystore_json: String,
}

/// 用户口令
#[derive(Clone)]
pub struct Passphrase(Zeroizing<String>);

impl Passphrase {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(***)")
    }
}

impl<'de> Deserialize<'de> for Passphrase {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Passphrase::new)
    }
}

impl From<&str> for Passphrase {
    fn from(value: &str) -> Self {
        Passphrase::new(value)
    }
}

/// 解锁后的签名句柄
///
/// 内部 `SigningKey` 在 drop 时清零；句柄不缓存，每次操作重新从密文派生。
pub struct SigningHandle {
    wallet: LocalWallet,
}

impl SigningHandle {
    pub(crate) fn from_signing_key(key: SigningKey) -> Self {
        Self {
            wallet: LocalWallet::from(key),
        }
    }

    pub(crate) fn from_secret_bytes(secret: &[u8]) -> CustodyResult<Self> {
        let key = SigningKey::from_slice(secret)
            .map_err(|e| CustodyError::DecryptionFailed(format!("invalid key material: {}", e)))?;
        Ok(Self::from_signing_key(key))
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub fn checksum_address(&self) -> String {
        to_checksum(&self.wallet.address(), None)
    }

    /// 对交易签名（交易需已设置 chain_id，符合 EIP-155）
    pub fn sign(&self, tx: &TypedTransaction) -> CustodyResult<Signature> {
        self.wallet
            .sign_transaction_sync(tx)
            .map_err(|e| CustodyError::TransactionFailed(format!("signing failed: {}", e)))
    }
}

impl fmt::Debug for SigningHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningHandle")
            .field("address", &self.checksum_address())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passphrase_debug_is_redacted() {
        let p = Passphrase::new("p@ss");
        assert_eq!(format!("{:?}", p), "Passphrase(***)");
        assert_eq!(p.expose(), "p@ss");
    }

    #[test]
    fn test_passphrase_deserializes_from_string() {
        let p: Passphrase = serde_json::from_str("\"secret\"").unwrap();
        assert_eq!(p.expose(), "secret");
    }

    #[test]
    fn test_signing_handle_rejects_bad_material() {
        let err = SigningHandle::from_secret_bytes(&[0u8; 32]).unwrap_err();
        assert_eq!(err.kind(), "decryption_failed");
    }

    #[test]
    fn test_signing_handle_debug_hides_key() {
        let key = SigningKey::from_slice(&[7u8; 32]).unwrap();
        let handle = SigningHandle::from_signing_key(key);
        let rendered = format!("{:?}", handle);
        assert!(rendered.contains("address"));
        assert!(!rendered.contains("0707070707"));
    }
}
