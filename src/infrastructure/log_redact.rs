//! 日志脱敏
//!
//! 地址、交易哈希、密钥材料写入日志前统一经过这里；口令与私钥永远不进入日志。

use serde::Serialize;

use crate::domain::WalletPublicInfo;

/// 可脱敏trait
pub trait SensitiveRedact {
    fn redact(&self) -> String;
}

/// 脱敏十六进制字符串（显示前缀和后缀）
pub fn redact_hex_string(hex: &str, show_chars: usize) -> String {
    if hex.len() <= show_chars * 2 {
        return "*".repeat(hex.len());
    }

    let prefix = &hex[..show_chars];
    let suffix = &hex[hex.len() - show_chars..];
    format!("{}...{}", prefix, suffix)
}

/// 脱敏地址（显示前6位和后4位）
pub fn redact_address(address: &str) -> String {
    if address.len() < 10 {
        return "*".repeat(address.len());
    }

    let prefix = &address[..6];
    let suffix = &address[address.len() - 4..];
    format!("{}...{}", prefix, suffix)
}

#[derive(Debug, Serialize)]
struct RedactedWallet<'a> {
    address: &'a str,
    keystore_bytes: usize,
}

impl SensitiveRedact for WalletPublicInfo {
    fn redact(&self) -> String {
        // 密钥材料只记录长度
        serde_json::to_string(&RedactedWallet {
            address: &self.address,
            keystore_bytes: self.keystore_json.len(),
        })
        .unwrap_or_else(|_| "{ redacted }".to_string())
    }
}

/// 已签名交易只保留头尾
pub struct SignedPayload<'a>(pub &'a [u8]);

impl SensitiveRedact for SignedPayload<'_> {
    fn redact(&self) -> String {
        redact_hex_string(&format!("0x{}", hex::encode(self.0)), 10)
    }
}
