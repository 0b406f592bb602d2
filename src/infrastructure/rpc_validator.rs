// RPC响应与外部输入校验 - 防止链上数据和请求参数污染

use std::str::FromStr;

use anyhow::{Context, Result};
use ethers::types::{Address, H256, U256};

/// 验证 JSON-RPC 数量值（u64 范围）
pub fn validate_quantity(value_hex: &str) -> Result<u64> {
    let digits = value_hex.trim_start_matches("0x");

    // u64最多16个十六进制字符
    if digits.is_empty() || digits.len() > 16 {
        anyhow::bail!("Quantity hex string has invalid length: {}", digits.len());
    }

    u64::from_str_radix(digits, 16).context("Failed to parse quantity from hex")
}

/// 验证 JSON-RPC 256 位数量值（gas price 等）
pub fn validate_u256(value_hex: &str) -> Result<U256> {
    let digits = value_hex.trim_start_matches("0x");

    if digits.is_empty() || digits.len() > 64 {
        anyhow::bail!("U256 hex string has invalid length: {}", digits.len());
    }

    U256::from_str_radix(digits, 16).map_err(|e| anyhow::anyhow!("Failed to parse u256: {}", e))
}

/// 验证RPC返回的gas估算值
pub fn validate_gas(gas_hex: &str) -> Result<u64> {
    let gas = validate_quantity(gas_hex).context("Failed to parse gas from hex")?;

    // 单笔交易的 gas 不会超过区块上限量级
    const MAX_REASONABLE_GAS: u64 = 60_000_000;
    if gas > MAX_REASONABLE_GAS {
        anyhow::bail!("Gas exceeds reasonable maximum: {}", gas);
    }

    Ok(gas)
}

/// 验证交易哈希格式
pub fn validate_tx_hash(tx_hash: &str) -> Result<H256> {
    let hash = tx_hash.trim_start_matches("0x");

    if hash.len() != 64 {
        anyhow::bail!(
            "Invalid transaction hash length: expected 64, got {}",
            hash.len()
        );
    }

    if !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        anyhow::bail!("Invalid transaction hash format: contains non-hex characters");
    }

    H256::from_str(hash).context("Invalid transaction hash")
}

/// 解析地址（接受大小写混合，不强制校验和）
pub fn parse_address(address: &str) -> Result<Address> {
    let addr = address.trim().trim_start_matches("0x");

    if addr.len() != 40 {
        anyhow::bail!("Invalid address length: expected 40, got {}", addr.len());
    }

    if !addr.chars().all(|c| c.is_ascii_hexdigit()) {
        anyhow::bail!("Invalid address format: contains non-hex characters");
    }

    Address::from_str(addr).context("Invalid address")
}

/// 解析十进制无符号整数（uint256 范围）
pub fn parse_uint256(value: &str) -> Result<U256> {
    let value = value.trim();
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
        anyhow::bail!("Expected a non-negative decimal integer, got {:?}", value);
    }

    U256::from_dec_str(value).map_err(|e| anyhow::anyhow!("Value out of uint256 range: {}", e))
}

/// 验证RPC响应格式
pub fn validate_rpc_response(json: &serde_json::Value) -> Result<()> {
    if let Some(error) = json.get("error") {
        let error_code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(-1);
        let error_msg = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error");
        anyhow::bail!("RPC error {}: {}", error_code, error_msg);
    }

    if json.get("result").is_none() {
        anyhow::bail!("Missing result field in RPC response");
    }

    if let Some(version) = json.get("jsonrpc") {
        if version.as_str() != Some("2.0") {
            anyhow::bail!("Unsupported JSON-RPC version: {:?}", version);
        }
    }

    Ok(())
}
