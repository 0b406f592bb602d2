//! 请求参数解析：地址与 uint256

use ethers::types::{Address, U256};
use serde::Deserialize;

use crate::{domain::CustodyError, infrastructure::rpc_validator};

/// 接受 JSON 数字或十进制字符串
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Uint256Input {
    Number(serde_json::Number),
    Text(String),
}

impl Uint256Input {
    pub fn to_u256(&self, field: &str) -> Result<U256, CustodyError> {
        match self {
            Uint256Input::Number(n) => n.as_u64().map(U256::from).ok_or_else(|| {
                CustodyError::InvalidInput(format!(
                    "{} must be a non-negative integer (use a decimal string for large values)",
                    field
                ))
            }),
            Uint256Input::Text(s) => rpc_validator::parse_uint256(s.trim())
                .map_err(|e| CustodyError::InvalidInput(format!("{}: {}", field, e))),
        }
    }
}

pub fn parse_recipient(value: &str, field: &str) -> Result<Address, CustodyError> {
    rpc_validator::parse_address(value.trim())
        .map_err(|e| CustodyError::InvalidInput(format!("{}: {}", field, e)))
}
