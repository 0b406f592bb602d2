//! 合约领域模型
//!
//! `ContractBinding` 是对接口描述（ABI JSON）的强类型封装：调用方只使用
//! `encode_call` / `decode_result`，不直接处理动态分派。

use std::fmt;

use chrono::{DateTime, Utc};
use ethers::{
    abi::{
        token::{LenientTokenizer, Tokenizer},
        Abi, ParamType, Token,
    },
    types::Bytes,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::domain::errors::{CustodyError, CustodyResult};

/// 已部署合约记录（每个合约名一条，写入后不可变）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContractRecord {
    #[serde(default)]
    pub contract_name: String,
    pub contract_address: String,
    pub transaction_hash: String,
    /// 序列化后的接口描述（ABI JSON 文本）
    pub abi: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_at: Option<DateTime<Utc>>,
}

impl ContractRecord {
    pub fn binding(&self) -> CustodyResult<ContractBinding> {
        ContractBinding::from_interface(&self.abi)
    }

    pub fn address(&self) -> CustodyResult<ethers::types::Address> {
        crate::infrastructure::rpc_validator::parse_address(&self.contract_address).map_err(|e| {
            CustodyError::Storage(format!(
                "registry record for {} has invalid address: {}",
                self.contract_name, e
            ))
        })
    }
}

/// 编译产物（Hardhat artifact 格式）
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledArtifact {
    #[serde(default)]
    pub contract_name: Option<String>,
    pub abi: Value,
    pub bytecode: String,
}

impl CompiledArtifact {
    pub fn bytecode_bytes(&self) -> CustodyResult<Vec<u8>> {
        let raw = self.bytecode.trim().trim_start_matches("0x");
        if raw.is_empty() {
            // 接口或抽象合约没有可部署字节码
            return Err(CustodyError::InvalidInput(
                "artifact has no deployable bytecode".into(),
            ));
        }
        hex::decode(raw)
            .map_err(|e| CustodyError::InvalidInput(format!("artifact bytecode is not hex: {}", e)))
    }

    pub fn interface_description(&self) -> String {
        self.abi.to_string()
    }

    pub fn binding(&self) -> CustodyResult<ContractBinding> {
        ContractBinding::from_abi_value(&self.abi)
    }
}

/// 强类型合约绑定
#[derive(Debug, Clone)]
pub struct ContractBinding {
    abi: Abi,
}

impl ContractBinding {
    pub fn from_interface(description: &str) -> CustodyResult<Self> {
        let abi: Abi = serde_json::from_str(description)
            .map_err(|e| CustodyError::InvalidInput(format!("invalid interface description: {}", e)))?;
        Ok(Self { abi })
    }

    pub fn from_abi_value(value: &Value) -> CustodyResult<Self> {
        let abi: Abi = serde_json::from_value(value.clone())
            .map_err(|e| CustodyError::InvalidInput(format!("invalid interface description: {}", e)))?;
        Ok(Self { abi })
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.abi.functions_by_name(name).is_ok()
    }

    /// 部署数据：字节码 + ABI 编码的构造参数
    pub fn encode_deploy(&self, bytecode: &[u8], args: &[Value]) -> CustodyResult<Bytes> {
        let Some(constructor) = self.abi.constructor() else {
            if !args.is_empty() {
                return Err(CustodyError::InvalidInput(format!(
                    "contract has no constructor but {} argument(s) were given",
                    args.len()
                )));
            }
            return Ok(Bytes::from(bytecode.to_vec()));
        };

        if constructor.inputs.len() != args.len() {
            return Err(CustodyError::InvalidInput(format!(
                "constructor expects {} argument(s), got {}",
                constructor.inputs.len(),
                args.len()
            )));
        }

        let tokens = constructor
            .inputs
            .iter()
            .zip(args)
            .map(|(param, value)| tokenize(&param.kind, value))
            .collect::<CustodyResult<Vec<_>>>()?;

        constructor
            .encode_input(bytecode.to_vec(), &tokens)
            .map(Bytes::from)
            .map_err(|e| CustodyError::InvalidInput(format!("constructor encoding failed: {}", e)))
    }

    /// 编码函数调用；重载函数按参数个数与类型选择
    pub fn encode_call(&self, name: &str, args: &[Token]) -> CustodyResult<Bytes> {
        let candidates = self.abi.functions_by_name(name).map_err(|_| {
            CustodyError::InvalidInput(format!("function {} is not part of the interface", name))
        })?;

        let function = candidates
            .iter()
            .find(|f| {
                let kinds: Vec<ParamType> = f.inputs.iter().map(|p| p.kind.clone()).collect();
                kinds.len() == args.len() && Token::types_check(args, &kinds)
            })
            .ok_or_else(|| {
                CustodyError::InvalidInput(format!(
                    "no overload of {} accepts {} argument(s) of the given types",
                    name,
                    args.len()
                ))
            })?;

        function
            .encode_input(args)
            .map(Bytes::from)
            .map_err(|e| CustodyError::InvalidInput(format!("encoding {} failed: {}", name, e)))
    }

    pub fn decode_result(&self, name: &str, data: &[u8]) -> CustodyResult<Vec<Token>> {
        let function = self
            .abi
            .functions_by_name(name)
            .ok()
            .and_then(|fs| fs.first())
            .ok_or_else(|| {
                CustodyError::InvalidInput(format!("function {} is not part of the interface", name))
            })?;

        function
            .decode_output(data)
            .map_err(|e| CustodyError::TransactionFailed(format!("decoding {} output failed: {}", name, e)))
    }
}

/// JSON 值 → ABI Token
fn tokenize(kind: &ParamType, value: &Value) -> CustodyResult<Token> {
    let invalid = |detail: String| CustodyError::InvalidInput(format!("argument of type {}: {}", kind, detail));

    match (kind, value) {
        (ParamType::Array(inner), Value::Array(items)) => items
            .iter()
            .map(|v| tokenize(inner, v))
            .collect::<CustodyResult<Vec<_>>>()
            .map(Token::Array),
        (ParamType::FixedArray(inner, len), Value::Array(items)) => {
            if items.len() != *len {
                return Err(invalid(format!("expected {} elements, got {}", len, items.len())));
            }
            items
                .iter()
                .map(|v| tokenize(inner, v))
                .collect::<CustodyResult<Vec<_>>>()
                .map(Token::FixedArray)
        }
        (ParamType::Tuple(kinds), Value::Array(items)) => {
            if items.len() != kinds.len() {
                return Err(invalid(format!("expected {} fields, got {}", kinds.len(), items.len())));
            }
            kinds
                .iter()
                .zip(items)
                .map(|(k, v)| tokenize(k, v))
                .collect::<CustodyResult<Vec<_>>>()
                .map(Token::Tuple)
        }
        (_, Value::String(s)) => LenientTokenizer::tokenize(kind, s).map_err(|e| invalid(e.to_string())),
        (_, Value::Number(n)) => {
            LenientTokenizer::tokenize(kind, &n.to_string()).map_err(|e| invalid(e.to_string()))
        }
        (_, Value::Bool(b)) => {
            LenientTokenizer::tokenize(kind, &b.to_string()).map_err(|e| invalid(e.to_string()))
        }
        (_, other) => Err(invalid(format!("unsupported JSON value {}", other))),
    }
}

/// 部署状态机：NotDeployed → Submitting → AwaitingConfirmation → Deployed | Failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentPhase {
    NotDeployed,
    Submitting,
    AwaitingConfirmation,
    Deployed,
    Failed,
}

impl DeploymentPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeploymentPhase::Deployed | DeploymentPhase::Failed)
    }
}

impl fmt::Display for DeploymentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeploymentPhase::NotDeployed => "not_deployed",
            DeploymentPhase::Submitting => "submitting",
            DeploymentPhase::AwaitingConfirmation => "awaiting_confirmation",
            DeploymentPhase::Deployed => "deployed",
            DeploymentPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use ethers::types::{Address, U256};
    use serde_json::json;

    use super::*;

    fn token_abi() -> Value {
        json!([
            {"type": "constructor", "stateMutability": "nonpayable",
             "inputs": [{"name": "initialSupply", "type": "uint256", "internalType": "uint256"}]},
            {"type": "function", "name": "transfer", "stateMutability": "nonpayable",
             "inputs": [{"name": "to", "type": "address", "internalType": "address"},
                        {"name": "value", "type": "uint256", "internalType": "uint256"}],
             "outputs": [{"name": "", "type": "bool", "internalType": "bool"}]},
            {"type": "function", "name": "balanceOf", "stateMutability": "view",
             "inputs": [{"name": "account", "type": "address", "internalType": "address"}],
             "outputs": [{"name": "", "type": "uint256", "internalType": "uint256"}]},
            {"type": "function", "name": "safeTransferFrom", "stateMutability": "nonpayable",
             "inputs": [{"name": "from", "type": "address", "internalType": "address"},
                        {"name": "to", "type": "address", "internalType": "address"},
                        {"name": "tokenId", "type": "uint256", "internalType": "uint256"}],
             "outputs": []},
            {"type": "function", "name": "safeTransferFrom", "stateMutability": "nonpayable",
             "inputs": [{"name": "from", "type": "address", "internalType": "address"},
                        {"name": "to", "type": "address", "internalType": "address"},
                        {"name": "tokenId", "type": "uint256", "internalType": "uint256"},
                        {"name": "data", "type": "bytes", "internalType": "bytes"}],
             "outputs": []}
        ])
    }

    #[test]
    fn test_encode_deploy_appends_constructor_args() {
        let binding = ContractBinding::from_abi_value(&token_abi()).unwrap();
        let code = vec![0x60, 0x80, 0x60, 0x40];

        let data = binding.encode_deploy(&code, &[json!(1_000_000)]).unwrap();
        assert_eq!(data.len(), code.len() + 32);
        assert_eq!(&data[..4], &code[..]);
        assert_eq!(U256::from_big_endian(&data[4..]), U256::from(1_000_000u64));

        // 字符串形式的十进制数同样接受
        let same = binding.encode_deploy(&code, &[json!("1000000")]).unwrap();
        assert_eq!(data, same);
    }

    #[test]
    fn test_encode_deploy_rejects_wrong_arity() {
        let binding = ContractBinding::from_abi_value(&token_abi()).unwrap();
        let err = binding.encode_deploy(&[0x00], &[]).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[test]
    fn test_encode_call_uses_function_selector() {
        let binding = ContractBinding::from_abi_value(&token_abi()).unwrap();
        let to = Address::repeat_byte(0xab);
        let data = binding
            .encode_call("transfer", &[Token::Address(to), Token::Uint(U256::from(100u64))])
            .unwrap();

        assert_eq!(&data[..4], &ethers::utils::id("transfer(address,uint256)")[..]);
        assert_eq!(data.len(), 4 + 64);
    }

    #[test]
    fn test_encode_call_picks_overload_by_arity() {
        let binding = ContractBinding::from_abi_value(&token_abi()).unwrap();
        let args = [
            Token::Address(Address::repeat_byte(1)),
            Token::Address(Address::repeat_byte(2)),
            Token::Uint(U256::zero()),
        ];
        let data = binding.encode_call("safeTransferFrom", &args).unwrap();
        assert_eq!(
            &data[..4],
            &ethers::utils::id("safeTransferFrom(address,address,uint256)")[..]
        );
    }

    #[test]
    fn test_encode_call_unknown_function() {
        let binding = ContractBinding::from_abi_value(&token_abi()).unwrap();
        assert!(!binding.has_function("burn"));
        assert!(binding.encode_call("burn", &[]).is_err());
    }

    #[test]
    fn test_decode_result() {
        let binding = ContractBinding::from_abi_value(&token_abi()).unwrap();
        let encoded = ethers::abi::encode(&[Token::Uint(U256::from(42u64))]);
        let tokens = binding.decode_result("balanceOf", &encoded).unwrap();
        assert_eq!(tokens, vec![Token::Uint(U256::from(42u64))]);
    }

    #[test]
    fn test_artifact_without_bytecode() {
        let artifact = CompiledArtifact {
            contract_name: Some("IToken".into()),
            abi: json!([]),
            bytecode: "0x".into(),
        };
        assert!(artifact.bytecode_bytes().is_err());
    }

    #[test]
    fn test_deployment_phase_terminal() {
        assert!(DeploymentPhase::Deployed.is_terminal());
        assert!(DeploymentPhase::Failed.is_terminal());
        assert!(!DeploymentPhase::AwaitingConfirmation.is_terminal());
        assert_eq!(DeploymentPhase::Submitting.to_string(), "submitting");
    }
}
