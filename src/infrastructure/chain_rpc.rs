// 链上 RPC 访问
// ChainRpc 是核心与节点之间唯一的边界；生产使用 JSON-RPC over HTTP，测试使用内存实现。

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::types::{
    transaction::eip2718::TypedTransaction, Address, Bytes, NameOrAddress, H256, U256,
};
use serde_json::{json, Map, Value};

use crate::infrastructure::rpc_validator;

/// 节点返回的交易回执（只保留核心关心的字段）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReceipt {
    pub transaction_hash: H256,
    pub block_number: Option<u64>,
    pub block_hash: Option<H256>,
    /// 1 = 成功, 0 = 回滚
    pub status: Option<u64>,
    pub gas_used: Option<U256>,
    pub contract_address: Option<Address>,
}

impl ChainReceipt {
    pub fn is_reverted(&self) -> bool {
        self.status == Some(0)
    }
}

#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn chain_id(&self) -> Result<u64>;

    async fn block_number(&self) -> Result<u64>;

    /// 含 pending 交易的 nonce
    async fn transaction_count(&self, address: Address) -> Result<u64>;

    async fn gas_price(&self) -> Result<U256>;

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256>;

    /// 只读调用（latest 区块）
    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes>;

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256>;

    /// 未打包时返回 None
    async fn transaction_receipt(&self, hash: H256) -> Result<Option<ChainReceipt>>;
}

/// JSON-RPC over HTTP 客户端
pub struct JsonRpcClient {
    http_client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id
        });

        let response = self
            .http_client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", method))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            anyhow::bail!("RPC request failed with status {}: {}", status, body);
        }

        let mut json: Value =
            serde_json::from_str(&body).context("Failed to parse JSON response")?;

        rpc_validator::validate_rpc_response(&json)
            .with_context(|| format!("{} rejected", method))?;

        tracing::trace!(method = method, id = id, "rpc_call");
        Ok(json["result"].take())
    }

    async fn request_str(&self, method: &str, params: Value) -> Result<String> {
        let result = self.request(method, params).await?;
        result
            .as_str()
            .map(str::to_string)
            .with_context(|| format!("{} returned non-string result", method))
    }
}

/// TypedTransaction → JSON-RPC 调用对象
fn call_object(tx: &TypedTransaction) -> Value {
    let mut obj = Map::new();
    if let Some(from) = tx.from() {
        obj.insert("from".into(), json!(from));
    }
    if let Some(NameOrAddress::Address(to)) = tx.to() {
        obj.insert("to".into(), json!(to));
    }
    if let Some(data) = tx.data() {
        obj.insert("data".into(), json!(data));
    }
    if let Some(value) = tx.value() {
        obj.insert("value".into(), json!(value));
    }
    if let Some(gas) = tx.gas() {
        obj.insert("gas".into(), json!(gas));
    }
    Value::Object(obj)
}

fn parse_receipt(hash: H256, receipt: &Value) -> Result<ChainReceipt> {
    let field = |name: &str| receipt.get(name).and_then(|v| v.as_str());

    let block_number = field("blockNumber")
        .map(rpc_validator::validate_quantity)
        .transpose()
        .context("Invalid blockNumber in receipt")?;
    let block_hash = field("blockHash")
        .map(rpc_validator::validate_tx_hash)
        .transpose()
        .context("Invalid blockHash in receipt")?;
    let status = field("status")
        .map(rpc_validator::validate_quantity)
        .transpose()
        .context("Invalid status in receipt")?;
    let gas_used = field("gasUsed")
        .map(rpc_validator::validate_u256)
        .transpose()
        .context("Invalid gasUsed in receipt")?;
    let contract_address = field("contractAddress")
        .map(rpc_validator::parse_address)
        .transpose()
        .context("Invalid contractAddress in receipt")?;

    Ok(ChainReceipt {
        transaction_hash: hash,
        block_number,
        block_hash,
        status,
        gas_used,
        contract_address,
    })
}

#[async_trait]
impl ChainRpc for JsonRpcClient {
    async fn chain_id(&self) -> Result<u64> {
        let value = self.request_str("eth_chainId", json!([])).await?;
        rpc_validator::validate_quantity(&value)
    }

    async fn block_number(&self) -> Result<u64> {
        let value = self.request_str("eth_blockNumber", json!([])).await?;
        rpc_validator::validate_quantity(&value)
    }

    async fn transaction_count(&self, address: Address) -> Result<u64> {
        let value = self
            .request_str("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        rpc_validator::validate_quantity(&value).context("Invalid nonce")
    }

    async fn gas_price(&self) -> Result<U256> {
        let value = self.request_str("eth_gasPrice", json!([])).await?;
        rpc_validator::validate_u256(&value)
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256> {
        let value = self
            .request_str("eth_estimateGas", json!([call_object(tx)]))
            .await?;
        rpc_validator::validate_gas(&value).map(U256::from)
    }

    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes> {
        let value = self
            .request_str("eth_call", json!([call_object(tx), "latest"]))
            .await?;
        let bytes = hex::decode(value.trim_start_matches("0x")).context("eth_call returned non-hex data")?;
        Ok(Bytes::from(bytes))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256> {
        let value = self
            .request_str("eth_sendRawTransaction", json!([raw]))
            .await?;
        rpc_validator::validate_tx_hash(&value).context("Invalid transaction hash format")
    }

    async fn transaction_receipt(&self, hash: H256) -> Result<Option<ChainReceipt>> {
        let result = self
            .request("eth_getTransactionReceipt", json!([hash]))
            .await?;

        // null 表示交易尚未打包
        if result.is_null() {
            return Ok(None);
        }
        parse_receipt(hash, &result).map(Some)
    }
}
