// 交易构建 / 签名 / 广播
// 链上 nonce 取 pending 计数，不做本地协调；同一凭证的严格顺序由调用方保证

use std::sync::Arc;

use ethers::{
    types::{transaction::eip2718::TypedTransaction, Address, Bytes, TransactionRequest, H256, U256},
    utils::keccak256,
};
use tokio::sync::OnceCell;

use crate::{
    domain::{CustodyError, CustodyResult, SigningHandle},
    infrastructure::{
        log_redact::{redact_address, SensitiveRedact, SignedPayload},
        ChainRpc,
    },
};

/// 已广播的交易
#[derive(Debug, Clone, Copy)]
pub struct SubmittedTx {
    pub hash: H256,
    pub from: Address,
    pub nonce: u64,
}

pub struct TxPipeline {
    rpc: Arc<dyn ChainRpc>,
    configured_chain_id: Option<u64>,
    chain_id: OnceCell<u64>,
    gas_limit_multiplier_percent: u64,
}

fn submit_failed(stage: &str, err: anyhow::Error) -> CustodyError {
    CustodyError::TransactionFailed(format!("{}: {:#}", stage, err))
}

impl TxPipeline {
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        configured_chain_id: Option<u64>,
        gas_limit_multiplier_percent: u64,
    ) -> Self {
        Self {
            rpc,
            configured_chain_id,
            chain_id: OnceCell::new(),
            gas_limit_multiplier_percent,
        }
    }

    pub fn rpc(&self) -> &Arc<dyn ChainRpc> {
        &self.rpc
    }

    /// 配置优先；否则首次查询节点后缓存
    pub async fn chain_id(&self) -> CustodyResult<u64> {
        if let Some(id) = self.configured_chain_id {
            return Ok(id);
        }
        self.chain_id
            .get_or_try_init(|| async {
                let id = self
                    .rpc
                    .chain_id()
                    .await
                    .map_err(|e| submit_failed("eth_chainId", e))?;
                tracing::info!(chain_id = id, "chain id resolved from node");
                Ok::<u64, CustodyError>(id)
            })
            .await
            .copied()
    }

    pub fn apply_gas_multiplier(&self, estimate: U256) -> U256 {
        estimate * U256::from(self.gas_limit_multiplier_percent) / U256::from(100u64)
    }

    /// 构建、签名并广播一笔 legacy (EIP-155) 交易；`to` 为 None 时为合约创建
    pub async fn submit(
        &self,
        signer: &SigningHandle,
        to: Option<Address>,
        data: Bytes,
        kind: &'static str,
    ) -> CustodyResult<SubmittedTx> {
        let from = signer.address();
        let chain_id = self.chain_id().await?;

        let nonce = self
            .rpc
            .transaction_count(from)
            .await
            .map_err(|e| submit_failed("eth_getTransactionCount", e))?;
        let gas_price = self
            .rpc
            .gas_price()
            .await
            .map_err(|e| submit_failed("eth_gasPrice", e))?;

        let mut request = TransactionRequest::new()
            .from(from)
            .data(data)
            .nonce(nonce)
            .gas_price(gas_price)
            .chain_id(chain_id);
        if let Some(to) = to {
            request = request.to(to);
        }
        let mut tx: TypedTransaction = request.into();

        // 估算失败通常意味着调用会回滚
        let estimate = self
            .rpc
            .estimate_gas(&tx)
            .await
            .map_err(|e| submit_failed("gas estimation failed", e))?;
        tx.set_gas(self.apply_gas_multiplier(estimate));

        let signature = signer.sign(&tx)?;
        let raw = tx.rlp_signed(&signature);
        let local_hash = H256::from(keccak256(&raw));

        tracing::debug!(
            kind = kind,
            nonce = nonce,
            raw = %SignedPayload(&raw).redact(),
            "transaction signed"
        );

        let hash = self
            .rpc
            .send_raw_transaction(raw)
            .await
            .map_err(|e| {
                crate::metrics::inc_tx_outcome("rejected");
                submit_failed("eth_sendRawTransaction", e)
            })?;

        if hash != local_hash {
            tracing::warn!(node_hash = ?hash, local_hash = ?local_hash, "node returned unexpected transaction hash");
        }

        crate::metrics::inc_tx_outcome("submitted");
        tracing::info!(
            kind = kind,
            tx_hash = ?hash,
            from = %redact_address(&signer.checksum_address()),
            to = %to.map(|a| redact_address(&format!("{:?}", a))).unwrap_or_else(|| "create".into()),
            nonce = nonce,
            gas_limit = ?tx.gas(),
            "transaction_submitted"
        );

        Ok(SubmittedTx { hash, from, nonce })
    }

    /// 只读调用
    pub async fn call(&self, to: Address, data: Bytes) -> CustodyResult<Bytes> {
        let tx: TypedTransaction = TransactionRequest::new().to(to).data(data).into();
        self.rpc
            .call(&tx)
            .await
            .map_err(|e| submit_failed("eth_call", e))
    }
}
