// 交易确认等待
// 单一挂起点：轮询回执直到达到所需确认数，整个等待受 timeout 约束。
// 轮询期间的 RPC 错误只记录日志，不视为失败，也不重新提交交易。

use std::time::{Duration, Instant};

use ethers::types::H256;

use crate::{
    config::ChainConfig,
    domain::{CustodyError, CustodyResult, TransactionReceiptView},
    infrastructure::{ChainReceipt, ChainRpc},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub confirmations: u64,
}

impl ConfirmationPolicy {
    pub fn from_config(config: &ChainConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.confirmation_timeout_secs),
            poll_interval: Duration::from_millis(config.confirmation_poll_ms),
            confirmations: config.confirmations.max(1),
        }
    }
}

/// 已确认的交易
#[derive(Debug, Clone)]
pub struct ConfirmedTx {
    pub receipt: ChainReceipt,
    pub block_number: u64,
    pub confirmations: u64,
}

impl ConfirmedTx {
    pub fn view(&self) -> TransactionReceiptView {
        TransactionReceiptView::confirmed(
            format!("{:?}", self.receipt.transaction_hash),
            self.block_number,
            self.confirmations,
            self.receipt.gas_used.map(|g| g.to_string()),
        )
    }
}

/// 确认数 = head - block + 1；head 落后于回执区块时为 0
pub fn confirmations_at(head: u64, block: u64) -> u64 {
    if head < block {
        0
    } else {
        head - block + 1
    }
}

pub async fn wait_for_confirmation(
    rpc: &dyn ChainRpc,
    hash: H256,
    policy: &ConfirmationPolicy,
) -> CustodyResult<ConfirmedTx> {
    let started = Instant::now();

    match tokio::time::timeout(policy.timeout, poll_until_confirmed(rpc, hash, policy)).await {
        Ok(Ok(confirmed)) => {
            let elapsed = started.elapsed();
            crate::metrics::inc_tx_outcome("confirmed");
            crate::metrics::observe_confirmation_latency(elapsed.as_millis());
            tracing::info!(
                tx_hash = ?hash,
                block_number = confirmed.block_number,
                confirmations = confirmed.confirmations,
                elapsed_ms = elapsed.as_millis() as u64,
                "transaction_confirmed"
            );
            Ok(confirmed)
        }
        Ok(Err(e)) => {
            crate::metrics::inc_tx_outcome("reverted");
            tracing::warn!(tx_hash = ?hash, error = %e, "transaction_reverted");
            Err(e)
        }
        Err(_) => {
            crate::metrics::inc_tx_outcome("timeout");
            tracing::warn!(
                tx_hash = ?hash,
                timeout_secs = policy.timeout.as_secs(),
                "transaction confirmation timed out"
            );
            Err(CustodyError::ConfirmationTimeout {
                tx_hash: format!("{:?}", hash),
                timeout_secs: policy.timeout.as_secs(),
            })
        }
    }
}

async fn poll_until_confirmed(
    rpc: &dyn ChainRpc,
    hash: H256,
    policy: &ConfirmationPolicy,
) -> CustodyResult<ConfirmedTx> {
    loop {
        match rpc.transaction_receipt(hash).await {
            Ok(Some(receipt)) => {
                if receipt.is_reverted() {
                    return Err(CustodyError::TransactionFailed(format!(
                        "transaction {:?} reverted",
                        hash
                    )));
                }

                if let Some(block) = receipt.block_number {
                    match rpc.block_number().await {
                        Ok(head) => {
                            let confirmations = confirmations_at(head, block);
                            if confirmations >= policy.confirmations {
                                return Ok(ConfirmedTx {
                                    receipt,
                                    block_number: block,
                                    confirmations,
                                });
                            }
                            tracing::debug!(
                                tx_hash = ?hash,
                                confirmations = confirmations,
                                required = policy.confirmations,
                                "waiting for confirmations"
                            );
                        }
                        Err(e) => {
                            tracing::warn!(tx_hash = ?hash, error = %e, "eth_blockNumber failed while polling")
                        }
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(tx_hash = ?hash, error = %e, "eth_getTransactionReceipt failed while polling")
            }
        }

        tokio::time::sleep(policy.poll_interval).await;
    }
}
