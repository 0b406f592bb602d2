//! 交易确认结果

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 已确认交易的对外视图
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceiptView {
    pub transaction_hash: String,
    /// 交易所在区块
    pub block_number: u64,
    /// 确认时观察到的确认数（head - block + 1）
    pub confirmations: u64,
    /// 固定为 "confirmed"；回滚与超时以错误返回
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<String>,
}

impl TransactionReceiptView {
    pub fn confirmed(
        transaction_hash: String,
        block_number: u64,
        confirmations: u64,
        gas_used: Option<String>,
    ) -> Self {
        Self {
            transaction_hash,
            block_number,
            confirmations,
            status: "confirmed".to_string(),
            gas_used,
        }
    }
}
