//! 交易 API：代币转账、NFT 铸造与转移

use std::{future::Future, sync::Arc};

use axum::{extract::State, Json};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    api::{
        middleware::TraceId,
        params::{parse_recipient, Uint256Input},
    },
    app_state::AppState,
    domain::{CustodyResult, Passphrase, TransactionReceiptView},
    error::AppError,
};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferTokensRequest {
    pub recipient_address: String,
    /// 数字或十进制字符串（uint256）
    #[schema(value_type = String, example = "100")]
    pub transfer_amount: Uint256Input,
    #[schema(value_type = String)]
    pub password: Passphrase,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MintAssetRequest {
    pub recipient_address: String,
    #[schema(value_type = String)]
    pub password: Passphrase,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferAssetRequest {
    pub recipient_address: String,
    #[schema(value_type = String, example = "0")]
    pub token_id: Uint256Input,
    #[schema(value_type = String)]
    pub password: Passphrase,
}

/// 在独立任务中执行提交，客户端断开不取消已签名的交易
async fn run_detached<F>(
    endpoint: &'static str,
    trace_id: TraceId,
    fut: F,
) -> Result<Json<TransactionReceiptView>, AppError>
where
    F: Future<Output = CustodyResult<TransactionReceiptView>> + Send + 'static,
{
    let joined = tokio::spawn(fut).await.map_err(|e| {
        crate::metrics::count_err(endpoint);
        AppError::internal(format!("submission task failed: {}", e)).with_trace_id(trace_id.0.clone())
    })?;

    match joined {
        Ok(view) => {
            crate::metrics::count_ok(endpoint);
            Ok(Json(view))
        }
        Err(e) => {
            crate::metrics::count_err(endpoint);
            Err(AppError::from(e).with_trace_id(trace_id.0))
        }
    }
}

/// POST /transfer-tokens
#[utoipa::path(
    post,
    path = "/transfer-tokens",
    request_body = TransferTokensRequest,
    responses(
        (status = 200, description = "Transfer confirmed", body = TransactionReceiptView),
        (status = 400, description = "Invalid recipient or amount", body = crate::error_body::ErrorBodyDoc),
        (status = 404, description = "Token contract not deployed", body = crate::error_body::ErrorBodyDoc),
        (status = 500, description = "Transaction failed", body = crate::error_body::ErrorBodyDoc),
        (status = 504, description = "Confirmation timeout", body = crate::error_body::ErrorBodyDoc)
    )
)]
pub async fn transfer_tokens(
    State(state): State<Arc<AppState>>,
    trace_id: TraceId,
    Json(req): Json<TransferTokensRequest>,
) -> Result<Json<TransactionReceiptView>, AppError> {
    const ENDPOINT: &str = "POST /transfer-tokens";

    let parsed = parse_recipient(&req.recipient_address, "recipientAddress")
        .and_then(|to| Ok((to, req.transfer_amount.to_u256("transferAmount")?)));
    let (recipient, amount) = match parsed {
        Ok(v) => v,
        Err(e) => {
            crate::metrics::count_err(ENDPOINT);
            return Err(AppError::from(e).with_trace_id(trace_id.0));
        }
    };

    let submitter = state.submitter.clone();
    let password = req.password;
    run_detached(ENDPOINT, trace_id, async move {
        submitter.transfer(recipient, amount, &password).await
    })
    .await
}

/// POST /mint-asset
#[utoipa::path(
    post,
    path = "/mint-asset",
    request_body = MintAssetRequest,
    responses(
        (status = 200, description = "Mint confirmed", body = TransactionReceiptView),
        (status = 400, description = "Invalid recipient", body = crate::error_body::ErrorBodyDoc),
        (status = 404, description = "NFT contract not deployed", body = crate::error_body::ErrorBodyDoc),
        (status = 500, description = "Transaction failed", body = crate::error_body::ErrorBodyDoc),
        (status = 504, description = "Confirmation timeout", body = crate::error_body::ErrorBodyDoc)
    )
)]
pub async fn mint_asset(
    State(state): State<Arc<AppState>>,
    trace_id: TraceId,
    Json(req): Json<MintAssetRequest>,
) -> Result<Json<TransactionReceiptView>, AppError> {
    const ENDPOINT: &str = "POST /mint-asset";

    let recipient = match parse_recipient(&req.recipient_address, "recipientAddress") {
        Ok(v) => v,
        Err(e) => {
            crate::metrics::count_err(ENDPOINT);
            return Err(AppError::from(e).with_trace_id(trace_id.0));
        }
    };

    let submitter = state.submitter.clone();
    let password = req.password;
    run_detached(ENDPOINT, trace_id, async move {
        submitter.mint(recipient, &password).await
    })
    .await
}

/// POST /transfer-asset
///
/// 发送方固定为托管钱包地址
#[utoipa::path(
    post,
    path = "/transfer-asset",
    request_body = TransferAssetRequest,
    responses(
        (status = 200, description = "Transfer confirmed", body = TransactionReceiptView),
        (status = 400, description = "Invalid recipient or token id", body = crate::error_body::ErrorBodyDoc),
        (status = 404, description = "NFT contract not deployed", body = crate::error_body::ErrorBodyDoc),
        (status = 500, description = "Transaction failed", body = crate::error_body::ErrorBodyDoc),
        (status = 504, description = "Confirmation timeout", body = crate::error_body::ErrorBodyDoc)
    )
)]
pub async fn transfer_asset(
    State(state): State<Arc<AppState>>,
    trace_id: TraceId,
    Json(req): Json<TransferAssetRequest>,
) -> Result<Json<TransactionReceiptView>, AppError> {
    const ENDPOINT: &str = "POST /transfer-asset";

    let parsed = parse_recipient(&req.recipient_address, "recipientAddress")
        .and_then(|to| Ok((to, req.token_id.to_u256("tokenId")?)));
    let (recipient, token_id) = match parsed {
        Ok(v) => v,
        Err(e) => {
            crate::metrics::count_err(ENDPOINT);
            return Err(AppError::from(e).with_trace_id(trace_id.0));
        }
    };

    let submitter = state.submitter.clone();
    let password = req.password;
    run_detached(ENDPOINT, trace_id, async move {
        submitter.transfer_asset(recipient, token_id, &password).await
    })
    .await
}
