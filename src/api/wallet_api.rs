//! 钱包 API：生成与查询托管钱包

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    api::middleware::TraceId,
    app_state::AppState,
    domain::{Passphrase, WalletPublicInfo},
    error::AppError,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateWalletRequest {
    /// 钱包口令，只用于加密私钥，不落盘
    #[schema(value_type = String)]
    pub password: Passphrase,
}

/// POST /generate-wallet
///
/// 生成唯一的托管钱包；已存在时返回 409
#[utoipa::path(
    post,
    path = "/generate-wallet",
    request_body = GenerateWalletRequest,
    responses(
        (status = 200, description = "Wallet generated", body = WalletPublicInfo),
        (status = 400, description = "Empty password", body = crate::error_body::ErrorBodyDoc),
        (status = 409, description = "Wallet already exists", body = crate::error_body::ErrorBodyDoc)
    )
)]
pub async fn generate_wallet(
    State(state): State<Arc<AppState>>,
    trace_id: TraceId,
    Json(req): Json<GenerateWalletRequest>,
) -> Result<Json<WalletPublicInfo>, AppError> {
    match state.vault.generate(&req.password).await {
        Ok(info) => {
            crate::metrics::count_ok("POST /generate-wallet");
            Ok(Json(info))
        }
        Err(e) => {
            crate::metrics::count_err("POST /generate-wallet");
            Err(AppError::from(e).with_trace_id(trace_id.0))
        }
    }
}

/// GET /get-wallet-info
#[utoipa::path(
    get,
    path = "/get-wallet-info",
    responses(
        (status = 200, description = "Wallet public info", body = WalletPublicInfo),
        (status = 404, description = "Wallet not found", body = crate::error_body::ErrorBodyDoc)
    )
)]
pub async fn get_wallet_info(
    State(state): State<Arc<AppState>>,
    trace_id: TraceId,
) -> Result<Json<WalletPublicInfo>, AppError> {
    let info = state
        .vault
        .get_public_info()
        .await
        .map_err(|e| {
            crate::metrics::count_err("GET /get-wallet-info");
            AppError::from(e).with_trace_id(trace_id.0)
        })?;

    crate::metrics::count_ok("GET /get-wallet-info");
    Ok(Json(info))
}
