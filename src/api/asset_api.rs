//! 资产 API：只读合约查询、NFT 元数据与图片

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use utoipa::IntoParams;

use crate::{
    api::{
        middleware::TraceId,
        params::{parse_recipient, Uint256Input},
    },
    app_state::AppState,
    error::AppError,
    service::{AssetOwner, TokenBalance},
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct TokenBalanceQuery {
    /// 持有人地址；缺省为代币合约 owner()
    pub address: Option<String>,
}

/// GET /token-balance
#[utoipa::path(
    get,
    path = "/token-balance",
    params(TokenBalanceQuery),
    responses(
        (status = 200, description = "Token balance", body = TokenBalance),
        (status = 400, description = "Invalid address", body = crate::error_body::ErrorBodyDoc),
        (status = 404, description = "Token contract not deployed", body = crate::error_body::ErrorBodyDoc)
    )
)]
pub async fn token_balance(
    State(state): State<Arc<AppState>>,
    trace_id: TraceId,
    Query(query): Query<TokenBalanceQuery>,
) -> Result<Json<TokenBalance>, AppError> {
    let result = async {
        let holder = match query.address.as_deref().filter(|a| !a.trim().is_empty()) {
            Some(raw) => Some(parse_recipient(raw, "address")?),
            None => None,
        };
        state.reader.token_balance(holder).await
    }
    .await;

    match result {
        Ok(balance) => {
            crate::metrics::count_ok("GET /token-balance");
            Ok(Json(balance))
        }
        Err(e) => {
            crate::metrics::count_err("GET /token-balance");
            Err(AppError::from(e).with_trace_id(trace_id.0))
        }
    }
}

/// GET /asset-owner/:tokenId
#[utoipa::path(
    get,
    path = "/asset-owner/{tokenId}",
    params(("tokenId" = String, Path, description = "NFT token id (decimal)")),
    responses(
        (status = 200, description = "Current owner", body = AssetOwner),
        (status = 400, description = "Invalid token id", body = crate::error_body::ErrorBodyDoc),
        (status = 404, description = "NFT contract not deployed", body = crate::error_body::ErrorBodyDoc)
    )
)]
pub async fn asset_owner(
    State(state): State<Arc<AppState>>,
    trace_id: TraceId,
    Path(token_id): Path<String>,
) -> Result<Json<AssetOwner>, AppError> {
    let result = async {
        let token_id = Uint256Input::Text(token_id).to_u256("tokenId")?;
        state.reader.asset_owner(token_id).await
    }
    .await;

    match result {
        Ok(owner) => {
            crate::metrics::count_ok("GET /asset-owner/:tokenId");
            Ok(Json(owner))
        }
        Err(e) => {
            crate::metrics::count_err("GET /asset-owner/:tokenId");
            Err(AppError::from(e).with_trace_id(trace_id.0))
        }
    }
}

/// GET /assets/:tokenId
#[utoipa::path(
    get,
    path = "/assets/{tokenId}",
    params(("tokenId" = String, Path, description = "NFT token id (decimal)")),
    responses(
        (status = 200, description = "Token metadata JSON", body = Object),
        (status = 404, description = "Asset not found", body = crate::error_body::ErrorBodyDoc)
    )
)]
pub async fn asset_metadata(
    State(state): State<Arc<AppState>>,
    trace_id: TraceId,
    Path(token_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let metadata = state
        .assets
        .metadata(&token_id)
        .await
        .map_err(|e| {
            crate::metrics::count_err("GET /assets/:tokenId");
            AppError::from(e).with_trace_id(trace_id.0)
        })?;

    crate::metrics::count_ok("GET /assets/:tokenId");
    Ok(Json(metadata))
}

/// GET /assets/:tokenId/image
#[utoipa::path(
    get,
    path = "/assets/{tokenId}/image",
    params(("tokenId" = String, Path, description = "NFT token id (decimal)")),
    responses(
        (status = 200, description = "PNG image", content_type = "image/png", body = Vec<u8>),
        (status = 404, description = "Image not found", body = crate::error_body::ErrorBodyDoc)
    )
)]
pub async fn asset_image(
    State(state): State<Arc<AppState>>,
    trace_id: TraceId,
    Path(token_id): Path<String>,
) -> Result<Response, AppError> {
    let bytes = state
        .assets
        .image(&token_id)
        .await
        .map_err(|e| {
            crate::metrics::count_err("GET /assets/:tokenId/image");
            AppError::from(e).with_trace_id(trace_id.0)
        })?;

    crate::metrics::count_ok("GET /assets/:tokenId/image");
    Ok(([(CONTENT_TYPE, "image/png")], bytes).into_response())
}
