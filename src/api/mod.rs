use std::{sync::Arc, time::Instant};

use axum::{
    extract::{Request, State},
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
            ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE,
            CACHE_CONTROL, CONTENT_SECURITY_POLICY, PRAGMA, REFERRER_POLICY, VARY,
            X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
        },
        HeaderMap, HeaderValue, Method, StatusCode,
    },
    middleware::{from_fn, from_fn_with_state, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};
use tracing::Level;
use utoipa::OpenApi;
use uuid::Uuid;

use crate::app_state::AppState;

pub mod asset_api;
pub mod contract_api;
pub mod handlers;
pub mod middleware;
pub mod params;
pub mod transaction_api;
pub mod wallet_api;

use middleware::trace_id_middleware;

#[derive(OpenApi)]
#[openapi(
    paths(
        wallet_api::generate_wallet,
        wallet_api::get_wallet_info,
        contract_api::deploy_contract,
        contract_api::get_contract_info,
        contract_api::list_contracts,
        transaction_api::transfer_tokens,
        transaction_api::mint_asset,
        transaction_api::transfer_asset,
        asset_api::token_balance,
        asset_api::asset_owner,
        asset_api::asset_metadata,
        asset_api::asset_image,
        handlers::healthz,
    ),
    components(
        schemas(
            wallet_api::GenerateWalletRequest,
            contract_api::DeployContractRequest,
            contract_api::ContractInfoRequest,
            contract_api::ContractListResponse,
            transaction_api::TransferTokensRequest,
            transaction_api::MintAssetRequest,
            transaction_api::TransferAssetRequest,
            crate::domain::WalletPublicInfo,
            crate::domain::ContractRecord,
            crate::domain::TransactionReceiptView,
            crate::service::TokenBalance,
            crate::service::AssetOwner,
            handlers::Healthz,
            crate::error_body::ErrorBodyDoc
        )
    ),
    tags(
        (name = "IronMint API", description = "Auto-generated OpenAPI via utoipa")
    )
)]
struct ApiDoc;

const DEFAULT_ALLOW_HEADERS: &str = "Content-Type, X-Request-Id, X-Trace-Id";

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        // 钱包
        .route("/generate-wallet", post(wallet_api::generate_wallet))
        .route("/get-wallet-info", get(wallet_api::get_wallet_info))
        // 合约
        .route("/deploy-contract", post(contract_api::deploy_contract))
        .route("/get-contract-info", post(contract_api::get_contract_info))
        .route("/contracts", get(contract_api::list_contracts))
        // 交易
        .route("/transfer-tokens", post(transaction_api::transfer_tokens))
        .route("/mint-asset", post(transaction_api::mint_asset))
        .route("/transfer-asset", post(transaction_api::transfer_asset))
        // 只读查询与资产
        .route("/token-balance", get(asset_api::token_balance))
        .route("/asset-owner/:token_id", get(asset_api::asset_owner))
        .route("/assets/:token_id", get(asset_api::asset_metadata))
        .route("/assets/:token_id/image", get(asset_api::asset_image))
        // 观测
        .route("/healthz", get(handlers::healthz))
        .route("/metrics", get(handlers::metrics))
        .merge(utoipa_swagger_ui::SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::new().level(Level::DEBUG)))
                .layer(from_fn(set_request_id))
                .layer(from_fn(trace_id_middleware))
                .layer(from_fn(add_security_headers))
                .layer(from_fn_with_state(state.clone(), add_cors_headers))
                .layer(from_fn(add_response_time_header))
                .layer(from_fn(trace_log)),
        )
        .with_state(state)
}

/// 按配置的白名单回显 Origin；`*` 表示放行全部
fn resolve_allowed_origin(allow_origins: &[String], origin: Option<&str>) -> Option<String> {
    if allow_origins.iter().any(|o| o.trim() == "*") {
        return Some("*".to_string());
    }
    match origin {
        Some(origin) if allow_origins.iter().any(|o| o.trim() == origin) => Some(origin.to_string()),
        Some(_) => None,
        None => allow_origins.first().map(|o| o.trim().to_string()),
    }
}

fn apply_cors_headers(headers: &mut HeaderMap, allowed_origin: Option<&str>, requested_headers: Option<&str>) {
    let Some(allowed_origin) = allowed_origin else {
        return;
    };
    if let Ok(val) = HeaderValue::from_str(allowed_origin) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, val);
    }
    headers.insert(VARY, HeaderValue::from_static("Origin"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    let allow_headers = requested_headers
        .and_then(|h| HeaderValue::from_str(h).ok())
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_ALLOW_HEADERS));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, allow_headers);
    headers.insert(
        ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("false"),
    );
}

async fn add_cors_headers(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let origin = req
        .headers()
        .get("origin")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let requested_headers = req
        .headers()
        .get("access-control-request-headers")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let allowed_origin =
        resolve_allowed_origin(&state.config.server.cors_allow_origins, origin.as_deref());
    if allowed_origin.is_none() {
        tracing::debug!(origin = ?origin, path = %req.uri().path(), "cors origin not allowed");
    }

    // 浏览器预检直接应答
    if req.method() == Method::OPTIONS {
        let mut resp = StatusCode::NO_CONTENT.into_response();
        apply_cors_headers(resp.headers_mut(), allowed_origin.as_deref(), requested_headers.as_deref());
        resp.headers_mut()
            .insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("600"));
        return resp;
    }

    let mut resp = next.run(req).await;
    apply_cors_headers(resp.headers_mut(), allowed_origin.as_deref(), requested_headers.as_deref());
    resp
}

async fn add_security_headers(req: Request, next: Next) -> Response {
    let is_docs = req.uri().path().starts_with("/docs");
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();

    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    // Swagger UI 需要内联脚本与样式
    if !is_docs {
        headers.insert(
            CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("default-src 'self'"),
        );
    }
    resp
}

async fn set_request_id(mut req: Request, next: Next) -> Response {
    let req_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let header = HeaderValue::from_str(&req_id).unwrap_or(HeaderValue::from_static("gen-failed"));
    req.headers_mut().insert("x-request-id", header.clone());

    let mut resp = next.run(req).await;
    resp.headers_mut().insert("x-request-id", header);
    resp
}

async fn add_response_time_header(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let mut resp = next.run(req).await;
    let elapsed_ms = start.elapsed().as_millis();
    resp.headers_mut().insert(
        "x-response-time",
        HeaderValue::from_str(&format!("{}ms", elapsed_ms))
            .unwrap_or(HeaderValue::from_static("0ms")),
    );
    resp
}

async fn trace_log(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();
    let req_id = req
        .headers()
        .get("x-request-id")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let resp = next.run(req).await;
    let status = resp.status();
    let elapsed = start.elapsed().as_millis();
    tracing::event!(Level::INFO, request_id=%req_id, method=%method, path=%path, status=%status.as_u16(), elapsed_ms=%elapsed, "http_request");
    resp
}
