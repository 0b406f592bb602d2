use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct Healthz {
    pub status: String,
    pub wallet_present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpc_block_number: Option<u64>,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/healthz",
    responses((status = 200, description = "OK", body = Healthz))
)]
pub async fn healthz(State(st): State<Arc<AppState>>) -> Json<Healthz> {
    let wallet_present = st.vault.get_public_info().await.is_ok();
    // 上游 RPC 轻探活，失败不致命
    let rpc_block_number = st.rpc.block_number().await.ok();
    let status = if rpc_block_number.is_some() {
        "ok"
    } else {
        "degraded"
    };

    crate::metrics::count_ok("GET /healthz");
    Json(Healthz {
        status: status.into(),
        wallet_present,
        rpc_block_number,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn metrics() -> impl IntoResponse {
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4",
        )],
        crate::metrics::render_prometheus(),
    )
}
