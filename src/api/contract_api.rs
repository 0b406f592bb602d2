//! 合约 API：部署、查询、列表

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::{
    api::middleware::TraceId,
    app_state::AppState,
    domain::{ContractRecord, Passphrase},
    error::AppError,
};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeployContractRequest {
    pub contract_name: String,
    /// 构造参数；单个值视为只有一个参数
    #[serde(default, deserialize_with = "deserialize_constructor_args")]
    #[schema(value_type = Vec<Object>)]
    pub constructor_args: Vec<Value>,
    #[schema(value_type = String)]
    pub password: Passphrase,
}

fn deserialize_constructor_args<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(single) => vec![single],
    })
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContractInfoRequest {
    pub contract_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ContractListResponse {
    pub contracts: Vec<String>,
}

/// POST /deploy-contract
///
/// 编译（如已配置）→ 解锁 → 提交部署交易 → 等待确认 → 写入注册表。
/// 提交在独立任务中执行，客户端断开不会中止已发出的交易。
#[utoipa::path(
    post,
    path = "/deploy-contract",
    request_body = DeployContractRequest,
    responses(
        (status = 200, description = "Contract deployed", body = ContractRecord),
        (status = 401, description = "Wrong password", body = crate::error_body::ErrorBodyDoc),
        (status = 404, description = "Wallet or artifact not found", body = crate::error_body::ErrorBodyDoc),
        (status = 409, description = "Already deployed", body = crate::error_body::ErrorBodyDoc),
        (status = 504, description = "Confirmation timeout", body = crate::error_body::ErrorBodyDoc)
    )
)]
pub async fn deploy_contract(
    State(state): State<Arc<AppState>>,
    trace_id: TraceId,
    Json(req): Json<DeployContractRequest>,
) -> Result<Json<ContractRecord>, AppError> {
    let engine = state.deployments.clone();
    let DeployContractRequest {
        contract_name,
        constructor_args,
        password,
    } = req;

    let result = tokio::spawn(async move {
        engine
            .deploy(&contract_name, &constructor_args, &password)
            .await
    })
    .await
    .map_err(|e| {
        AppError::internal(format!("deployment task failed: {}", e)).with_trace_id(trace_id.0.clone())
    })?;

    match result {
        Ok(record) => {
            crate::metrics::count_ok("POST /deploy-contract");
            Ok(Json(record))
        }
        Err(e) => {
            crate::metrics::count_err("POST /deploy-contract");
            Err(AppError::from(e).with_trace_id(trace_id.0))
        }
    }
}

/// POST /get-contract-info
#[utoipa::path(
    post,
    path = "/get-contract-info",
    request_body = ContractInfoRequest,
    responses(
        (status = 200, description = "Contract record", body = ContractRecord),
        (status = 404, description = "Contract not found", body = crate::error_body::ErrorBodyDoc)
    )
)]
pub async fn get_contract_info(
    State(state): State<Arc<AppState>>,
    trace_id: TraceId,
    Json(req): Json<ContractInfoRequest>,
) -> Result<Json<ContractRecord>, AppError> {
    let record = state
        .deployments
        .get_contract_info(req.contract_name.trim())
        .await
        .map_err(|e| {
            crate::metrics::count_err("POST /get-contract-info");
            AppError::from(e).with_trace_id(trace_id.0)
        })?;

    crate::metrics::count_ok("POST /get-contract-info");
    Ok(Json(record))
}

/// GET /contracts
#[utoipa::path(
    get,
    path = "/contracts",
    responses((status = 200, description = "Deployed contract names", body = ContractListResponse))
)]
pub async fn list_contracts(
    State(state): State<Arc<AppState>>,
    trace_id: TraceId,
) -> Result<Json<ContractListResponse>, AppError> {
    let contracts = state
        .deployments
        .list_contracts()
        .await
        .map_err(|e| {
            crate::metrics::count_err("GET /contracts");
            AppError::from(e).with_trace_id(trace_id.0)
        })?
        .into_iter()
        .map(|record| record.contract_name)
        .collect();

    crate::metrics::count_ok("GET /contracts");
    Ok(Json(ContractListResponse { contracts }))
}
