use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::domain::CustodyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppErrorCode {
    // HTTP 基础错误码
    BadRequest,
    NotFound,
    Internal,

    // 业务错误码
    WalletAlreadyExists,
    WalletNotFound,
    DecryptionFailed,
    AlreadyDeployed,
    ContractNotDeployed,
    ArtifactNotFound,
    CompilationFailed,
    TransactionFailed,
    ConfirmationTimeout,
    InvalidParameter,
    StorageError,
}

impl AppErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppErrorCode::BadRequest => "bad_request",
            AppErrorCode::NotFound => "not_found",
            AppErrorCode::Internal => "internal",

            AppErrorCode::WalletAlreadyExists => "wallet_already_exists",
            AppErrorCode::WalletNotFound => "wallet_not_found",
            AppErrorCode::DecryptionFailed => "decryption_failed",
            AppErrorCode::AlreadyDeployed => "already_deployed",
            AppErrorCode::ContractNotDeployed => "contract_not_deployed",
            AppErrorCode::ArtifactNotFound => "artifact_not_found",
            AppErrorCode::CompilationFailed => "compilation_failed",
            AppErrorCode::TransactionFailed => "transaction_failed",
            AppErrorCode::ConfirmationTimeout => "confirmation_timeout",
            AppErrorCode::InvalidParameter => "invalid_parameter",
            AppErrorCode::StorageError => "storage_error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub code: AppErrorCode,
    pub message: String,
    pub status: StatusCode,
    pub trace_id: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
    trace_id: Option<&'a str>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code.as_str(),
            message: &self.message,
            trace_id: self.trace_id.as_deref(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    pub fn new(code: AppErrorCode, status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            status,
            trace_id: None,
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::BadRequest, StatusCode::BAD_REQUEST, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::NotFound, StatusCode::NOT_FOUND, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::Internal, StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::InvalidParameter, StatusCode::BAD_REQUEST, msg)
    }

    /// 设置追踪ID
    pub fn with_trace_id(mut self, trace_id: String) -> Self {
        self.trace_id = Some(trace_id);
        self
    }
}

// 领域错误 → HTTP
impl From<CustodyError> for AppError {
    fn from(err: CustodyError) -> Self {
        let (code, status) = match &err {
            CustodyError::AlreadyExists(_) => {
                (AppErrorCode::WalletAlreadyExists, StatusCode::CONFLICT)
            }
            CustodyError::NotFound(_) => (AppErrorCode::NotFound, StatusCode::NOT_FOUND),
            CustodyError::NoCredential => (AppErrorCode::WalletNotFound, StatusCode::NOT_FOUND),
            CustodyError::DecryptionFailed(_) => {
                (AppErrorCode::DecryptionFailed, StatusCode::UNAUTHORIZED)
            }
            CustodyError::AlreadyDeployed(_) => {
                (AppErrorCode::AlreadyDeployed, StatusCode::CONFLICT)
            }
            CustodyError::ContractNotDeployed(_) => {
                (AppErrorCode::ContractNotDeployed, StatusCode::NOT_FOUND)
            }
            CustodyError::ArtifactNotFound(_) => {
                (AppErrorCode::ArtifactNotFound, StatusCode::NOT_FOUND)
            }
            CustodyError::InvalidInput(_) => {
                (AppErrorCode::InvalidParameter, StatusCode::BAD_REQUEST)
            }
            CustodyError::ConfirmationTimeout { .. } => {
                (AppErrorCode::ConfirmationTimeout, StatusCode::GATEWAY_TIMEOUT)
            }
            CustodyError::TransactionFailed(_) => {
                (AppErrorCode::TransactionFailed, StatusCode::INTERNAL_SERVER_ERROR)
            }
            CustodyError::CompilationFailed(_) => {
                (AppErrorCode::CompilationFailed, StatusCode::INTERNAL_SERVER_ERROR)
            }
            CustodyError::Storage(_) => {
                (AppErrorCode::StorageError, StatusCode::INTERNAL_SERVER_ERROR)
            }
        };

        if status.is_server_error() {
            tracing::error!(error_kind = err.kind(), error = %err, "request failed");
        }

        Self::new(code, status, err.to_string())
    }
}

// 从 serde_json 错误转换
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::bad_request(format!("JSON serialization error: {}", err))
    }
}

// 从 anyhow 错误转换
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(format!("{}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custody_error_status_mapping() {
        let cases = [
            (CustodyError::AlreadyExists("wallet".into()), StatusCode::CONFLICT),
            (CustodyError::AlreadyDeployed("MyToken".into()), StatusCode::CONFLICT),
            (CustodyError::NoCredential, StatusCode::NOT_FOUND),
            (CustodyError::NotFound("contract".into()), StatusCode::NOT_FOUND),
            (CustodyError::ContractNotDeployed("MyNFT".into()), StatusCode::NOT_FOUND),
            (CustodyError::DecryptionFailed("bad".into()), StatusCode::UNAUTHORIZED),
            (CustodyError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (
                CustodyError::ConfirmationTimeout {
                    tx_hash: "0x1".into(),
                    timeout_secs: 1,
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (CustodyError::TransactionFailed("reverted".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).status, status);
        }
    }

    #[test]
    fn test_error_body_code() {
        let err = AppError::from(CustodyError::ContractNotDeployed("MyToken".into()));
        assert_eq!(err.code.as_str(), "contract_not_deployed");
        assert!(err.message.contains("MyToken"));
    }
}
