//! 托管核心错误分类
//!
//! 所有核心操作（金库、注册表、部署、交易提交）都以 `CustodyError` 返回失败，
//! HTTP 层再统一映射为 `AppError`。核心内任何位置都不做自动重试。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CustodyError {
    /// 金库或注册表写入冲突
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// 持久化记录不存在
    #[error("{0} not found")]
    NotFound(String),

    /// 金库为空（尚未生成钱包）
    #[error("no wallet has been generated")]
    NoCredential,

    /// 密码错误或密文损坏
    #[error("failed to decrypt wallet: {0}")]
    DecryptionFailed(String),

    #[error("contract {0} is already deployed")]
    AlreadyDeployed(String),

    #[error("contract {0} is not deployed")]
    ContractNotDeployed(String),

    /// 提交失败或链上回滚
    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    /// 已提交但在期限内未确认（不等同于被拒绝）
    #[error("transaction {tx_hash} was not confirmed within {timeout_secs}s")]
    ConfirmationTimeout { tx_hash: String, timeout_secs: u64 },

    #[error("compilation failed: {0}")]
    CompilationFailed(String),

    #[error("compiled artifact for {0} not found")]
    ArtifactNotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl CustodyError {
    /// 用于日志与指标的稳定标识
    pub fn kind(&self) -> &'static str {
        match self {
            CustodyError::AlreadyExists(_) => "already_exists",
            CustodyError::NotFound(_) => "not_found",
            CustodyError::NoCredential => "no_credential",
            CustodyError::DecryptionFailed(_) => "decryption_failed",
            CustodyError::AlreadyDeployed(_) => "already_deployed",
            CustodyError::ContractNotDeployed(_) => "contract_not_deployed",
            CustodyError::TransactionFailed(_) => "transaction_failed",
            CustodyError::ConfirmationTimeout { .. } => "confirmation_timeout",
            CustodyError::CompilationFailed(_) => "compilation_failed",
            CustodyError::ArtifactNotFound(_) => "artifact_not_found",
            CustodyError::InvalidInput(_) => "invalid_input",
            CustodyError::Storage(_) => "storage_error",
        }
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        CustodyError::Storage(err.to_string())
    }
}

pub type CustodyResult<T> = Result<T, CustodyError>;
