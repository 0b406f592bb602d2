pub mod asset_service;
pub mod confirmation;
pub mod contract_reader;
pub mod credential_vault;
pub mod deployment_engine;
pub mod transaction_submitter;
pub mod tx_pipeline;

pub use asset_service::AssetService;
pub use confirmation::{wait_for_confirmation, ConfirmationPolicy};
pub use contract_reader::{AssetOwner, ContractReader, TokenBalance};
pub use credential_vault::CredentialVault;
pub use deployment_engine::DeploymentEngine;
pub use transaction_submitter::TransactionSubmitter;
pub use tx_pipeline::TxPipeline;
