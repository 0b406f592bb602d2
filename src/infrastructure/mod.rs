pub mod chain_rpc;
pub mod compiler;
pub mod file_store;
pub mod keystore;
pub mod log_redact;
pub mod logging;
pub mod rpc_validator;

pub use chain_rpc::{ChainReceipt, ChainRpc, JsonRpcClient};
pub use compiler::ArtifactCompiler;
pub use file_store::{CreateOutcome, JsonFileStore};
