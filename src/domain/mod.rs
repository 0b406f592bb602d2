//! Domain 模块
//!
//! 托管核心的领域模型与错误分类

pub mod contract;
pub mod errors;
pub mod receipt;
pub mod wallet;

// 重新导出常用类型
pub use contract::{CompiledArtifact, ContractBinding, ContractRecord, DeploymentPhase};
pub use errors::{CustodyError, CustodyResult};
pub use receipt::TransactionReceiptView;
pub use wallet::{Passphrase, SigningHandle, WalletPublicInfo};
