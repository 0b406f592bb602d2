// Repository 抽象层
pub mod contract_registry;
pub mod wallet_store;

pub use contract_registry::{validate_contract_name, ContractRegistry, FileContractRegistry};
pub use wallet_store::{FileWalletStore, WalletRecord, WalletStore};
