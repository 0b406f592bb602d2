//! IronMint - 单钥托管的合约部署与交易服务
//!
//! 托管一把加密存储的私钥，按合约名幂等部署，提交并确认代币/NFT 交易

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod error_body;
pub mod infrastructure;
pub mod metrics;
pub mod repository;
pub mod service;
pub mod utils;

// 重新导出常用类型
pub use app_state::AppState;
pub use error::{AppError, AppErrorCode};
