//! 测试辅助模块
//! 在临时目录上构建完整的 AppState，链访问替换为内存链

#![allow(dead_code)]

pub mod mock_chain;

use std::{path::PathBuf, sync::Arc};

use ironmint::{app_state::AppState, config::Config, domain::Passphrase};
use tempfile::TempDir;

pub use mock_chain::{MockChain, CHAIN_ID};

pub const PASSWORD: &str = "p@ss";

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

pub fn passphrase() -> Passphrase {
    Passphrase::new(PASSWORD)
}

/// 测试配置：低 KDF 迭代、快速轮询、短超时
pub fn test_config(root: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.data_dir = root.path().join("data").to_string_lossy().into_owned();
    config.storage.assets_dir = fixtures_dir().join("assets").to_string_lossy().into_owned();
    config.chain.rpc_url = "http://127.0.0.1:8545".into();
    config.chain.chain_id = None;
    config.chain.confirmation_timeout_secs = 2;
    config.chain.confirmation_poll_ms = 10;
    config.chain.confirmations = 1;
    config.chain.gas_limit_multiplier_percent = 120;
    config.vault.kdf_iterations = 1_000;
    config.contracts.fungible_token_contract = "MyToken".into();
    config.contracts.non_fungible_token_contract = "MyNFT".into();
    config.contracts.artifacts_dir = fixtures_dir().join("artifacts").to_string_lossy().into_owned();
    config.contracts.compile_command = None;
    config.contracts.project_dir = root.path().to_string_lossy().into_owned();
    config.server.cors_allow_origins = vec!["http://localhost:8080".into()];
    config
}

pub struct TestHarness {
    pub root: TempDir,
    pub chain: Arc<MockChain>,
    pub state: Arc<AppState>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_chain(MockChain::new())
    }

    pub fn with_chain(chain: MockChain) -> Self {
        Self::with_chain_and_config(chain, |_| {})
    }

    pub fn with_chain_and_config(chain: MockChain, tweak: impl FnOnce(&mut Config)) -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let mut config = test_config(&root);
        tweak(&mut config);

        let chain = Arc::new(chain);
        let state = Arc::new(AppState::with_rpc(config, chain.clone()));
        Self { root, chain, state }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.path().join("data")
    }
}
