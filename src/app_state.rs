use std::{path::Path, sync::Arc};

use anyhow::Context;

use crate::{
    config::Config,
    infrastructure::{ArtifactCompiler, ChainRpc, JsonFileStore, JsonRpcClient},
    repository::{ContractRegistry, FileContractRegistry, FileWalletStore},
    service::{
        AssetService, ConfirmationPolicy, ContractReader, CredentialVault, DeploymentEngine,
        TransactionSubmitter, TxPipeline,
    },
};

/// 应用状态
/// 所有组件在启动时由 `Config` 显式构造，不依赖全局路径
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub rpc: Arc<dyn ChainRpc>,
    pub vault: Arc<CredentialVault>,
    pub deployments: Arc<DeploymentEngine>,
    pub submitter: Arc<TransactionSubmitter>,
    pub reader: Arc<ContractReader>,
    pub assets: Arc<AssetService>,
}

impl AppState {
    /// 使用 JSON-RPC 节点创建应用状态
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let rpc = JsonRpcClient::new(config.chain.rpc_url.clone(), config.chain.rpc_timeout())
            .context("Failed to create RPC client")?;
        tracing::info!(rpc_url = %rpc.url(), "chain rpc client initialized");
        Ok(Self::with_rpc(config, Arc::new(rpc)))
    }

    /// 使用给定的链访问实现创建应用状态（测试注入内存链）
    pub fn with_rpc(config: Config, rpc: Arc<dyn ChainRpc>) -> Self {
        let data_dir = Path::new(&config.storage.data_dir);

        let wallet_store = Arc::new(FileWalletStore::new(JsonFileStore::new(data_dir)));
        let registry: Arc<dyn ContractRegistry> = Arc::new(FileContractRegistry::new(
            JsonFileStore::new(data_dir.join("contracts")),
        ));

        let vault = Arc::new(CredentialVault::new(wallet_store, config.vault.kdf_iterations));
        let pipeline = Arc::new(TxPipeline::new(
            rpc.clone(),
            config.chain.chain_id,
            config.chain.gas_limit_multiplier_percent,
        ));
        let policy = ConfirmationPolicy::from_config(&config.chain);
        let compiler = Arc::new(ArtifactCompiler::new(
            &config.contracts.artifacts_dir,
            &config.contracts.project_dir,
            config.contracts.compile_command.clone(),
        ));

        let deployments = Arc::new(DeploymentEngine::new(
            vault.clone(),
            registry.clone(),
            compiler,
            pipeline.clone(),
            policy,
        ));
        let submitter = Arc::new(TransactionSubmitter::new(
            vault.clone(),
            registry.clone(),
            pipeline.clone(),
            policy,
            &config.contracts,
        ));
        let reader = Arc::new(ContractReader::new(registry, pipeline, &config.contracts));
        let assets = Arc::new(AssetService::new(&config.storage.assets_dir));

        Self {
            config: Arc::new(config),
            rpc,
            vault,
            deployments,
            submitter,
            reader,
            assets,
        }
    }
}
