//! 部署引擎集成测试

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::{passphrase, MockChain, TestHarness};
use ironmint::{
    domain::{ContractRecord, CustodyResult, Passphrase},
    infrastructure::{ArtifactCompiler, JsonFileStore},
    repository::{ContractRegistry, FileContractRegistry},
    service::{ConfirmationPolicy, DeploymentEngine},
};
use serde_json::json;

#[tokio::test]
async fn test_deploy_records_contract() {
    let h = TestHarness::new();
    h.state.vault.generate(&passphrase()).await.unwrap();

    let record = h
        .state
        .deployments
        .deploy("MyToken", &[json!(1_000_000)], &passphrase())
        .await
        .unwrap();

    assert_eq!(record.contract_name, "MyToken");
    assert!(record.contract_address.starts_with("0x"));
    assert_eq!(record.transaction_hash.len(), 66);
    assert!(record.abi.contains("balanceOf"));

    let address = record.address().unwrap();
    assert!(h.chain.is_contract(address));

    let stored = h.state.deployments.get_contract_info("MyToken").await.unwrap();
    assert_eq!(stored.contract_address, record.contract_address);
    assert_eq!(stored.transaction_hash, record.transaction_hash);

    // 初始供应量记到部署者
    let deployer = h.state.vault.unlock(&passphrase()).await.unwrap().address();
    assert_eq!(h.chain.balance_of(address, deployer), 1_000_000u64.into());
}

#[tokio::test]
async fn test_deploy_twice_is_rejected() {
    let h = TestHarness::new();
    h.state.vault.generate(&passphrase()).await.unwrap();

    let first = h
        .state
        .deployments
        .deploy("MyNFT", &[], &passphrase())
        .await
        .unwrap();
    let calls_before = h.chain.call_count();

    let err = h
        .state
        .deployments
        .deploy("MyNFT", &[], &passphrase())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "already_deployed");
    assert_eq!(h.chain.call_count(), calls_before);

    let all = h.state.deployments.list_contracts().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].contract_address, first.contract_address);
}

#[tokio::test]
async fn test_deploy_without_wallet() {
    let h = TestHarness::new();

    let err = h
        .state
        .deployments
        .deploy("MyNFT", &[], &passphrase())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "no_credential");
    assert!(h.state.deployments.list_contracts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deploy_wrong_password_leaves_no_record() {
    let h = TestHarness::new();
    h.state.vault.generate(&passphrase()).await.unwrap();

    let err = h
        .state
        .deployments
        .deploy("MyNFT", &[], &Passphrase::new("nope"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "decryption_failed");
    assert_eq!(
        h.state.deployments.get_contract_info("MyNFT").await.unwrap_err().kind(),
        "not_found"
    );
}

#[tokio::test]
async fn test_deploy_argument_errors() {
    let h = TestHarness::new();
    h.state.vault.generate(&passphrase()).await.unwrap();

    let err = h
        .state
        .deployments
        .deploy("MyToken", &[], &passphrase())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_input");

    let err = h
        .state
        .deployments
        .deploy("Missing", &[], &passphrase())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "artifact_not_found");

    let err = h
        .state
        .deployments
        .deploy("../etc/passwd", &[], &passphrase())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_input");

    assert_eq!(h.chain.pending_count(), 0);
}

#[tokio::test]
async fn test_reverted_deployment_is_not_recorded() {
    let h = TestHarness::new();
    h.state.vault.generate(&passphrase()).await.unwrap();
    h.chain.revert_next();

    let err = h
        .state
        .deployments
        .deploy("MyNFT", &[], &passphrase())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "transaction_failed");
    assert!(h.state.deployments.list_contracts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_confirmation_timeout_is_distinct() {
    let h = TestHarness::with_chain_and_config(MockChain::manual(), |config| {
        config.chain.confirmation_timeout_secs = 1;
    });
    h.state.vault.generate(&passphrase()).await.unwrap();

    let err = h
        .state
        .deployments
        .deploy("MyNFT", &[], &passphrase())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "confirmation_timeout");
    assert_eq!(h.chain.pending_count(), 1);
    assert!(h.state.deployments.list_contracts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deploy_waits_for_mining() {
    let h = TestHarness::with_chain(MockChain::manual());
    h.state.vault.generate(&passphrase()).await.unwrap();

    let engine = h.state.deployments.clone();
    let task = tokio::spawn(async move { engine.deploy("MyNFT", &[], &passphrase()).await });

    // 等待交易进入 pending
    for _ in 0..200 {
        if h.chain.pending_count() > 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    assert_eq!(h.chain.pending_count(), 1);
    assert!(h.state.deployments.list_contracts().await.unwrap().is_empty());

    h.chain.mine();
    let record = task.await.unwrap().unwrap();
    assert_eq!(
        h.state.deployments.get_contract_info("MyNFT").await.unwrap(),
        record
    );
}

#[tokio::test]
async fn test_concurrent_deploys_store_one_record() {
    let h = TestHarness::new();
    h.state.vault.generate(&passphrase()).await.unwrap();

    let a = h.state.deployments.clone();
    let b = h.state.deployments.clone();
    let (ra, rb) = tokio::join!(
        tokio::spawn(async move { a.deploy("MyNFT", &[], &passphrase()).await }),
        tokio::spawn(async move { b.deploy("MyNFT", &[], &passphrase()).await }),
    );
    let results = [ra.unwrap(), rb.unwrap()];

    let winners: Vec<&ContractRecord> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(
            matches!(err.kind(), "already_deployed" | "transaction_failed"),
            "unexpected error {}",
            err
        );
    }

    let all = h.state.deployments.list_contracts().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].contract_address, winners[0].contract_address);
}

/// 模拟检查与写入之间被并发部署抢先：get 总是返回空，put 仍按真实存储判定
struct StaleReadRegistry {
    inner: FileContractRegistry,
}

#[async_trait]
impl ContractRegistry for StaleReadRegistry {
    async fn get(&self, _name: &str) -> CustodyResult<Option<ContractRecord>> {
        Ok(None)
    }

    async fn put(&self, name: &str, record: &ContractRecord) -> CustodyResult<()> {
        self.inner.put(name, record).await
    }

    async fn list(&self) -> CustodyResult<Vec<ContractRecord>> {
        self.inner.list().await
    }
}

#[tokio::test]
async fn test_lost_registry_race_reports_already_deployed() {
    let h = TestHarness::new();
    h.state.vault.generate(&passphrase()).await.unwrap();

    // 先正常部署一次，得到已注册的记录
    let registered = h
        .state
        .deployments
        .deploy("MyNFT", &[], &passphrase())
        .await
        .unwrap();

    let config = h.state.config.clone();
    let registry: Arc<dyn ContractRegistry> = Arc::new(StaleReadRegistry {
        inner: FileContractRegistry::new(JsonFileStore::new(h.data_dir().join("contracts"))),
    });
    let pipeline = Arc::new(ironmint::service::TxPipeline::new(
        h.chain.clone(),
        None,
        config.chain.gas_limit_multiplier_percent,
    ));
    let engine = DeploymentEngine::new(
        h.state.vault.clone(),
        registry,
        Arc::new(ArtifactCompiler::new(
            &config.contracts.artifacts_dir,
            &config.contracts.project_dir,
            None,
        )),
        pipeline,
        ConfirmationPolicy::from_config(&config.chain),
    );

    let conflicts_before = ironmint::metrics::registry_conflicts();
    let err = engine.deploy("MyNFT", &[], &passphrase()).await.unwrap_err();
    assert_eq!(err.kind(), "already_deployed");
    assert!(ironmint::metrics::registry_conflicts() > conflicts_before);

    // 注册表保留第一次的地址
    let kept = h.state.deployments.get_contract_info("MyNFT").await.unwrap();
    assert_eq!(kept.contract_address, registered.contract_address);
}
