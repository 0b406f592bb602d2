//! 合约部署
//!
//! 每个合约名只部署一次。状态流转：
//! `NotDeployed → Submitting → AwaitingConfirmation → Deployed | Failed`，
//! 注册表写入前的任何失败都不留下记录。

use std::sync::Arc;

use chrono::Utc;
use ethers::utils::{get_contract_address, to_checksum};
use serde_json::Value;

use crate::{
    domain::{ContractRecord, CustodyError, CustodyResult, DeploymentPhase, Passphrase},
    infrastructure::ArtifactCompiler,
    repository::{validate_contract_name, ContractRegistry},
    service::{
        confirmation::{wait_for_confirmation, ConfirmationPolicy},
        credential_vault::CredentialVault,
        tx_pipeline::TxPipeline,
    },
};

pub struct DeploymentEngine {
    vault: Arc<CredentialVault>,
    registry: Arc<dyn ContractRegistry>,
    compiler: Arc<ArtifactCompiler>,
    pipeline: Arc<TxPipeline>,
    policy: ConfirmationPolicy,
}

fn log_phase(contract_name: &str, phase: DeploymentPhase) {
    tracing::info!(
        contract = contract_name,
        phase = %phase,
        terminal = phase.is_terminal(),
        "deployment_phase"
    );
}

impl DeploymentEngine {
    pub fn new(
        vault: Arc<CredentialVault>,
        registry: Arc<dyn ContractRegistry>,
        compiler: Arc<ArtifactCompiler>,
        pipeline: Arc<TxPipeline>,
        policy: ConfirmationPolicy,
    ) -> Self {
        Self {
            vault,
            registry,
            compiler,
            pipeline,
            policy,
        }
    }

    pub async fn deploy(
        &self,
        contract_name: &str,
        constructor_args: &[Value],
        passphrase: &Passphrase,
    ) -> CustodyResult<ContractRecord> {
        validate_contract_name(contract_name)?;
        log_phase(contract_name, DeploymentPhase::NotDeployed);

        if self.registry.get(contract_name).await?.is_some() {
            return Err(CustodyError::AlreadyDeployed(contract_name.to_string()));
        }

        match self.submit_and_record(contract_name, constructor_args, passphrase).await {
            Ok(record) => {
                log_phase(contract_name, DeploymentPhase::Deployed);
                Ok(record)
            }
            Err(e) => {
                tracing::warn!(
                    contract = contract_name,
                    phase = %DeploymentPhase::Failed,
                    error_kind = e.kind(),
                    error = %e,
                    "deployment_phase"
                );
                Err(e)
            }
        }
    }

    async fn submit_and_record(
        &self,
        contract_name: &str,
        constructor_args: &[Value],
        passphrase: &Passphrase,
    ) -> CustodyResult<ContractRecord> {
        // 先编译并编码参数，输入错误不需要解锁钱包
        self.compiler.compile().await?;
        let artifact = self.compiler.load(contract_name).await?;
        let binding = artifact.binding()?;
        let bytecode = artifact.bytecode_bytes()?;
        let deploy_data = binding.encode_deploy(&bytecode, constructor_args)?;

        let signer = self.vault.unlock(passphrase).await?;

        log_phase(contract_name, DeploymentPhase::Submitting);
        let submitted = self
            .pipeline
            .submit(&signer, None, deploy_data, "deploy")
            .await?;
        drop(signer);

        log_phase(contract_name, DeploymentPhase::AwaitingConfirmation);
        let confirmed =
            wait_for_confirmation(self.pipeline.rpc().as_ref(), submitted.hash, &self.policy).await?;

        let address = confirmed
            .receipt
            .contract_address
            .unwrap_or_else(|| get_contract_address(submitted.from, submitted.nonce));

        let record = ContractRecord {
            contract_name: contract_name.to_string(),
            contract_address: to_checksum(&address, None),
            transaction_hash: format!("{:?}", submitted.hash),
            abi: artifact.interface_description(),
            deployed_at: Some(Utc::now()),
        };

        match self.registry.put(contract_name, &record).await {
            Ok(()) => {
                crate::metrics::inc_deployment();
                tracing::info!(
                    contract = contract_name,
                    address = %record.contract_address,
                    tx_hash = %record.transaction_hash,
                    "contract_deployed"
                );
                Ok(record)
            }
            Err(CustodyError::AlreadyExists(_)) => {
                // 并发部署：链上已经有了第二个合约，无法回滚
                let kept = self
                    .registry
                    .get(contract_name)
                    .await
                    .ok()
                    .flatten()
                    .map(|r| r.contract_address)
                    .unwrap_or_default();
                crate::metrics::inc_registry_conflict();
                tracing::error!(
                    contract = contract_name,
                    orphaned_address = %record.contract_address,
                    orphaned_tx_hash = %record.transaction_hash,
                    registered_address = %kept,
                    "concurrent deployment lost registry write; orphaned contract on chain"
                );
                Err(CustodyError::AlreadyDeployed(contract_name.to_string()))
            }
            Err(e) => {
                tracing::error!(
                    contract = contract_name,
                    address = %record.contract_address,
                    tx_hash = %record.transaction_hash,
                    error = %e,
                    "contract deployed on chain but registry write failed"
                );
                Err(e)
            }
        }
    }

    /// 已部署合约信息
    pub async fn get_contract_info(&self, contract_name: &str) -> CustodyResult<ContractRecord> {
        self.registry
            .get(contract_name)
            .await?
            .ok_or_else(|| CustodyError::NotFound(format!("contract {}", contract_name)))
    }

    pub async fn list_contracts(&self) -> CustodyResult<Vec<ContractRecord>> {
        self.registry.list().await
    }
}
