//! 状态变更交易：代币转账、NFT 铸造、NFT 转移
//!
//! 三个操作流程相同：解析合约 → 解锁 → 编码并提交 → 等待确认。
//! 目标合约未部署时在访问网络前失败；任何环节都不自动重试。

use std::sync::Arc;

use ethers::{
    abi::Token,
    types::{Address, Bytes, U256},
};

use crate::{
    config::ContractsConfig,
    domain::{
        ContractBinding, CustodyError, CustodyResult, Passphrase, TransactionReceiptView,
    },
    infrastructure::log_redact::redact_address,
    repository::ContractRegistry,
    service::{
        confirmation::{wait_for_confirmation, ConfirmationPolicy},
        credential_vault::CredentialVault,
        tx_pipeline::TxPipeline,
    },
};

/// 铸造函数候选（按顺序尝试）
const MINT_FUNCTIONS: [&str; 2] = ["safeMint", "mint"];

pub struct TransactionSubmitter {
    vault: Arc<CredentialVault>,
    registry: Arc<dyn ContractRegistry>,
    pipeline: Arc<TxPipeline>,
    policy: ConfirmationPolicy,
    fungible_token: String,
    non_fungible_token: String,
}

/// 已解析的目标合约
struct Target {
    name: String,
    address: Address,
    binding: ContractBinding,
}

impl TransactionSubmitter {
    pub fn new(
        vault: Arc<CredentialVault>,
        registry: Arc<dyn ContractRegistry>,
        pipeline: Arc<TxPipeline>,
        policy: ConfirmationPolicy,
        contracts: &ContractsConfig,
    ) -> Self {
        Self {
            vault,
            registry,
            pipeline,
            policy,
            fungible_token: contracts.fungible_token_contract.clone(),
            non_fungible_token: contracts.non_fungible_token_contract.clone(),
        }
    }

    /// 同质化代币转账 `transfer(recipient, amount)`
    pub async fn transfer(
        &self,
        recipient: Address,
        amount: U256,
        passphrase: &Passphrase,
    ) -> CustodyResult<TransactionReceiptView> {
        let target = self.resolve(&self.fungible_token).await?;
        tracing::info!(
            contract = %target.name,
            recipient = %redact_address(&format!("{:?}", recipient)),
            amount = %amount,
            "token transfer requested"
        );

        self.execute("transfer", &target, passphrase, |binding, _owner| {
            binding.encode_call("transfer", &[Token::Address(recipient), Token::Uint(amount)])
        })
        .await
    }

    /// 铸造 NFT 给 recipient
    pub async fn mint(
        &self,
        recipient: Address,
        passphrase: &Passphrase,
    ) -> CustodyResult<TransactionReceiptView> {
        let target = self.resolve(&self.non_fungible_token).await?;
        tracing::info!(
            contract = %target.name,
            recipient = %redact_address(&format!("{:?}", recipient)),
            "asset mint requested"
        );

        self.execute("mint", &target, passphrase, |binding, _owner| {
            let args = [Token::Address(recipient)];
            let mut last_err = None;
            for name in MINT_FUNCTIONS {
                if !binding.has_function(name) {
                    continue;
                }
                match binding.encode_call(name, &args) {
                    Ok(data) => return Ok(data),
                    Err(e) => last_err = Some(e),
                }
            }
            Err(last_err.unwrap_or_else(|| {
                CustodyError::InvalidInput("contract has no mint(address) function".into())
            }))
        })
        .await
    }

    /// 转移 NFT：发送方固定为当前凭证地址
    pub async fn transfer_asset(
        &self,
        recipient: Address,
        token_id: U256,
        passphrase: &Passphrase,
    ) -> CustodyResult<TransactionReceiptView> {
        let target = self.resolve(&self.non_fungible_token).await?;
        tracing::info!(
            contract = %target.name,
            recipient = %redact_address(&format!("{:?}", recipient)),
            token_id = %token_id,
            "asset transfer requested"
        );

        self.execute("transfer_asset", &target, passphrase, |binding, owner| {
            binding.encode_call(
                "safeTransferFrom",
                &[
                    Token::Address(owner),
                    Token::Address(recipient),
                    Token::Uint(token_id),
                ],
            )
        })
        .await
    }

    /// 只读本地注册表，不访问网络
    async fn resolve(&self, contract_name: &str) -> CustodyResult<Target> {
        let record = self
            .registry
            .get(contract_name)
            .await?
            .ok_or_else(|| CustodyError::ContractNotDeployed(contract_name.to_string()))?;

        Ok(Target {
            name: contract_name.to_string(),
            address: record.address()?,
            binding: record.binding()?,
        })
    }

    async fn execute<F>(
        &self,
        kind: &'static str,
        target: &Target,
        passphrase: &Passphrase,
        encode: F,
    ) -> CustodyResult<TransactionReceiptView>
    where
        F: FnOnce(&ContractBinding, Address) -> CustodyResult<Bytes>,
    {
        let signer = self.vault.unlock(passphrase).await?;
        let data = encode(&target.binding, signer.address())?;

        let submitted = self
            .pipeline
            .submit(&signer, Some(target.address), data, kind)
            .await?;
        drop(signer);

        let confirmed =
            wait_for_confirmation(self.pipeline.rpc().as_ref(), submitted.hash, &self.policy).await?;
        Ok(confirmed.view())
    }
}
