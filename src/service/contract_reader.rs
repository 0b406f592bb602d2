//! 只读合约查询：代币余额与 NFT 持有人

use std::sync::Arc;

use ethers::{
    abi::Token,
    types::{Address, U256},
    utils::to_checksum,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    config::ContractsConfig,
    domain::{ContractBinding, CustodyError, CustodyResult},
    repository::ContractRegistry,
    service::tx_pipeline::TxPipeline,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub holder: String,
    /// 最小单位的十进制字符串
    pub balance: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssetOwner {
    pub token_id: String,
    pub owner: String,
}

pub struct ContractReader {
    registry: Arc<dyn ContractRegistry>,
    pipeline: Arc<TxPipeline>,
    fungible_token: String,
    non_fungible_token: String,
}

impl ContractReader {
    pub fn new(
        registry: Arc<dyn ContractRegistry>,
        pipeline: Arc<TxPipeline>,
        contracts: &ContractsConfig,
    ) -> Self {
        Self {
            registry,
            pipeline,
            fungible_token: contracts.fungible_token_contract.clone(),
            non_fungible_token: contracts.non_fungible_token_contract.clone(),
        }
    }

    /// 查询余额；未指定持有人时使用代币合约的 owner()
    pub async fn token_balance(&self, holder: Option<Address>) -> CustodyResult<TokenBalance> {
        let (address, binding) = self.resolve(&self.fungible_token).await?;

        let holder = match holder {
            Some(h) => h,
            None => {
                let tokens = self.query(address, &binding, "owner", &[]).await?;
                expect_address(&tokens, "owner")?
            }
        };

        let tokens = self
            .query(address, &binding, "balanceOf", &[Token::Address(holder)])
            .await?;
        let balance = expect_uint(&tokens, "balanceOf")?;

        Ok(TokenBalance {
            holder: to_checksum(&holder, None),
            balance: balance.to_string(),
        })
    }

    /// 查询 NFT 当前持有人
    pub async fn asset_owner(&self, token_id: U256) -> CustodyResult<AssetOwner> {
        let (address, binding) = self.resolve(&self.non_fungible_token).await?;
        let tokens = self
            .query(address, &binding, "ownerOf", &[Token::Uint(token_id)])
            .await?;

        Ok(AssetOwner {
            token_id: token_id.to_string(),
            owner: to_checksum(&expect_address(&tokens, "ownerOf")?, None),
        })
    }

    async fn resolve(&self, contract_name: &str) -> CustodyResult<(Address, ContractBinding)> {
        let record = self
            .registry
            .get(contract_name)
            .await?
            .ok_or_else(|| CustodyError::ContractNotDeployed(contract_name.to_string()))?;
        Ok((record.address()?, record.binding()?))
    }

    async fn query(
        &self,
        address: Address,
        binding: &ContractBinding,
        function: &str,
        args: &[Token],
    ) -> CustodyResult<Vec<Token>> {
        let data = binding.encode_call(function, args)?;
        let output = self.pipeline.call(address, data).await?;
        binding.decode_result(function, &output)
    }
}

fn expect_address(tokens: &[Token], function: &str) -> CustodyResult<Address> {
    match tokens.first() {
        Some(Token::Address(a)) => Ok(*a),
        _ => Err(CustodyError::TransactionFailed(format!(
            "{} did not return an address",
            function
        ))),
    }
}

fn expect_uint(tokens: &[Token], function: &str) -> CustodyResult<U256> {
    match tokens.first() {
        Some(Token::Uint(v)) => Ok(*v),
        _ => Err(CustodyError::TransactionFailed(format!(
            "{} did not return an integer",
            function
        ))),
    }
}
