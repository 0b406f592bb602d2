// 合约注册表 Repository
// 每个合约名一个文件：`<data_dir>/contracts/<name>.json`，写入后不可变

use async_trait::async_trait;
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    domain::{ContractRecord, CustodyError, CustodyResult},
    infrastructure::{CreateOutcome, JsonFileStore},
};

static CONTRACT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").expect("valid regex"));

/// 合约名同时用作文件名，只允许标识符字符
pub fn validate_contract_name(name: &str) -> CustodyResult<()> {
    if CONTRACT_NAME.is_match(name) {
        Ok(())
    } else {
        Err(CustodyError::InvalidInput(format!(
            "invalid contract name {:?}",
            name
        )))
    }
}

fn file_name(name: &str) -> String {
    format!("{}.json", name)
}

#[async_trait]
pub trait ContractRegistry: Send + Sync {
    async fn get(&self, name: &str) -> CustodyResult<Option<ContractRecord>>;

    /// insert-if-absent：已存在时返回 `AlreadyExists`
    async fn put(&self, name: &str, record: &ContractRecord) -> CustodyResult<()>;

    async fn list(&self) -> CustodyResult<Vec<ContractRecord>>;
}

pub struct FileContractRegistry {
    store: JsonFileStore,
}

impl FileContractRegistry {
    pub fn new(store: JsonFileStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ContractRegistry for FileContractRegistry {
    async fn get(&self, name: &str) -> CustodyResult<Option<ContractRecord>> {
        validate_contract_name(name)?;
        let record: Option<ContractRecord> = self.store.read(&file_name(name)).await?;
        Ok(record.map(|mut r| {
            if r.contract_name.is_empty() {
                r.contract_name = name.to_string();
            }
            r
        }))
    }

    async fn put(&self, name: &str, record: &ContractRecord) -> CustodyResult<()> {
        validate_contract_name(name)?;
        match self.store.create_new(&file_name(name), record).await? {
            CreateOutcome::Created => Ok(()),
            CreateOutcome::AlreadyExists => Err(CustodyError::AlreadyExists(format!(
                "contract record {}",
                name
            ))),
        }
    }

    async fn list(&self) -> CustodyResult<Vec<ContractRecord>> {
        let keys: Vec<String> = self
            .store
            .list_keys()
            .await?
            .into_iter()
            .filter(|key| validate_contract_name(key).is_ok())
            .collect();

        let results = join_all(keys.iter().map(|key| self.get(key))).await;

        // 单个损坏的记录不影响整体列表
        let mut records = Vec::with_capacity(results.len());
        for (key, result) in keys.iter().zip(results) {
            match result {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(contract = %key, error = %e, "skipping unreadable contract record");
                }
            }
        }
        Ok(records)
    }
}
