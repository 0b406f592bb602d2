//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// 应用配置结构体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub contracts: ContractsConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// 允许的跨域来源（`*` 表示任意）
    pub cors_allow_origins: Vec<String>,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
    pub enable_file_logging: bool,
    pub log_file_path: Option<String>,
}

/// 本地持久化目录
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// 钱包与合约注册表
    pub data_dir: String,
    /// NFT 元数据与图片
    pub assets_dir: String,
}

/// 链连接与确认策略
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub rpc_url: String,
    /// 未配置时首次使用前向节点查询并缓存
    pub chain_id: Option<u64>,
    pub rpc_timeout_secs: u64,
    /// gas limit = 估算值 * 百分比 / 100
    pub gas_limit_multiplier_percent: u64,
    pub confirmation_timeout_secs: u64,
    pub confirmation_poll_ms: u64,
    pub confirmations: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub kdf_iterations: u32,
}

/// 合约名与编译配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractsConfig {
    pub fungible_token_contract: String,
    pub non_fungible_token_contract: String,
    pub artifacts_dir: String,
    /// 部署前执行的编译命令，例如 `npx hardhat compile`
    pub compile_command: Option<String>,
    pub project_dir: String,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:5000"),
            cors_allow_origins: env_or("CORS_ALLOW_ORIGINS", "http://localhost:8080")
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: env_or("LOG_LEVEL", "info"),
            format: env_or("LOG_FORMAT", "text"),
            enable_file_logging: env_flag("LOG_FILE_ENABLED"),
            log_file_path: std::env::var("LOG_FILE_PATH").ok(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: env_or("DATA_DIR", "./data"),
            assets_dir: env_or("ASSETS_DIR", "./assets"),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        // 显式 RPC_URL 优先；否则有 Infura key 时使用 Polygon Amoy 测试网
        let rpc_url = std::env::var("RPC_URL").ok().unwrap_or_else(|| {
            match std::env::var("INFURA_API_KEY") {
                Ok(key) if !key.is_empty() => {
                    format!("https://polygon-amoy.infura.io/v3/{}", key)
                }
                _ => "http://127.0.0.1:8545".to_string(),
            }
        });

        Self {
            rpc_url,
            chain_id: std::env::var("CHAIN_ID").ok().and_then(|s| s.parse().ok()),
            rpc_timeout_secs: env_parse("RPC_TIMEOUT_SECS", 30),
            gas_limit_multiplier_percent: env_parse("GAS_LIMIT_MULTIPLIER_PERCENT", 120),
            confirmation_timeout_secs: env_parse("CONFIRMATION_TIMEOUT_SECS", 180),
            confirmation_poll_ms: env_parse("CONFIRMATION_POLL_MS", 2_000),
            confirmations: env_parse("CONFIRMATIONS", 1),
        }
    }
}

impl ChainConfig {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            kdf_iterations: env_parse(
                "VAULT_KDF_ITERATIONS",
                crate::infrastructure::keystore::DEFAULT_ITERATIONS,
            ),
        }
    }
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            fungible_token_contract: env_or("FUNGIBLE_TOKEN_CONTRACT", "MyToken"),
            non_fungible_token_contract: env_or("NON_FUNGIBLE_TOKEN_CONTRACT", "MyNFT"),
            artifacts_dir: env_or("ARTIFACTS_DIR", "./artifacts"),
            compile_command: std::env::var("COMPILE_COMMAND")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            project_dir: env_or("CONTRACTS_PROJECT_DIR", "."),
        }
    }
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        Ok(Self::default())
    }

    /// 从配置文件加载配置（文件中缺省的字段回落到环境变量/默认值）
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// 从环境变量和配置文件合并加载（配置文件优先级更高）
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(path) if path.as_ref().exists() => Self::from_file(path),
            _ => Self::from_env(),
        }
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("LOG_LEVEL must be one of: {:?}", valid_levels);
        }

        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("LOG_FORMAT must be 'json' or 'text'");
        }

        if !self.chain.rpc_url.starts_with("http://") && !self.chain.rpc_url.starts_with("https://") {
            anyhow::bail!("RPC_URL must start with http:// or https://");
        }

        if self.chain.gas_limit_multiplier_percent < 100 {
            anyhow::bail!("GAS_LIMIT_MULTIPLIER_PERCENT must be at least 100");
        }

        if self.chain.confirmations == 0 {
            anyhow::bail!("CONFIRMATIONS must be at least 1");
        }

        if self.chain.confirmation_poll_ms == 0 || self.chain.confirmation_timeout_secs == 0 {
            anyhow::bail!("CONFIRMATION_POLL_MS and CONFIRMATION_TIMEOUT_SECS must be positive");
        }

        let max_iterations = crate::infrastructure::keystore::MAX_ITERATIONS;
        if self.vault.kdf_iterations < 1_000 || self.vault.kdf_iterations > max_iterations {
            anyhow::bail!("VAULT_KDF_ITERATIONS must be between 1000 and {}", max_iterations);
        }

        if self.contracts.fungible_token_contract == self.contracts.non_fungible_token_contract {
            anyhow::bail!("fungible and non-fungible token contracts must differ");
        }

        Ok(())
    }
}
