//! Claim configuration: JSON file defaults plus environment overrides.
//!
//! Recognised environment variables:
//!
//! * `PRIMECLAIM_PRIME_COUNT` – number of primes in the domain.
//! * `PRIMECLAIM_CHAIN` – `bsc` or `avax`.
//! * `PRIMECLAIM_KEY_FILE` – path of the hex secret key file.
//! * `PRIMECLAIM_CONTRACT_INFO` – path of the contract info JSON.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::CHALLENGE_LEN;

/// Default number of primes in the claim domain.
pub const DEFAULT_PRIME_COUNT: usize = 8192;

/// Errors reported while loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Filesystem failure.
    #[error("cannot read {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// Malformed JSON or wrong shape.
    #[error("invalid config {path}: {message}")]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Parser message.
        message: String,
    },
    /// A value (from a file or the environment) is out of range.
    #[error("invalid value for {key}: {value}")]
    InvalidValue {
        /// Setting name.
        key: &'static str,
        /// Offending value.
        value: String,
    },
}

/// Chains with a deployed claim contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    /// Avalanche C-chain testnet.
    Avax,
    /// BNB smart chain testnet.
    Bsc,
}

impl Chain {
    /// Public JSON-RPC endpoint used by the transaction sender.
    pub fn rpc_url(self) -> &'static str {
        match self {
            Self::Avax => "https://api.avax-test.network/ext/bc/C/rpc",
            Self::Bsc => "https://data-seed-prebsc-1-s1.binance.org:8545/",
        }
    }

    /// Lowercase key used in contract info files.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Avax => "avax",
            Self::Bsc => "bsc",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "avax" => Ok(Self::Avax),
            "bsc" => Ok(Self::Bsc),
            _ => Err(ConfigError::InvalidValue {
                key: "chain",
                value: raw.to_string(),
            }),
        }
    }
}

/// Settings for building and submitting a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimConfig {
    /// Number of primes in the domain.
    pub prime_count: usize,
    /// Chain the claim is submitted to.
    pub chain: Chain,
    /// File holding the hex secret key.
    pub key_file: PathBuf,
    /// Optional contract info JSON.
    pub contract_info: Option<PathBuf>,
    /// Length of generated challenges.
    pub challenge_len: usize,
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            prime_count: DEFAULT_PRIME_COUNT,
            chain: Chain::Bsc,
            key_file: PathBuf::from("sk.txt"),
            contract_info: None,
            challenge_len: CHALLENGE_LEN,
        }
    }
}

impl ClaimConfig {
    /// Reads a JSON config file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when given (defaults otherwise) and applies environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        debug!("effective config: {config:?}");
        Ok(config)
    }

    /// Applies overrides from `lookup`, which maps variable names to values.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("PRIMECLAIM_PRIME_COUNT") {
            self.prime_count = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "prime_count",
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = lookup("PRIMECLAIM_CHAIN") {
            self.chain = raw.parse()?;
        }
        if let Some(raw) = lookup("PRIMECLAIM_KEY_FILE") {
            self.key_file = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("PRIMECLAIM_CONTRACT_INFO") {
            self.contract_info = Some(PathBuf::from(raw));
        }
        self.validate()
    }

    /// Loads the contract entry for the configured chain, when a contract
    /// info file is set.
    pub fn contract(&self) -> Result<Option<ContractInfo>, ConfigError> {
        self.contract_info
            .as_deref()
            .map(|path| ContractInfo::load(path, self.chain))
            .transpose()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.prime_count == 0 {
            return Err(ConfigError::InvalidValue {
                key: "prime_count",
                value: "0".into(),
            });
        }
        if self.challenge_len == 0 {
            return Err(ConfigError::InvalidValue {
                key: "challenge_len",
                value: "0".into(),
            });
        }
        Ok(())
    }
}

/// Address and ABI of the claim contract on one chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractInfo {
    /// Contract address as written in the file.
    pub address: String,
    /// Contract ABI, kept opaque.
    pub abi: serde_json::Value,
}

impl ContractInfo {
    /// Reads the `chain` entry of a `{ "<chain>": { "address", "abi" } }` file.
    pub fn load(path: &Path, chain: Chain) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut all: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&raw)
            .map_err(|err| ConfigError::Parse {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;
        let entry = all.remove(chain.as_str()).ok_or_else(|| ConfigError::Parse {
            path: path.to_path_buf(),
            message: format!("no entry for chain {chain}"),
        })?;
        serde_json::from_value(entry).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }
}
