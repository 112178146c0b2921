use std::{
    fmt,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use alloy_primitives::Address;
use anyhow::{Context, Result, bail};
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use sync_latency_store::{DEFAULT_HISTORY_CAP, ResultStore};
use url::Url;

use crate::{
    client::DEFAULT_SYNC_METHOD,
    probe::{DEFAULT_ATTEMPTS, ProbeConfig},
    signer::DEFAULT_CREDENTIAL_ENV,
    transaction::DEFAULT_GAS_LIMIT,
};

pub const DEFAULT_RPC_URL: &str = "https://testnet.riselabs.xyz";
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x11642286f8FC63c9b99A91087e4d954D4A062690";

/// Probe configuration. The signing key itself never lives here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level for application logging, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub rpc: RpcSettings,
    #[serde(default)]
    pub probe: ProbeSettings,
    #[serde(default)]
    pub store: StoreSettings,
    /// Prometheus exporter listen address, disabled when unset
    #[serde(default)]
    pub metrics_addr: Option<SocketAddr>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcSettings {
    /// JSON-RPC endpoint, http or https
    #[serde(default = "default_rpc_url")]
    pub url: String,
    /// Method of the blocking send extension
    #[serde(default = "default_sync_method")]
    pub sync_method: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSettings {
    /// Counter contract receiving the `increment()` calls
    #[serde(default = "default_contract_address")]
    pub contract_address: String,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    /// Transactions per run
    #[serde(default = "default_attempts")]
    pub attempts: usize,
    /// Delay between attempts in milliseconds, 0 for back to back
    #[serde(default)]
    pub pacing_ms: u64,
    /// Environment variable holding the hex private key
    #[serde(default = "default_credential_env")]
    pub credential_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            sync_method: default_sync_method(),
        }
    }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            contract_address: default_contract_address(),
            gas_limit: default_gas_limit(),
            attempts: default_attempts(),
            pacing_ms: 0,
            credential_env: default_credential_env(),
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            history_cap: default_history_cap(),
        }
    }
}

impl Settings {
    /// Loads an optional TOML file layered under `PROBE__*` environment variables.
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        // .env is optional
        let _ = dotenvy::dotenv();

        let mut builder = ConfigBuilder::builder();
        if let Some(file) = path {
            builder = builder.add_source(File::with_name(&file.as_ref().to_string_lossy()));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("PROBE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.rpc_url()?;
        self.contract_address()?;

        if self.rpc.sync_method.trim().is_empty() {
            bail!("RPC sync_method cannot be empty");
        }
        if self.probe.attempts == 0 {
            bail!("Probe attempts must be greater than 0");
        }
        if self.probe.gas_limit == 0 {
            bail!("Probe gas_limit must be greater than 0");
        }
        if self.probe.credential_env.trim().is_empty() {
            bail!("Probe credential_env cannot be empty");
        }
        if self.store.history_cap == 0 {
            bail!("Store history_cap must be greater than 0");
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.to_lowercase().as_str()) {
            bail!(
                "Invalid log level '{}'. Valid options are: {:?}",
                self.log_level,
                valid_log_levels
            );
        }

        Ok(())
    }

    pub fn rpc_url(&self) -> Result<Url> {
        if self.rpc.url.is_empty() {
            bail!("RPC URL cannot be empty");
        }
        if !self.rpc.url.starts_with("http://") && !self.rpc.url.starts_with("https://") {
            bail!("RPC URL must start with http:// or https://");
        }
        Url::parse(&self.rpc.url).with_context(|| format!("Invalid RPC URL '{}'", self.rpc.url))
    }

    pub fn contract_address(&self) -> Result<Address> {
        self.probe
            .contract_address
            .parse()
            .with_context(|| format!("Invalid contract address '{}'", self.probe.contract_address))
    }

    pub fn probe_config(&self) -> Result<ProbeConfig> {
        Ok(ProbeConfig {
            endpoint: self.rpc.url.clone(),
            contract: self.contract_address()?,
            gas_limit: self.probe.gas_limit,
            attempts: self.probe.attempts,
            pacing: Duration::from_millis(self.probe.pacing_ms),
        })
    }

    pub fn result_store(&self) -> ResultStore {
        ResultStore::new(&self.store.data_dir, self.store.history_cap)
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Settings {{\n\
             \tLog Level: {}\n\
             \tRPC URL: {}\n\
             \tSync Method: {}\n\
             \tContract: {}\n\
             \tAttempts: {}\n\
             \tPacing (ms): {}\n\
             \tData Dir: {}\n\
             \tHistory Cap: {}\n\
             }}",
            self.log_level,
            self.rpc.url,
            self.rpc.sync_method,
            self.probe.contract_address,
            self.probe.attempts,
            self.probe.pacing_ms,
            self.store.data_dir.display(),
            self.store.history_cap,
        )
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rpc_url() -> String {
    DEFAULT_RPC_URL.to_string()
}

fn default_sync_method() -> String {
    DEFAULT_SYNC_METHOD.to_string()
}

fn default_contract_address() -> String {
    DEFAULT_CONTRACT_ADDRESS.to_string()
}

fn default_gas_limit() -> u64 {
    DEFAULT_GAS_LIMIT
}

fn default_attempts() -> usize {
    DEFAULT_ATTEMPTS
}

fn default_credential_env() -> String {
    DEFAULT_CREDENTIAL_ENV.to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_history_cap() -> usize {
    DEFAULT_HISTORY_CAP
}
