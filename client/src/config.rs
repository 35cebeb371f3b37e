//! Operator configuration loaded from environment variables.
//!
//! Required: `PROGRAM_ID`, plus `SUBSCRIPTION_ID` and `CONSUMER_PROGRAM_ID`
//! under the subscription generation.
//! Optional: `RPC_URL`, `PHOTON_URL`, `REQUESTER_KEYPAIR_PATH`,
//!           `PROTOCOL_GENERATION`, `CALLBACK_PROGRAM_ID`, `NUM_WORDS`,
//!           `CALLBACK_COMPUTE_LIMIT`, `POLL_INTERVAL_MS`, `WAIT_TIMEOUT_MS`,
//!           `CLUSTER`, `REQUEST_ID`

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, read_keypair_file};

use crate::ProtocolGeneration;
use crate::lifecycle::SubscriptionBinding;

#[derive(Clone)]
pub struct AppConfig {
    /// Solana JSON-RPC endpoint (HTTP).
    pub rpc_url: String,
    /// Photon indexer endpoint; enables the compressed request scan.
    pub photon_url: Option<String>,
    /// Pays for and signs requests.
    pub requester_keypair: Arc<Keypair>,
    /// The deployed VRF coordinator program ID.
    pub program_id: Pubkey,
    pub generation: ProtocolGeneration,
    pub subscription_id: Option<u64>,
    pub consumer_program_id: Option<Pubkey>,
    /// Legacy generation only: program invoked after fulfillment.
    pub callback_program_id: Option<Pubkey>,
    pub num_words: u32,
    pub callback_compute_limit: u32,
    pub poll_interval: Duration,
    pub wait_timeout: Duration,
    /// Cluster name for explorer URLs.
    pub cluster: String,
    /// Watch an existing request instead of submitting a new one.
    pub request_id: Option<u64>,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let rpc_url = var("RPC_URL").unwrap_or_else(|| "http://127.0.0.1:8899".into());
        let photon_url = var("PHOTON_URL").filter(|url| !url.is_empty());

        let keypair_path =
            var("REQUESTER_KEYPAIR_PATH").unwrap_or_else(|| "~/.config/solana/id.json".into());
        let keypair_path = shellexpand::tilde(&keypair_path).to_string();
        let requester_keypair = read_keypair_file(&keypair_path)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("failed to read keypair from {keypair_path}"))?;

        let program_id = required_pubkey(&var, "PROGRAM_ID")?;

        let generation = match var("PROTOCOL_GENERATION") {
            Some(raw) => raw
                .parse::<ProtocolGeneration>()
                .map_err(anyhow::Error::msg)
                .context("invalid PROTOCOL_GENERATION")?,
            None => ProtocolGeneration::Subscription,
        };

        let subscription_id = optional(&var, "SUBSCRIPTION_ID")?;
        let consumer_program_id = optional(&var, "CONSUMER_PROGRAM_ID")?;
        let callback_program_id = optional(&var, "CALLBACK_PROGRAM_ID")?;
        if generation == ProtocolGeneration::Subscription {
            if subscription_id.is_none() {
                bail!("SUBSCRIPTION_ID env var must be set for the subscription generation");
            }
            if consumer_program_id.is_none() {
                bail!("CONSUMER_PROGRAM_ID env var must be set for the subscription generation");
            }
        }

        let num_words = or_default(&var, "NUM_WORDS", 1);
        let callback_compute_limit = or_default(&var, "CALLBACK_COMPUTE_LIMIT", 200_000);
        let poll_interval = Duration::from_millis(or_default(&var, "POLL_INTERVAL_MS", 500));
        let wait_timeout = Duration::from_millis(or_default(&var, "WAIT_TIMEOUT_MS", 60_000));
        let cluster = var("CLUSTER").unwrap_or_else(|| "devnet".into());
        let request_id = optional(&var, "REQUEST_ID")?;

        Ok(Self {
            rpc_url,
            photon_url,
            requester_keypair: Arc::new(requester_keypair),
            program_id,
            generation,
            subscription_id,
            consumer_program_id,
            callback_program_id,
            num_words,
            callback_compute_limit,
            poll_interval,
            wait_timeout,
            cluster,
            request_id,
        })
    }

    /// Present under the subscription generation once both ids are set.
    pub fn subscription_binding(&self) -> Option<SubscriptionBinding> {
        Some(SubscriptionBinding {
            subscription_id: self.subscription_id?,
            consumer_program: self.consumer_program_id?,
            callback_compute_limit: self.callback_compute_limit,
            callback_accounts: Vec::new(),
        })
    }

    /// Return the Solscan explorer URL for a given transaction signature.
    pub fn explorer_url(&self, signature: &str) -> String {
        match self.cluster.as_str() {
            "mainnet-beta" => format!("https://solscan.io/tx/{signature}"),
            cluster => format!("https://solscan.io/tx/{signature}?cluster={cluster}"),
        }
    }
}

fn required_pubkey(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Pubkey> {
    let raw = var(key).with_context(|| format!("{key} env var must be set"))?;
    Pubkey::from_str(&raw).with_context(|| format!("invalid {key}: {raw}"))
}

/// Unset is `None`; set but unparseable is an error.
fn optional<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(key)
        .map(|raw| raw.parse::<T>().with_context(|| format!("invalid {key}: {raw}")))
        .transpose()
}

fn or_default<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}
