//! VRF request operator
//!
//! Submits a randomness request (or watches an existing one via
//! `REQUEST_ID`), waits for the oracle to fulfill it and, under the legacy
//! generation, consumes and closes the request to recover its rent.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use solana_sdk::signature::Signer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};
use vrf_client::compressed::CompressedIndexClient;
use vrf_client::config::AppConfig;
use vrf_client::photon::PhotonIndexer;
use vrf_client::rpc::RpcLedger;
use vrf_client::{
    FulfillmentWaiter, LifecycleClient, ProtocolGeneration, RequestHandle, WaitOutcome,
};

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Fresh 32-byte seed bound to the requester and the current time.
fn fresh_seed(requester: &[u8]) -> [u8; 32] {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(requester);
    hasher.update(nanos.to_le_bytes());
    hasher.finalize().into()
}

fn lifecycle_client(config: &AppConfig, ledger: Arc<RpcLedger>) -> Result<LifecycleClient<Arc<RpcLedger>>> {
    Ok(match config.generation {
        ProtocolGeneration::Legacy => match config.callback_program_id {
            Some(callback) => LifecycleClient::legacy_with_callback(ledger, config.program_id, callback),
            None => LifecycleClient::legacy(ledger, config.program_id),
        },
        ProtocolGeneration::Subscription => {
            let binding = config
                .subscription_binding()
                .context("subscription generation needs SUBSCRIPTION_ID and CONSUMER_PROGRAM_ID")?;
            LifecycleClient::subscription(ledger, config.program_id, binding)
        }
    })
}

async fn report_compressed_backlog(config: &AppConfig, photon_url: &str) -> Result<()> {
    let indexer = PhotonIndexer::new(photon_url)?;
    let compressed = CompressedIndexClient::new(indexer, config.program_id);
    let pending = compressed.fetch_pending().await?;
    info!(count = pending.len(), "Pending compressed requests");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,solana_client=warn,solana_rpc_client=warn,hyper=warn,reqwest=warn")),
        )
        .with_target(true)
        .with_ansi(true)
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let requester = config.requester_keypair.clone();

    info!(
        program = %config.program_id,
        requester = %requester.pubkey(),
        generation = %config.generation,
        "Starting VRF operator"
    );
    info!(rpc = %config.rpc_url, photon = ?config.photon_url, "Endpoints configured");

    let ledger = Arc::new(RpcLedger::new(&config.rpc_url));
    match ledger.pending_requests(&config.program_id, config.generation).await {
        Ok(pending) => info!(count = pending.len(), "Pending requests on-chain"),
        Err(e) => warn!(error = %e, "Pending request scan failed"),
    }
    if let Some(photon_url) = &config.photon_url {
        if let Err(e) = report_compressed_backlog(&config, photon_url).await {
            warn!(error = %e, "Compressed request scan failed");
        }
    }

    let client = lifecycle_client(&config, ledger)?;

    let handle = match config.request_id {
        Some(request_id) => {
            info!(request_id, "Watching existing request");
            RequestHandle::watch(&config.program_id, config.generation, request_id)?
        }
        None => {
            let seed = fresh_seed(requester.pubkey().as_ref());
            let num_words = match config.generation {
                ProtocolGeneration::Legacy => None,
                ProtocolGeneration::Subscription => Some(config.num_words),
            };
            let handle = client.submit(&requester, &seed, num_words).await?;
            if let Some(signature) = &handle.signature {
                info!(
                    request_id = handle.request_id,
                    explorer = %config.explorer_url(&signature.to_string()),
                    "Request submitted"
                );
            }
            handle
        }
    };

    let waiter = FulfillmentWaiter::new(&client);
    let outcome = waiter
        .wait(&handle, config.wait_timeout, config.poll_interval)
        .await?;

    match outcome {
        WaitOutcome::Fulfilled(view) => {
            for (index, word) in view.words().iter().enumerate() {
                info!(request_id = view.request_id(), index, word = %hex(word), "Random word");
            }
            if config.generation == ProtocolGeneration::Legacy {
                let randomness = client.finalize(&requester, &view).await?;
                info!(
                    request_id = view.request_id(),
                    randomness = %hex(&randomness),
                    "Request consumed and closed"
                );
            }
        }
        WaitOutcome::ClosedAfterCallback { request_id } => {
            info!(
                request_id,
                consumer = ?config.consumer_program_id,
                "Fulfilled and delivered to consumer callback; output is in the consumer's state"
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_is_lowercase_and_padded() {
        assert_eq!(hex(&[0x00, 0x0a, 0xff]), "000aff");
    }

    #[test]
    fn seeds_differ_per_requester() {
        assert_ne!(fresh_seed(&[1; 32]), fresh_seed(&[2; 32]));
    }
}
