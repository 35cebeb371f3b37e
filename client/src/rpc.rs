//! [`LedgerQuery`] over a Solana JSON-RPC node.

use std::time::Duration;

use async_trait::async_trait;
use solana_account_decoder::UiAccountEncoding;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig, RpcTransactionConfig};
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_commitment_config::CommitmentConfig;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::Transaction;
use tracing::{debug, info, warn};

use crate::ProtocolGeneration;
use crate::codec::AccountLayout;
use crate::discriminator::account;
use crate::ledger::{ExecutionResult, LedgerError, LedgerQuery};
use crate::state::{LegacyRandomnessRequest, RandomnessRequest, RequestAccount, RequestStatus};

/// Backoff for `BlockhashNotFound` on submission. Other failures are not retried.
#[derive(Clone, Debug, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
        }
    }
}

pub struct RpcLedger {
    client: RpcClient,
    retry: RetryConfig,
}

impl RpcLedger {
    pub fn new(rpc_url: impl ToString) -> Self {
        Self::with_retry(rpc_url, RetryConfig::default())
    }

    pub fn with_retry(rpc_url: impl ToString, retry: RetryConfig) -> Self {
        Self {
            client: RpcClient::new_with_commitment(
                rpc_url.to_string(),
                CommitmentConfig::confirmed(),
            ),
            retry,
        }
    }

    pub fn client(&self) -> &RpcClient {
        &self.client
    }

    /// Every `Pending` request of `generation` owned by `program_id`.
    ///
    /// Filters on the shared request discriminator, the generation's account
    /// size and a zero status byte. Entries that fail to decode are skipped.
    pub async fn pending_requests(
        &self,
        program_id: &Pubkey,
        generation: ProtocolGeneration,
    ) -> Result<Vec<(Pubkey, RequestAccount)>, LedgerError> {
        let size = match generation {
            ProtocolGeneration::Legacy => LegacyRandomnessRequest::SIZE,
            ProtocolGeneration::Subscription => RandomnessRequest::SIZE,
        };

        let filters = vec![
            RpcFilterType::DataSize(size as u64),
            RpcFilterType::Memcmp(Memcmp::new_raw_bytes(0, account::RANDOMNESS_REQUEST.to_vec())),
            RpcFilterType::Memcmp(Memcmp::new_raw_bytes(
                status_offset(generation),
                vec![RequestStatus::Pending.as_u8()],
            )),
        ];
        let config = RpcProgramAccountsConfig {
            filters: Some(filters),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                commitment: Some(CommitmentConfig::confirmed()),
                ..Default::default()
            },
            ..Default::default()
        };

        let accounts = self
            .client
            .get_program_ui_accounts_with_config(program_id, config)
            .await?;
        info!(count = accounts.len(), ?generation, "Found pending requests");

        let mut pending = Vec::with_capacity(accounts.len());
        for (address, ui_account) in accounts {
            let Some(data) = ui_account.data.decode() else {
                warn!(account = %address, "Failed to decode account data, skipping");
                continue;
            };
            match RequestAccount::decode(generation, &data) {
                Ok(request) => pending.push((address, request)),
                Err(e) => warn!(account = %address, error = %e, "Skipping malformed request"),
            }
        }
        Ok(pending)
    }

    async fn send_with_retries(
        &self,
        instructions: &[Instruction],
        signers: &[&Keypair],
    ) -> Result<Signature, LedgerError> {
        let payer = signers
            .first()
            .ok_or_else(|| LedgerError::CustomError("no fee payer supplied".to_string()))?;
        let mut delay = self.retry.initial_delay;

        for attempt in 0..=self.retry.max_retries {
            let blockhash = self.client.get_latest_blockhash().await?;
            let tx = Transaction::new_signed_with_payer(
                instructions,
                Some(&payer.pubkey()),
                signers,
                blockhash,
            );

            match self.client.send_and_confirm_transaction(&tx).await {
                Ok(signature) => return Ok(signature),
                Err(e)
                    if e.to_string().contains("BlockhashNotFound")
                        && attempt < self.retry.max_retries =>
                {
                    warn!(attempt = attempt + 1, ?delay, "BlockhashNotFound, retrying");
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2).min(self.retry.max_delay);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(LedgerError::CustomError(format!(
            "max retries ({}) exceeded",
            self.retry.max_retries
        )))
    }
}

#[async_trait]
impl LedgerQuery for RpcLedger {
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError> {
        let response = self
            .client
            .get_account_with_commitment(address, self.client.commitment())
            .await?;
        Ok(response.value.map(|account| account.data))
    }

    async fn submit(
        &self,
        instructions: &[Instruction],
        signers: &[&Keypair],
    ) -> Result<ExecutionResult, LedgerError> {
        let signature = self.send_with_retries(instructions, signers).await?;
        debug!(%signature, "Transaction confirmed");

        let config = RpcTransactionConfig {
            commitment: Some(self.client.commitment()),
            max_supported_transaction_version: Some(0),
            ..Default::default()
        };
        let confirmed = self
            .client
            .get_transaction_with_config(&signature, config)
            .await?;
        let logs: Option<Vec<String>> = confirmed
            .transaction
            .meta
            .and_then(|meta| meta.log_messages.into());

        Ok(ExecutionResult {
            signature,
            slot: confirmed.slot,
            logs: logs.unwrap_or_default(),
        })
    }
}

/// Offset of the status byte within a raw request account of `generation`.
pub fn status_offset(generation: ProtocolGeneration) -> usize {
    match generation {
        ProtocolGeneration::Legacy => LegacyRandomnessRequest::STATUS_OFFSET,
        ProtocolGeneration::Subscription => RandomnessRequest::STATUS_OFFSET,
    }
}
