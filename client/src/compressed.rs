//! Observing compressed requests through an off-ledger indexer.
//!
//! Compressed requests have no directly readable account. Every observation
//! is a scan over the owner's indexed entries, matched on the decoded
//! `request_id`. The record persists after fulfillment; only its status
//! changes.

use std::time::Duration;

use solana_sdk::pubkey::Pubkey;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, instrument, warn};

use crate::codec::AccountLayout;
use crate::error::{Result, VrfClientError};
use crate::photon::{IndexedEntry, Indexer};
use crate::state::{CompressedRandomnessRequest, RequestStatus};

/// A decoded compressed request with the tree position needed to spend it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedRequest {
    pub request: CompressedRandomnessRequest,
    pub hash: [u8; 32],
    pub address: Option<[u8; 32]>,
    pub tree: Option<Pubkey>,
    pub leaf_index: u32,
}

impl IndexedRequest {
    pub fn is_fulfilled(&self) -> bool {
        self.request.status == RequestStatus::Fulfilled
    }
}

pub struct CompressedIndexClient<I> {
    indexer: I,
    program_id: Pubkey,
}

impl<I: Indexer> CompressedIndexClient<I> {
    /// `program_id` is the owner scanned by [`Self::find`] and
    /// [`Self::wait_for_fulfillment`].
    pub fn new(indexer: I, program_id: Pubkey) -> Self {
        Self {
            indexer,
            program_id,
        }
    }

    pub fn indexer(&self) -> &I {
        &self.indexer
    }

    /// Every decodable compressed request owned by `owner`.
    ///
    /// Entries with a foreign discriminator or a short payload are skipped;
    /// the index may hold unrelated accounts.
    pub async fn fetch_all(&self, owner: &Pubkey) -> Result<Vec<IndexedRequest>> {
        let entries = self.indexer.query_by_owner(owner).await?;
        let total = entries.len();

        let requests: Vec<IndexedRequest> = entries
            .into_iter()
            .filter_map(|entry| match decode_entry(entry) {
                Ok(request) => Some(request),
                Err((hash, e)) => {
                    warn!(hash = %bs58::encode(hash).into_string(), error = %e, "Skipping malformed compressed entry");
                    None
                }
            })
            .collect();

        debug!(total, decoded = requests.len(), %owner, "Scanned compressed index");
        Ok(requests)
    }

    /// Compressed requests still awaiting fulfillment.
    pub async fn fetch_pending(&self) -> Result<Vec<IndexedRequest>> {
        let mut all = self.fetch_all(&self.program_id).await?;
        all.retain(|r| r.request.status == RequestStatus::Pending);
        Ok(all)
    }

    pub async fn find(&self, request_id: u64) -> Result<Option<IndexedRequest>> {
        Ok(self
            .fetch_all(&self.program_id)
            .await?
            .into_iter()
            .find(|r| r.request.request_id == request_id))
    }

    /// Rescan every `interval` until `request_id` shows `Fulfilled` or
    /// `timeout` elapses. A request not yet indexed keeps polling.
    #[instrument(skip(self), fields(program = %self.program_id))]
    pub async fn wait_for_fulfillment(
        &self,
        request_id: u64,
        timeout: Duration,
        interval: Duration,
    ) -> Result<IndexedRequest> {
        let start = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            match self.find(request_id).await? {
                Some(found) if found.is_fulfilled() => {
                    info!(attempts, elapsed = ?start.elapsed(), "Compressed request fulfilled");
                    return Ok(found);
                }
                Some(found) => {
                    debug!(attempt = attempts, status = %found.request.status, "Not fulfilled yet");
                }
                None => debug!(attempt = attempts, "Request not indexed yet"),
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Err(VrfClientError::Timeout {
                    request_id,
                    elapsed,
                    attempts,
                });
            }
            sleep(interval.min(timeout - elapsed)).await;
        }
    }
}

fn decode_entry(
    entry: IndexedEntry,
) -> std::result::Result<IndexedRequest, ([u8; 32], crate::error::DecodeError)> {
    match CompressedRandomnessRequest::decode(&entry.data) {
        Ok(request) => Ok(IndexedRequest {
            request,
            hash: entry.hash,
            address: entry.address,
            tree: entry.tree,
            leaf_index: entry.leaf_index,
        }),
        Err(e) => Err((entry.hash, e)),
    }
}
