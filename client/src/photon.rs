//! Photon indexer client for ZK Compressed accounts.
//!
//! Photon tracks compressed account state in Light Protocol Merkle trees.
//! The client uses it to list the coordinator's compressed requests and to
//! obtain validity proofs for state transitions.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::json;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, warn};

use crate::instructions::compressed::ValidityProof;
use crate::ledger::LedgerError;

/// HTTP request timeout for Photon RPC calls.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const PAGE_LIMIT: u32 = 1000;

/// A raw compressed account as reported by the indexer.
///
/// `data` is `discriminator (8) || payload`, regardless of whether the
/// indexer returned the discriminator inline or as a separate field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedEntry {
    pub hash: [u8; 32],
    pub address: Option<[u8; 32]>,
    pub tree: Option<Pubkey>,
    pub leaf_index: u32,
    pub data: Vec<u8>,
}

/// Off-ledger index of compressed accounts.
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Every compressed account owned by `owner`, across all pages.
    async fn query_by_owner(&self, owner: &Pubkey) -> Result<Vec<IndexedEntry>, LedgerError>;
}

/// Proof returned by `getValidityProof`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidityProofWithContext {
    pub proof: ValidityProof,
    pub root_indices: Vec<u16>,
}

// ---------------------------------------------------------------------------
// Photon JSON-RPC request/response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct JsonRpcRequest<T: Serialize> {
    jsonrpc: &'static str,
    id: &'static str,
    method: &'static str,
    params: T,
}

#[derive(Deserialize, Debug)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize, Debug)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize, Debug)]
struct ContextWrapped<T> {
    value: T,
}

#[derive(Deserialize, Debug)]
struct AccountPage {
    items: Vec<AccountItem>,
    cursor: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct AccountItem {
    hash: String,
    address: Option<String>,
    data: Option<AccountData>,
    tree: Option<String>,
    leaf_index: Option<u32>,
}

#[derive(Deserialize, Debug)]
struct AccountData {
    data: String,
    discriminator: Option<u64>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ProofValue {
    compressed_proof: ProofParts,
    root_indices: Vec<u64>,
}

#[derive(Deserialize, Debug)]
struct ProofParts {
    a: Vec<u8>,
    b: Vec<u8>,
    c: Vec<u8>,
}

fn fixed<const N: usize>(what: &str, bytes: &[u8]) -> Result<[u8; N], LedgerError> {
    <[u8; N]>::try_from(bytes).map_err(|_| {
        LedgerError::CustomError(format!(
            "{what} has wrong size: expected {N}, got {}",
            bytes.len()
        ))
    })
}

impl AccountItem {
    fn into_entry(self) -> Result<Option<IndexedEntry>, LedgerError> {
        let Some(data) = self.data else {
            return Ok(None);
        };
        let payload = STANDARD
            .decode(&data.data)
            .map_err(|e| LedgerError::CustomError(format!("invalid account data encoding: {e}")))?;
        let bytes = match data.discriminator {
            Some(disc) => {
                let mut out = Vec::with_capacity(8 + payload.len());
                out.extend_from_slice(&disc.to_le_bytes());
                out.extend_from_slice(&payload);
                out
            }
            None => payload,
        };

        let hash_bytes = bs58::decode(&self.hash)
            .into_vec()
            .map_err(|e| LedgerError::CustomError(format!("invalid hash encoding: {e}")))?;
        let hash = fixed::<32>("hash", &hash_bytes)?;

        let address = match self.address {
            Some(addr) => Some(
                Pubkey::from_str(&addr)
                    .map_err(|e| LedgerError::CustomError(format!("invalid address: {e}")))?
                    .to_bytes(),
            ),
            None => None,
        };
        let tree = match self.tree {
            Some(tree) => Some(
                Pubkey::from_str(&tree)
                    .map_err(|e| LedgerError::CustomError(format!("invalid tree pubkey: {e}")))?,
            ),
            None => None,
        };

        Ok(Some(IndexedEntry {
            hash,
            address,
            tree,
            leaf_index: self.leaf_index.unwrap_or(0),
            data: bytes,
        }))
    }
}

/// [`Indexer`] over Photon's JSON-RPC API.
#[derive(Clone)]
pub struct PhotonIndexer {
    rpc_url: String,
    http: reqwest::Client,
}

impl PhotonIndexer {
    pub fn new(rpc_url: &str) -> Result<Self, LedgerError> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            rpc_url: rpc_url.to_string(),
            http,
        })
    }

    async fn call<P, T>(&self, method: &'static str, params: P) -> Result<T, LedgerError>
    where
        P: Serialize + Send,
        T: for<'de> Deserialize<'de>,
    {
        let req = JsonRpcRequest {
            jsonrpc: "2.0",
            id: "1",
            method,
            params,
        };
        let resp: JsonRpcResponse<T> = self
            .http
            .post(&self.rpc_url)
            .json(&req)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = resp.error {
            return Err(LedgerError::Indexer {
                code: err.code,
                message: err.message,
            });
        }
        resp.result.ok_or_else(|| {
            LedgerError::CustomError(format!("{method} returned null result without error"))
        })
    }

    /// Current state of a compressed account by address.
    pub async fn get_compressed_account(
        &self,
        address: &[u8; 32],
    ) -> Result<Option<IndexedEntry>, LedgerError> {
        let result: ContextWrapped<Option<AccountItem>> = self
            .call(
                "getCompressedAccount",
                json!({ "address": bs58::encode(address).into_string() }),
            )
            .await?;
        match result.value {
            Some(item) => item.into_entry(),
            None => Ok(None),
        }
    }

    /// Validity proof for spending `hashes` and/or creating `new_addresses`.
    pub async fn get_validity_proof(
        &self,
        hashes: &[[u8; 32]],
        new_addresses: &[[u8; 32]],
    ) -> Result<ValidityProofWithContext, LedgerError> {
        let hashes: Vec<String> = hashes.iter().map(|h| bs58::encode(h).into_string()).collect();
        let new_addresses: Vec<String> = new_addresses
            .iter()
            .map(|a| bs58::encode(a).into_string())
            .collect();
        let result: ContextWrapped<ProofValue> = self
            .call(
                "getValidityProof",
                json!({
                    "hashes": hashes,
                    "newAddresses": new_addresses,
                    "newAddressesWithTrees": [],
                }),
            )
            .await?;

        let parts = &result.value.compressed_proof;
        let proof = ValidityProof {
            a: fixed::<32>("validity proof 'a'", &parts.a)?,
            b: fixed::<64>("validity proof 'b'", &parts.b)?,
            c: fixed::<32>("validity proof 'c'", &parts.c)?,
        };
        let root_indices = result
            .value
            .root_indices
            .iter()
            .map(|&i| {
                u16::try_from(i)
                    .map_err(|_| LedgerError::CustomError(format!("root index {i} exceeds u16")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ValidityProofWithContext {
            proof,
            root_indices,
        })
    }
}

#[async_trait]
impl Indexer for PhotonIndexer {
    async fn query_by_owner(&self, owner: &Pubkey) -> Result<Vec<IndexedEntry>, LedgerError> {
        let mut entries = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page: ContextWrapped<AccountPage> = self
                .call(
                    "getCompressedAccountsByOwner",
                    json!({
                        "owner": owner.to_string(),
                        "cursor": cursor,
                        "limit": PAGE_LIMIT,
                    }),
                )
                .await?;

            let page = page.value;
            debug!(items = page.items.len(), "Fetched compressed account page");
            for item in page.items {
                let hash = item.hash.clone();
                match item.into_entry() {
                    Ok(Some(entry)) => entries.push(entry),
                    Ok(None) => {}
                    Err(e) => warn!(%hash, error = %e, "Skipping unparseable compressed account"),
                }
            }

            match page.cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(json: serde_json::Value) -> AccountItem {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn separate_discriminator_is_prepended() {
        let hash = bs58::encode([7u8; 32]).into_string();
        let entry = item(json!({
            "hash": hash,
            "address": null,
            "data": { "data": STANDARD.encode([1u8, 2, 3]), "discriminator": 0x0807060504030201u64 },
            "tree": null,
            "leafIndex": 12,
        }))
        .into_entry()
        .unwrap()
        .unwrap();

        assert_eq!(entry.data, vec![1, 2, 3, 4, 5, 6, 7, 8, 1, 2, 3]);
        assert_eq!(entry.hash, [7u8; 32]);
        assert_eq!(entry.leaf_index, 12);
        assert_eq!(entry.address, None);
    }

    #[test]
    fn inline_discriminator_is_kept() {
        let entry = item(json!({
            "hash": bs58::encode([1u8; 32]).into_string(),
            "address": Pubkey::new_from_array([2; 32]).to_string(),
            "data": { "data": STANDARD.encode([9u8; 10]) },
            "tree": Pubkey::new_from_array([3; 32]).to_string(),
        }))
        .into_entry()
        .unwrap()
        .unwrap();

        assert_eq!(entry.data, vec![9u8; 10]);
        assert_eq!(entry.address, Some([2; 32]));
        assert_eq!(entry.tree, Some(Pubkey::new_from_array([3; 32])));
    }

    #[test]
    fn rejects_short_hash_and_skips_dataless_accounts() {
        let bad = item(json!({
            "hash": bs58::encode([1u8; 31]).into_string(),
            "data": { "data": "" },
        }));
        assert!(bad.into_entry().is_err());

        let empty = item(json!({ "hash": bs58::encode([1u8; 32]).into_string() }));
        assert_eq!(empty.into_entry().unwrap(), None);
    }
}
