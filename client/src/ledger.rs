//! The ledger collaborator: account reads and transaction submission.
//!
//! Retry policy for transient failures belongs to implementations of
//! [`LedgerQuery`]; callers treat any [`LedgerError`] as terminal for the
//! current call.

use std::sync::Arc;

use async_trait::async_trait;
use solana_client::client_error::ClientError;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::transaction::TransactionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("ClientError: {0}")]
    ClientError(#[from] Box<ClientError>),

    #[error("TransactionError: {0}")]
    TransactionError(#[from] Box<TransactionError>),

    #[error("indexer error {code}: {message}")]
    Indexer { code: i64, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Error: `{0}`")]
    CustomError(String),
}

impl From<ClientError> for LedgerError {
    fn from(err: ClientError) -> Self {
        LedgerError::ClientError(Box::new(err))
    }
}

impl From<TransactionError> for LedgerError {
    fn from(err: TransactionError) -> Self {
        LedgerError::TransactionError(Box::new(err))
    }
}

/// Effects of an executed transaction that the client reads back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub signature: Signature,
    pub slot: u64,
    /// Program log lines, used to recover emitted events.
    pub logs: Vec<String>,
}

#[async_trait]
pub trait LedgerQuery: Send + Sync {
    /// Raw account data, or `None` if no account exists at `address`.
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError>;

    /// Execute `instructions` atomically in one transaction. The first
    /// signer pays fees.
    async fn submit(
        &self,
        instructions: &[Instruction],
        signers: &[&Keypair],
    ) -> Result<ExecutionResult, LedgerError>;
}

#[async_trait]
impl<T: LedgerQuery + ?Sized> LedgerQuery for Arc<T> {
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError> {
        (**self).get_account(address).await
    }

    async fn submit(
        &self,
        instructions: &[Instruction],
        signers: &[&Keypair],
    ) -> Result<ExecutionResult, LedgerError> {
        (**self).submit(instructions, signers).await
    }
}
