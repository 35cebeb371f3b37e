//! Error taxonomy for the VRF client.
//!
//! Decode, derivation and argument errors are raised immediately and never
//! retried. Lifecycle errors name the state that was violated. Ledger and
//! indexer failures are passed through opaquely as [`LedgerError`].

use std::time::Duration;

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::state::RequestStatus;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{kind}: account data too short, expected {expected} bytes, got {actual}")]
    TooShort {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{kind}: wrong discriminator, expected {expected:?}, got {actual:?}")]
    WrongDiscriminator {
        kind: &'static str,
        expected: [u8; 8],
        actual: [u8; 8],
    },

    #[error("{kind}: invalid status byte {value}")]
    InvalidStatus { kind: &'static str, value: u8 },

    #[error("{kind}: {count} callback accounts exceeds the maximum of {max}")]
    InvalidCallbackCount {
        kind: &'static str,
        count: u8,
        max: usize,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DerivationError {
    #[error("no valid bump found for seeds under program {program_id}")]
    NoValidBump { program_id: Pubkey },

    #[error("seed {index} is {len} bytes, maximum is {max}")]
    SeedTooLong { index: usize, len: usize, max: usize },

    #[error("{count} seeds supplied, maximum is {max}")]
    TooManySeeds { count: usize, max: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("{name} must be exactly {expected} bytes, got {actual}")]
    WrongLength {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{name} = {value} is outside {min}..={max}")]
    OutOfRange {
        name: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("{name} must not be the zero address")]
    ZeroAddress { name: &'static str },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("request {request_id} is {actual}, expected {expected}")]
    WrongState {
        request_id: u64,
        expected: RequestStatus,
        actual: RequestStatus,
    },

    #[error("{operation} is only available under the {required} generation")]
    UnsupportedGeneration {
        operation: &'static str,
        required: &'static str,
    },

    #[error("subscription {subscription_id} balance {available} is below the required fee {required}")]
    InsufficientBalance {
        subscription_id: u64,
        required: u64,
        available: u64,
    },

    #[error("consumer {consumer_program} is not registered on subscription {subscription_id}")]
    ConsumerNotRegistered {
        subscription_id: u64,
        consumer_program: Pubkey,
    },

    #[error("subscription {subscription_id} still has {consumer_count} registered consumers")]
    SubscriptionHasConsumers {
        subscription_id: u64,
        consumer_count: u32,
    },

    #[error("request {request_id} was closed before its randomness could be read")]
    RequestClosed { request_id: u64 },
}

/// Top-level error returned by every fallible client operation.
#[derive(Error, Debug)]
pub enum VrfClientError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Derivation(#[from] DerivationError),

    #[error(transparent)]
    Argument(#[from] ArgumentError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("{what} not found at {address}")]
    NotFound { what: &'static str, address: Pubkey },

    #[error("request {request_id} not fulfilled after {attempts} polls over {elapsed:?}")]
    Timeout {
        request_id: u64,
        elapsed: Duration,
        attempts: u32,
    },

    #[error(transparent)]
    Network(#[from] LedgerError),
}

impl VrfClientError {
    /// True for errors that describe a violated request lifecycle.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, VrfClientError::Lifecycle(_))
    }
}

pub type Result<T, E = VrfClientError> = std::result::Result<T, E>;
