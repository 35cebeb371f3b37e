//! Client for the VRF coordinator program.
//!
//! Derives the coordinator's PDAs, encodes instructions and decodes accounts
//! byte-for-byte, and tracks a randomness request from submission to
//! fulfillment under either protocol generation:
//!
//! - **Legacy**: per-request fee, `Pending -> Fulfilled -> Consumed -> closed`,
//!   each step a separate transaction.
//! - **Subscription**: pooled balance and registered consumers; fulfillment
//!   delivers a callback and closes the request in one transaction.
//!
//! Compressed requests live in a Light Protocol state tree and are observed
//! through an indexer rather than by address.

use std::fmt;
use std::str::FromStr;

pub mod codec;
pub mod compressed;
pub mod config;
pub mod discriminator;
pub mod error;
pub mod events;
pub mod instructions;
pub mod ledger;
pub mod lifecycle;
pub mod pda;
pub mod photon;
pub mod proof;
pub mod rpc;
pub mod state;
pub mod vrf;
pub mod waiter;

pub use error::{Result, VrfClientError};
pub use ledger::{ExecutionResult, LedgerError, LedgerQuery};
pub use lifecycle::{Absence, LifecycleClient, Observation, RequestHandle, RequestView};
pub use waiter::{FulfillmentWaiter, WaitOutcome};

/// Which on-chain protocol generation a client speaks. Fixed at construction;
/// never inferred from account contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolGeneration {
    Legacy,
    Subscription,
}

impl ProtocolGeneration {
    pub fn as_str(self) -> &'static str {
        match self {
            ProtocolGeneration::Legacy => "legacy",
            ProtocolGeneration::Subscription => "subscription",
        }
    }
}

impl fmt::Display for ProtocolGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolGeneration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(ProtocolGeneration::Legacy),
            "subscription" => Ok(ProtocolGeneration::Subscription),
            other => Err(format!(
                "unknown protocol generation `{other}` (expected `legacy` or `subscription`)"
            )),
        }
    }
}
