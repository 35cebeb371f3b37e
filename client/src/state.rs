//! Client-side decoders for the coordinator's on-chain accounts.
//!
//! Offsets below are relative to the body, i.e. after the 8-byte
//! discriminator. All integers are little-endian.

use std::fmt;

use solana_sdk::instruction::AccountMeta;
use solana_sdk::pubkey::Pubkey;

use crate::ProtocolGeneration;
use crate::codec::{AccountLayout, ByteReader, ByteWriter};
use crate::discriminator::{Discriminator, account};
use crate::error::DecodeError;

/// Maximum callback accounts a subscription-generation request can carry.
pub const MAX_CALLBACK_ACCOUNTS: usize = 4;

/// Lifecycle status of a randomness request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RequestStatus {
    Pending,
    Fulfilled,
    /// Legacy generation only.
    Consumed,
}

impl RequestStatus {
    pub fn as_u8(self) -> u8 {
        match self {
            RequestStatus::Pending => 0,
            RequestStatus::Fulfilled => 1,
            RequestStatus::Consumed => 2,
        }
    }

    fn from_u8(kind: &'static str, value: u8, allow_consumed: bool) -> Result<Self, DecodeError> {
        match value {
            0 => Ok(RequestStatus::Pending),
            1 => Ok(RequestStatus::Fulfilled),
            2 if allow_consumed => Ok(RequestStatus::Consumed),
            _ => Err(DecodeError::InvalidStatus { kind, value }),
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestStatus::Pending => "Pending",
            RequestStatus::Fulfilled => "Fulfilled",
            RequestStatus::Consumed => "Consumed",
        };
        f.write_str(name)
    }
}

/// Legacy-generation configuration singleton.
///
/// Seeds: `["vrf-config"]`
///
/// ```text
/// admin            0..32
/// authority        32..64
/// fee              64..72
/// request_counter  72..80
/// treasury         80..112
/// bump             112
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyConfig {
    pub admin: Pubkey,
    /// Oracle key whose Ed25519 signature must accompany fulfillment.
    pub authority: Pubkey,
    /// Flat fee in lamports charged per request.
    pub fee: u64,
    pub request_counter: u64,
    /// Receives request fees.
    pub treasury: Pubkey,
    pub bump: u8,
}

impl AccountLayout for LegacyConfig {
    const KIND: &'static str = "VrfConfiguration";
    const DISCRIMINATOR: Discriminator = account::VRF_CONFIGURATION;
    const LEN: usize = 32 + 32 + 8 + 32 + 8 + 1;

    fn read_body(r: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            admin: r.pubkey(),
            authority: r.pubkey(),
            fee: r.u64(),
            request_counter: r.u64(),
            treasury: r.pubkey(),
            bump: r.u8(),
        })
    }

    fn write_body(&self, w: &mut ByteWriter) {
        w.pubkey(&self.admin)
            .pubkey(&self.authority)
            .u64(self.fee)
            .u64(self.request_counter)
            .pubkey(&self.treasury)
            .u8(self.bump);
    }
}

/// Subscription-generation configuration singleton.
///
/// Seeds: `["coordinator-config"]`
///
/// ```text
/// admin                 0..32
/// authority             32..64
/// fee_per_word          64..72
/// max_num_words         72..76
/// request_counter       76..84
/// subscription_counter  84..92
/// bump                  92
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Privileged key that may update this configuration.
    pub admin: Pubkey,
    /// Ed25519 public key of the off-chain oracle that signs VRF proofs.
    pub authority: Pubkey,
    /// Fee (in lamports) charged per random word requested.
    pub fee_per_word: u64,
    /// Maximum number of random words a consumer may request at once.
    pub max_num_words: u32,
    pub request_counter: u64,
    pub subscription_counter: u64,
    pub bump: u8,
}

impl CoordinatorConfig {
    /// Total fee for `num_words`, or `None` on overflow.
    pub fn fee_for(&self, num_words: u32) -> Option<u64> {
        self.fee_per_word.checked_mul(num_words as u64)
    }
}

impl AccountLayout for CoordinatorConfig {
    const KIND: &'static str = "CoordinatorConfig";
    const DISCRIMINATOR: Discriminator = account::COORDINATOR_CONFIG;
    const LEN: usize = 32 + 32 + 8 + 4 + 8 + 8 + 1;

    fn read_body(r: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            admin: r.pubkey(),
            authority: r.pubkey(),
            fee_per_word: r.u64(),
            max_num_words: r.u32(),
            request_counter: r.u64(),
            subscription_counter: r.u64(),
            bump: r.u8(),
        })
    }

    fn write_body(&self, w: &mut ByteWriter) {
        w.pubkey(&self.admin)
            .pubkey(&self.authority)
            .u64(self.fee_per_word)
            .u32(self.max_num_words)
            .u64(self.request_counter)
            .u64(self.subscription_counter)
            .u8(self.bump);
    }
}

/// A subscription that holds a lamport balance for paying VRF fees.
///
/// Seeds: `["subscription", id.to_le_bytes()]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: u64,
    pub owner: Pubkey,
    /// Lamports available for fees; only decreases by `fee_per_word * num_words`.
    pub balance: u64,
    pub req_count: u64,
    pub consumer_count: u32,
    pub bump: u8,
}

impl AccountLayout for Subscription {
    const KIND: &'static str = "Subscription";
    const DISCRIMINATOR: Discriminator = account::SUBSCRIPTION;
    const LEN: usize = 8 + 32 + 8 + 8 + 4 + 1;

    fn read_body(r: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            id: r.u64(),
            owner: r.pubkey(),
            balance: r.u64(),
            req_count: r.u64(),
            consumer_count: r.u32(),
            bump: r.u8(),
        })
    }

    fn write_body(&self, w: &mut ByteWriter) {
        w.u64(self.id)
            .pubkey(&self.owner)
            .u64(self.balance)
            .u64(self.req_count)
            .u32(self.consumer_count)
            .u8(self.bump);
    }
}

/// Registration of a consumer program under a subscription.
///
/// Seeds: `["consumer", subscription_id.to_le_bytes(), program_id]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerRegistration {
    pub subscription_id: u64,
    pub program_id: Pubkey,
    pub nonce: u64,
    pub bump: u8,
}

impl AccountLayout for ConsumerRegistration {
    const KIND: &'static str = "ConsumerRegistration";
    const DISCRIMINATOR: Discriminator = account::CONSUMER_REGISTRATION;
    const LEN: usize = 8 + 32 + 8 + 1;

    fn read_body(r: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            subscription_id: r.u64(),
            program_id: r.pubkey(),
            nonce: r.u64(),
            bump: r.u8(),
        })
    }

    fn write_body(&self, w: &mut ByteWriter) {
        w.u64(self.subscription_id)
            .pubkey(&self.program_id)
            .u64(self.nonce)
            .u8(self.bump);
    }
}

/// Legacy-generation request: `Pending -> Fulfilled -> Consumed -> closed`.
///
/// Seeds: `["request", request_id.to_le_bytes()]`
///
/// ```text
/// request_id        0..8
/// requester         8..40
/// seed              40..72
/// request_slot      72..80
/// callback_program  80..112   (zero when requested without callback)
/// status            112
/// randomness        113..145
/// fulfilled_slot    145..153
/// bump              153
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyRandomnessRequest {
    pub request_id: u64,
    pub requester: Pubkey,
    pub seed: [u8; 32],
    pub request_slot: u64,
    pub callback_program: Pubkey,
    pub status: RequestStatus,
    pub randomness: [u8; 32],
    pub fulfilled_slot: u64,
    pub bump: u8,
}

impl LegacyRandomnessRequest {
    /// Offset of the status byte from the start of the account data.
    pub const STATUS_OFFSET: usize = 8 + 112;
}

impl AccountLayout for LegacyRandomnessRequest {
    const KIND: &'static str = "RandomnessRequest(legacy)";
    const DISCRIMINATOR: Discriminator = account::RANDOMNESS_REQUEST;
    const LEN: usize = 8 + 32 + 32 + 8 + 32 + 1 + 32 + 8 + 1;

    fn read_body(r: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let request_id = r.u64();
        let requester = r.pubkey();
        let seed = r.array();
        let request_slot = r.u64();
        let callback_program = r.pubkey();
        let status = RequestStatus::from_u8(Self::KIND, r.u8(), true)?;
        Ok(Self {
            request_id,
            requester,
            seed,
            request_slot,
            callback_program,
            status,
            randomness: r.array(),
            fulfilled_slot: r.u64(),
            bump: r.u8(),
        })
    }

    fn write_body(&self, w: &mut ByteWriter) {
        w.u64(self.request_id)
            .pubkey(&self.requester)
            .bytes(&self.seed)
            .u64(self.request_slot)
            .pubkey(&self.callback_program)
            .u8(self.status.as_u8())
            .bytes(&self.randomness)
            .u64(self.fulfilled_slot)
            .u8(self.bump);
    }
}

/// Subscription-generation request. The coordinator closes it in the same
/// transaction that fulfills it, so `Fulfilled` is rarely observed.
///
/// Seeds: `["vrf-request", request_id.to_le_bytes()]`
///
/// ```text
/// request_id               0..8
/// subscription_id          8..16
/// consumer_program         16..48
/// requester                48..80
/// num_words                80..84
/// seed                     84..116
/// request_slot             116..124
/// callback_compute_limit   124..128
/// status                   128
/// randomness               129..161
/// fulfilled_slot           161..169
/// num_callback_accounts    169
/// callback_accounts        170..298   (4 x 32)
/// callback_writable_bitmap 298
/// bump                     299
/// ```
///
/// Offsets up to 169 match the deployed coordinator. The deployed account
/// stops there with `bump` at 169; the callback tail (169..300) is this
/// client's layout for coordinators that store callback accounts, and no
/// deployed program has been checked against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomnessRequest {
    pub request_id: u64,
    pub subscription_id: u64,
    /// The consumer program that will receive the callback.
    pub consumer_program: Pubkey,
    /// The account that initiated the request (rent refund on close).
    pub requester: Pubkey,
    pub num_words: u32,
    pub seed: [u8; 32],
    pub request_slot: u64,
    /// Compute unit limit for the consumer callback CPI.
    pub callback_compute_limit: u32,
    pub status: RequestStatus,
    /// Base VRF output; individual words are derived with [`crate::vrf::expand_randomness`].
    pub randomness: [u8; 32],
    pub fulfilled_slot: u64,
    pub num_callback_accounts: u8,
    /// Accounts the fulfiller must re-present to the consumer callback.
    pub callback_accounts: [Pubkey; MAX_CALLBACK_ACCOUNTS],
    /// Bit `i` set means `callback_accounts[i]` is writable.
    pub callback_writable_bitmap: u8,
    pub bump: u8,
}

impl RandomnessRequest {
    pub const STATUS_OFFSET: usize = 8 + 128;

    /// The stored callback accounts, in order, with their writability.
    pub fn callback_account_metas(&self) -> Vec<AccountMeta> {
        self.callback_accounts
            .iter()
            .take(self.num_callback_accounts as usize)
            .enumerate()
            .map(|(i, key)| {
                if self.callback_writable_bitmap & (1 << i) != 0 {
                    AccountMeta::new(*key, false)
                } else {
                    AccountMeta::new_readonly(*key, false)
                }
            })
            .collect()
    }
}

impl AccountLayout for RandomnessRequest {
    const KIND: &'static str = "RandomnessRequest";
    const DISCRIMINATOR: Discriminator = account::RANDOMNESS_REQUEST;
    const LEN: usize = 8 + 8 + 32 + 32 + 4 + 32 + 8 + 4 + 1 + 32 + 8 + 1 + 32 * 4 + 1 + 1;

    fn read_body(r: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let request_id = r.u64();
        let subscription_id = r.u64();
        let consumer_program = r.pubkey();
        let requester = r.pubkey();
        let num_words = r.u32();
        let seed = r.array();
        let request_slot = r.u64();
        let callback_compute_limit = r.u32();
        let status = RequestStatus::from_u8(Self::KIND, r.u8(), false)?;
        let randomness = r.array();
        let fulfilled_slot = r.u64();
        let num_callback_accounts = r.u8();
        if num_callback_accounts as usize > MAX_CALLBACK_ACCOUNTS {
            return Err(DecodeError::InvalidCallbackCount {
                kind: Self::KIND,
                count: num_callback_accounts,
                max: MAX_CALLBACK_ACCOUNTS,
            });
        }
        let callback_accounts = [r.pubkey(), r.pubkey(), r.pubkey(), r.pubkey()];
        Ok(Self {
            request_id,
            subscription_id,
            consumer_program,
            requester,
            num_words,
            seed,
            request_slot,
            callback_compute_limit,
            status,
            randomness,
            fulfilled_slot,
            num_callback_accounts,
            callback_accounts,
            callback_writable_bitmap: r.u8(),
            bump: r.u8(),
        })
    }

    fn write_body(&self, w: &mut ByteWriter) {
        w.u64(self.request_id)
            .u64(self.subscription_id)
            .pubkey(&self.consumer_program)
            .pubkey(&self.requester)
            .u32(self.num_words)
            .bytes(&self.seed)
            .u64(self.request_slot)
            .u32(self.callback_compute_limit)
            .u8(self.status.as_u8())
            .bytes(&self.randomness)
            .u64(self.fulfilled_slot)
            .u8(self.num_callback_accounts);
        for key in &self.callback_accounts {
            w.pubkey(key);
        }
        w.u8(self.callback_writable_bitmap).u8(self.bump);
    }
}

/// Compressed randomness request stored in a Light Protocol state tree.
///
/// No bump and no callback metadata; lifecycle is `Pending -> Fulfilled`
/// and the record persists after fulfillment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedRandomnessRequest {
    pub request_id: u64,
    pub requester: Pubkey,
    pub seed: [u8; 32],
    pub request_slot: u64,
    pub status: RequestStatus,
    pub randomness: [u8; 32],
}

impl AccountLayout for CompressedRandomnessRequest {
    const KIND: &'static str = "CompressedRandomnessRequest";
    const DISCRIMINATOR: Discriminator = account::COMPRESSED_RANDOMNESS_REQUEST;
    const LEN: usize = 8 + 32 + 32 + 8 + 1 + 32;

    fn read_body(r: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let request_id = r.u64();
        let requester = r.pubkey();
        let seed = r.array();
        let request_slot = r.u64();
        let status = RequestStatus::from_u8(Self::KIND, r.u8(), false)?;
        Ok(Self {
            request_id,
            requester,
            seed,
            request_slot,
            status,
            randomness: r.array(),
        })
    }

    fn write_body(&self, w: &mut ByteWriter) {
        w.u64(self.request_id)
            .pubkey(&self.requester)
            .bytes(&self.seed)
            .u64(self.request_slot)
            .u8(self.status.as_u8())
            .bytes(&self.randomness);
    }
}

/// Configuration account of either generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigAccount {
    Legacy(LegacyConfig),
    Subscription(CoordinatorConfig),
}

impl ConfigAccount {
    pub fn decode(generation: ProtocolGeneration, data: &[u8]) -> Result<Self, DecodeError> {
        match generation {
            ProtocolGeneration::Legacy => LegacyConfig::decode(data).map(ConfigAccount::Legacy),
            ProtocolGeneration::Subscription => {
                CoordinatorConfig::decode(data).map(ConfigAccount::Subscription)
            }
        }
    }

    pub fn request_counter(&self) -> u64 {
        match self {
            ConfigAccount::Legacy(c) => c.request_counter,
            ConfigAccount::Subscription(c) => c.request_counter,
        }
    }

    pub fn authority(&self) -> Pubkey {
        match self {
            ConfigAccount::Legacy(c) => c.authority,
            ConfigAccount::Subscription(c) => c.authority,
        }
    }
}

/// Request account of either generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestAccount {
    Legacy(LegacyRandomnessRequest),
    Subscription(RandomnessRequest),
}

impl RequestAccount {
    pub fn decode(generation: ProtocolGeneration, data: &[u8]) -> Result<Self, DecodeError> {
        match generation {
            ProtocolGeneration::Legacy => {
                LegacyRandomnessRequest::decode(data).map(RequestAccount::Legacy)
            }
            ProtocolGeneration::Subscription => {
                RandomnessRequest::decode(data).map(RequestAccount::Subscription)
            }
        }
    }

    pub fn request_id(&self) -> u64 {
        match self {
            RequestAccount::Legacy(r) => r.request_id,
            RequestAccount::Subscription(r) => r.request_id,
        }
    }

    pub fn requester(&self) -> Pubkey {
        match self {
            RequestAccount::Legacy(r) => r.requester,
            RequestAccount::Subscription(r) => r.requester,
        }
    }

    pub fn status(&self) -> RequestStatus {
        match self {
            RequestAccount::Legacy(r) => r.status,
            RequestAccount::Subscription(r) => r.status,
        }
    }

    pub fn randomness(&self) -> [u8; 32] {
        match self {
            RequestAccount::Legacy(r) => r.randomness,
            RequestAccount::Subscription(r) => r.randomness,
        }
    }

    pub fn request_slot(&self) -> u64 {
        match self {
            RequestAccount::Legacy(r) => r.request_slot,
            RequestAccount::Subscription(r) => r.request_slot,
        }
    }

    pub fn fulfilled_slot(&self) -> u64 {
        match self {
            RequestAccount::Legacy(r) => r.fulfilled_slot,
            RequestAccount::Subscription(r) => r.fulfilled_slot,
        }
    }
}
