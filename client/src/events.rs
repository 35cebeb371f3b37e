//! Coordinator events decoded from transaction logs.
//!
//! Anchor emits events as `Program data: <base64>` log lines whose payload is
//! `discriminator (8) || borsh body`. Lines from other programs or with an
//! unknown discriminator are skipped.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::codec::{ByteReader, ByteWriter, DISCRIMINATOR_LEN};
use crate::discriminator::{Discriminator, event};

const LOG_PREFIX: &str = "Program data: ";

/// Emitted by `request_randomness`, `request_randomness_with_callback` and
/// `request_randomness_compressed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomnessRequested {
    pub request_id: u64,
    pub requester: Pubkey,
    pub seed: [u8; 32],
    pub request_slot: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomWordsRequested {
    pub request_id: u64,
    pub subscription_id: u64,
    pub consumer_program: Pubkey,
    pub requester: Pubkey,
    pub num_words: u32,
    pub seed: [u8; 32],
    pub request_slot: u64,
    pub callback_compute_limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomnessFulfilled {
    pub request_id: u64,
    pub randomness: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomWordsFulfilled {
    pub request_id: u64,
    pub randomness: [u8; 32],
    pub consumer_program: Pubkey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramEvent {
    RandomnessRequested(RandomnessRequested),
    CompressedRandomnessRequested(RandomnessRequested),
    RandomWordsRequested(RandomWordsRequested),
    RandomnessFulfilled(RandomnessFulfilled),
    RandomWordsFulfilled(RandomWordsFulfilled),
}

impl ProgramEvent {
    pub fn request_id(&self) -> u64 {
        match self {
            ProgramEvent::RandomnessRequested(e) | ProgramEvent::CompressedRandomnessRequested(e) => {
                e.request_id
            }
            ProgramEvent::RandomWordsRequested(e) => e.request_id,
            ProgramEvent::RandomnessFulfilled(e) => e.request_id,
            ProgramEvent::RandomWordsFulfilled(e) => e.request_id,
        }
    }

    fn discriminator(&self) -> Discriminator {
        match self {
            ProgramEvent::RandomnessRequested(_) => event::RANDOMNESS_REQUESTED,
            ProgramEvent::CompressedRandomnessRequested(_) => event::COMPRESSED_RANDOMNESS_REQUESTED,
            ProgramEvent::RandomWordsRequested(_) => event::RANDOM_WORDS_REQUESTED,
            ProgramEvent::RandomnessFulfilled(_) => event::RANDOMNESS_FULFILLED,
            ProgramEvent::RandomWordsFulfilled(_) => event::RANDOM_WORDS_FULFILLED,
        }
    }

    /// Decode `discriminator || body`. Returns `None` for unknown or
    /// truncated payloads.
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < DISCRIMINATOR_LEN {
            return None;
        }
        let (disc, body) = data.split_at(DISCRIMINATOR_LEN);
        let disc: Discriminator = disc.try_into().ok()?;

        let event = match disc {
            event::RANDOMNESS_REQUESTED => {
                ProgramEvent::RandomnessRequested(read_requested(reader(body, 80)?))
            }
            event::COMPRESSED_RANDOMNESS_REQUESTED => {
                ProgramEvent::CompressedRandomnessRequested(read_requested(reader(body, 80)?))
            }
            event::RANDOM_WORDS_REQUESTED => {
                let mut r = reader(body, 128)?;
                ProgramEvent::RandomWordsRequested(RandomWordsRequested {
                    request_id: r.u64(),
                    subscription_id: r.u64(),
                    consumer_program: r.pubkey(),
                    requester: r.pubkey(),
                    num_words: r.u32(),
                    seed: r.array(),
                    request_slot: r.u64(),
                    callback_compute_limit: r.u32(),
                })
            }
            event::RANDOMNESS_FULFILLED => {
                let mut r = reader(body, 40)?;
                ProgramEvent::RandomnessFulfilled(RandomnessFulfilled {
                    request_id: r.u64(),
                    randomness: r.array(),
                })
            }
            event::RANDOM_WORDS_FULFILLED => {
                let mut r = reader(body, 72)?;
                ProgramEvent::RandomWordsFulfilled(RandomWordsFulfilled {
                    request_id: r.u64(),
                    randomness: r.array(),
                    consumer_program: r.pubkey(),
                })
            }
            _ => return None,
        };
        Some(event)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(DISCRIMINATOR_LEN + 128);
        w.bytes(&self.discriminator());
        match self {
            ProgramEvent::RandomnessRequested(e) | ProgramEvent::CompressedRandomnessRequested(e) => {
                w.u64(e.request_id)
                    .pubkey(&e.requester)
                    .bytes(&e.seed)
                    .u64(e.request_slot);
            }
            ProgramEvent::RandomWordsRequested(e) => {
                w.u64(e.request_id)
                    .u64(e.subscription_id)
                    .pubkey(&e.consumer_program)
                    .pubkey(&e.requester)
                    .u32(e.num_words)
                    .bytes(&e.seed)
                    .u64(e.request_slot)
                    .u32(e.callback_compute_limit);
            }
            ProgramEvent::RandomnessFulfilled(e) => {
                w.u64(e.request_id).bytes(&e.randomness);
            }
            ProgramEvent::RandomWordsFulfilled(e) => {
                w.u64(e.request_id)
                    .bytes(&e.randomness)
                    .pubkey(&e.consumer_program);
            }
        }
        w.into_inner()
    }

    /// Render as the log line the runtime would record.
    pub fn to_log_line(&self) -> String {
        format!("{LOG_PREFIX}{}", STANDARD.encode(self.encode()))
    }
}

fn reader(body: &[u8], len: usize) -> Option<ByteReader<'_>> {
    (body.len() >= len).then(|| ByteReader::new(&body[..len]))
}

fn read_requested(mut r: ByteReader<'_>) -> RandomnessRequested {
    RandomnessRequested {
        request_id: r.u64(),
        requester: r.pubkey(),
        seed: r.array(),
        request_slot: r.u64(),
    }
}

/// Decode a single log line, if it carries a known coordinator event.
pub fn parse_log_line(line: &str) -> Option<ProgramEvent> {
    let data = line.strip_prefix(LOG_PREFIX)?;
    let decoded = match STANDARD.decode(data.trim()) {
        Ok(d) => d,
        Err(e) => {
            debug!(error = %e, "Failed to decode base64 log data");
            return None;
        }
    };
    ProgramEvent::decode(&decoded)
}

/// All coordinator events in `logs`, in emission order.
pub fn parse_logs(logs: &[String]) -> Vec<ProgramEvent> {
    logs.iter().filter_map(|line| parse_log_line(line)).collect()
}
