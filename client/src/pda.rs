//! Program-derived address derivation for every coordinator account.
//!
//! Seed order and width are part of the on-chain contract: ids are always
//! 8-byte little-endian, and a reordered or resized seed yields an address no
//! real account lives at.

use solana_sdk::pubkey::Pubkey;

use crate::ProtocolGeneration;
use crate::error::DerivationError;

/// Maximum seeds accepted by the runtime, counting the bump.
pub const MAX_SEEDS: usize = 16;
/// Maximum length of a single seed.
pub const MAX_SEED_LEN: usize = 32;

pub mod seeds {
    pub const LEGACY_CONFIG: &[u8] = b"vrf-config";
    pub const COORDINATOR_CONFIG: &[u8] = b"coordinator-config";
    pub const SUBSCRIPTION: &[u8] = b"subscription";
    pub const CONSUMER: &[u8] = b"consumer";
    pub const LEGACY_REQUEST: &[u8] = b"request";
    pub const SUBSCRIPTION_REQUEST: &[u8] = b"vrf-request";
}

/// Derive `(address, bump)` for `seeds` under `program_id`.
///
/// Searches bumps from 255 down to 0 for the first combination that lands
/// off the ed25519 curve. Failing to find one is fatal for the caller.
pub fn derive(seeds: &[&[u8]], program_id: &Pubkey) -> Result<(Pubkey, u8), DerivationError> {
    if seeds.len() >= MAX_SEEDS {
        return Err(DerivationError::TooManySeeds {
            count: seeds.len(),
            max: MAX_SEEDS - 1,
        });
    }
    if let Some((index, seed)) = seeds.iter().enumerate().find(|(_, s)| s.len() > MAX_SEED_LEN) {
        return Err(DerivationError::SeedTooLong {
            index,
            len: seed.len(),
            max: MAX_SEED_LEN,
        });
    }

    Pubkey::try_find_program_address(seeds, program_id).ok_or(DerivationError::NoValidBump {
        program_id: *program_id,
    })
}

/// Singleton configuration account for `generation`.
pub fn config_address(
    program_id: &Pubkey,
    generation: ProtocolGeneration,
) -> Result<(Pubkey, u8), DerivationError> {
    let seed = match generation {
        ProtocolGeneration::Legacy => seeds::LEGACY_CONFIG,
        ProtocolGeneration::Subscription => seeds::COORDINATOR_CONFIG,
    };
    derive(&[seed], program_id)
}

pub fn subscription_address(
    program_id: &Pubkey,
    subscription_id: u64,
) -> Result<(Pubkey, u8), DerivationError> {
    derive(&[seeds::SUBSCRIPTION, &subscription_id.to_le_bytes()], program_id)
}

pub fn consumer_registration_address(
    program_id: &Pubkey,
    subscription_id: u64,
    consumer_program: &Pubkey,
) -> Result<(Pubkey, u8), DerivationError> {
    derive(
        &[
            seeds::CONSUMER,
            &subscription_id.to_le_bytes(),
            consumer_program.as_ref(),
        ],
        program_id,
    )
}

/// Request account for `request_id`; the seed prefix differs per generation.
pub fn request_address(
    program_id: &Pubkey,
    generation: ProtocolGeneration,
    request_id: u64,
) -> Result<(Pubkey, u8), DerivationError> {
    let prefix = match generation {
        ProtocolGeneration::Legacy => seeds::LEGACY_REQUEST,
        ProtocolGeneration::Subscription => seeds::SUBSCRIPTION_REQUEST,
    };
    derive(&[prefix, &request_id.to_le_bytes()], program_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn program() -> Pubkey {
        Pubkey::from_str("A4pDDsKvtX2U3jyEURVSoH15Mx4JcgUiSqCKxqWE3N48").unwrap()
    }

    fn consumer() -> Pubkey {
        Pubkey::from_str("7Q5b9aimnHmR8ooooRqxgfYfnLmPi6qrVR9GrJ1b6fDp").unwrap()
    }

    fn key(s: &str) -> Pubkey {
        Pubkey::from_str(s).unwrap()
    }

    #[test]
    fn config_addresses_match_fixed_vectors() {
        assert_eq!(
            config_address(&program(), ProtocolGeneration::Legacy).unwrap(),
            (key("CkwhKWiJL5MvEMpHVGxd73gBTRF5h5uJByANsS5iBuod"), 255)
        );
        assert_eq!(
            config_address(&program(), ProtocolGeneration::Subscription).unwrap(),
            (key("JZ3HzPN2HMuiN8XGupP1Fi3icczWegrjygVxEiQuBDK"), 254)
        );
    }

    #[test]
    fn subscription_and_consumer_match_fixed_vectors() {
        assert_eq!(
            subscription_address(&program(), 0).unwrap(),
            (key("5eHNLFraouPc3ceSqQSScVGnvzXVSAUXyad7tiLYPi1N"), 254)
        );
        assert_eq!(
            subscription_address(&program(), 7).unwrap(),
            (key("E4KKBSkHAPsTLDxJAwrjUHswubWfpFqxSwboGZUGUSGT"), 255)
        );
        assert_eq!(
            consumer_registration_address(&program(), 7, &consumer()).unwrap(),
            (key("EFNX9UgY3QhMKRRhbe9yzfQHi5HosoL2mrCa4JzJUjBV"), 252)
        );
    }

    #[test]
    fn request_addresses_match_fixed_vectors() {
        assert_eq!(
            request_address(&program(), ProtocolGeneration::Legacy, 0).unwrap(),
            (key("5vgRAaisbi3SedUUnePBt6F6tNwBrjDQz34jyXba67XR"), 254)
        );
        assert_eq!(
            request_address(&program(), ProtocolGeneration::Legacy, 42).unwrap(),
            (key("HUJhngjHKy7WiGvJj6suyx9tHkgUkLhFHm5NAPT3zewP"), 253)
        );
        assert_eq!(
            request_address(&program(), ProtocolGeneration::Subscription, 42).unwrap(),
            (key("G1v3C5XUsDDpUknXhkBGE9w22wjyySo54AscD7y9Ynso"), 254)
        );
    }

    #[test]
    fn seed_order_and_width_change_the_address() {
        let (expected, _) = consumer_registration_address(&program(), 7, &consumer()).unwrap();
        let (swapped, _) = derive(
            &[seeds::CONSUMER, consumer().as_ref(), &7u64.to_le_bytes()],
            &program(),
        )
        .unwrap();
        assert_eq!(swapped, key("5h3DmS91gqaLBVfnhkVft6QXMvq35WCsacyTsyQht1CA"));
        assert_ne!(swapped, expected);

        let (big_endian, _) =
            derive(&[seeds::SUBSCRIPTION_REQUEST, &42u64.to_be_bytes()], &program()).unwrap();
        assert_eq!(big_endian, key("DSHtTbaUWmFDxhTmHwgVCnMdGLQdaGkuUEctQ7pyhWdN"));
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = request_address(&program(), ProtocolGeneration::Subscription, 9).unwrap();
        let b = request_address(&program(), ProtocolGeneration::Subscription, 9).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_oversized_seeds() {
        let long = [0u8; 33];
        assert_eq!(
            derive(&[b"ok", &long], &program()),
            Err(DerivationError::SeedTooLong {
                index: 1,
                len: 33,
                max: MAX_SEED_LEN
            })
        );

        let seed: &[u8] = b"x";
        let many = vec![seed; MAX_SEEDS];
        assert_eq!(
            derive(&many, &program()),
            Err(DerivationError::TooManySeeds {
                count: MAX_SEEDS,
                max: MAX_SEEDS - 1
            })
        );
    }
}
