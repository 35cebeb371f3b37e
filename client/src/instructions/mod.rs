//! Instruction builders for every coordinator operation.
//!
//! Builders are pure: they validate arguments, derive the PDAs they reference
//! and encode `discriminator || args`. Account order and writability are
//! positional on-chain and must not be rearranged.

pub mod compressed;
pub mod legacy;
pub mod subscription;

use solana_sdk::instruction::AccountMeta;
use solana_sdk::pubkey::Pubkey;

use crate::codec::ByteWriter;
use crate::discriminator::Discriminator;
use crate::error::ArgumentError;

/// The native system program (`11111111111111111111111111111111`).
pub const SYSTEM_PROGRAM_ID: Pubkey = Pubkey::new_from_array([0; 32]);

pub const SEED_LEN: usize = 32;

/// Validate a caller-supplied seed.
pub fn seed_from_slice(seed: &[u8]) -> Result<[u8; SEED_LEN], ArgumentError> {
    <[u8; SEED_LEN]>::try_from(seed).map_err(|_| ArgumentError::WrongLength {
        name: "seed",
        expected: SEED_LEN,
        actual: seed.len(),
    })
}

pub(crate) fn require_non_zero(name: &'static str, key: &Pubkey) -> Result<(), ArgumentError> {
    if *key == Pubkey::default() {
        return Err(ArgumentError::ZeroAddress { name });
    }
    Ok(())
}

pub(crate) fn payload(discriminator: Discriminator, args_len: usize) -> ByteWriter {
    let mut w = ByteWriter::with_capacity(discriminator.len() + args_len);
    w.bytes(&discriminator);
    w
}

pub(crate) fn system_program() -> AccountMeta {
    AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false)
}

pub(crate) fn instructions_sysvar() -> AccountMeta {
    AccountMeta::new_readonly(solana_sdk::sysvar::instructions::ID, false)
}
