//! Ed25519 proof instruction that must precede a fulfillment.
//!
//! The coordinator verifies the authority's signature by introspecting the
//! native Ed25519 precompile instruction in the same transaction. These
//! helpers are for tests and local tooling; production fulfillment is the
//! oracle's job.

use solana_sdk::ed25519_program;
use solana_sdk::instruction::Instruction;
use solana_sdk::signature::{Keypair, Signer};

/// Length of the signed fulfillment message.
pub const MESSAGE_LEN: usize = 8 + 32;

const SIGNATURE_LEN: usize = 64;
const PUBKEY_LEN: usize = 32;
// num_signatures, padding, then seven u16 offsets
const DATA_START: usize = 2 + 7 * 2;
// Refers to data in this same instruction
const CURRENT_INSTRUCTION: u16 = u16::MAX;

/// `request_id (LE) || randomness`
pub fn fulfillment_message(request_id: u64, randomness: &[u8; 32]) -> [u8; MESSAGE_LEN] {
    let mut message = [0u8; MESSAGE_LEN];
    message[..8].copy_from_slice(&request_id.to_le_bytes());
    message[8..].copy_from_slice(randomness);
    message
}

/// Precompile instruction carrying one signature by `keypair` over `message`.
pub fn build_ed25519_instruction(keypair: &Keypair, message: &[u8]) -> Instruction {
    let signature = keypair.sign_message(message);

    let public_key_offset = DATA_START as u16;
    let signature_offset = (DATA_START + PUBKEY_LEN) as u16;
    let message_offset = (DATA_START + PUBKEY_LEN + SIGNATURE_LEN) as u16;

    let mut data = Vec::with_capacity(DATA_START + PUBKEY_LEN + SIGNATURE_LEN + message.len());
    data.push(1u8);
    data.push(0u8);
    for field in [
        signature_offset,
        CURRENT_INSTRUCTION,
        public_key_offset,
        CURRENT_INSTRUCTION,
        message_offset,
        message.len() as u16,
        CURRENT_INSTRUCTION,
    ] {
        data.extend_from_slice(&field.to_le_bytes());
    }
    data.extend_from_slice(keypair.pubkey().as_ref());
    data.extend_from_slice(signature.as_ref());
    data.extend_from_slice(message);

    Instruction {
        program_id: ed25519_program::id(),
        accounts: vec![],
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_is_id_then_randomness() {
        let message = fulfillment_message(0x0102, &[0xAB; 32]);
        assert_eq!(&message[..8], &[0x02, 0x01, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&message[8..], &[0xAB; 32]);
    }

    #[test]
    fn instruction_layout_points_at_its_own_data() {
        let keypair = Keypair::new();
        let message = fulfillment_message(9, &[7; 32]);
        let ix = build_ed25519_instruction(&keypair, &message);

        assert_eq!(ix.program_id, ed25519_program::id());
        assert!(ix.accounts.is_empty());
        assert_eq!(ix.data.len(), 16 + 32 + 64 + 40);
        assert_eq!(ix.data[0], 1);

        let u16_at = |at: usize| u16::from_le_bytes([ix.data[at], ix.data[at + 1]]);
        assert_eq!(u16_at(2), 48);
        assert_eq!(u16_at(4), u16::MAX);
        assert_eq!(u16_at(6), 16);
        assert_eq!(u16_at(10), 112);
        assert_eq!(u16_at(12), 40);

        assert_eq!(&ix.data[16..48], keypair.pubkey().as_ref());
        let signature = keypair.sign_message(&message);
        assert!(signature.verify(keypair.pubkey().as_ref(), &message));
        assert_eq!(&ix.data[48..112], signature.as_ref());
        assert_eq!(&ix.data[112..], &message);
    }
}
