//! Compressed requests: rent-free records in a Light Protocol state tree,
//! fee-charged through the legacy configuration.
//!
//! The Light accounts (system program, CPI authority, trees, queues) are
//! packed by the caller and appended verbatim; the tree/queue indices in the
//! arguments refer to positions within that packed tail.

use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;

use super::{instructions_sysvar, payload, system_program};
use crate::ProtocolGeneration;
use crate::codec::{AccountLayout, ByteWriter};
use crate::discriminator::instruction as disc;
use crate::error::Result;
use crate::pda;
use crate::state::CompressedRandomnessRequest;

/// Groth16 validity proof as returned by the indexer's `getValidityProof`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityProof {
    pub a: [u8; 32],
    pub b: [u8; 64],
    pub c: [u8; 32],
}

impl Default for ValidityProof {
    fn default() -> Self {
        Self {
            a: [0; 32],
            b: [0; 64],
            c: [0; 32],
        }
    }
}

impl ValidityProof {
    fn write(&self, w: &mut ByteWriter) {
        w.bytes(&self.a).bytes(&self.b).bytes(&self.c);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NewAddressParamsPacked {
    pub seed: [u8; 32],
    pub address_queue_account_index: u8,
    pub address_merkle_tree_account_index: u8,
    pub address_merkle_tree_root_index: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueIndex {
    pub queue_id: u8,
    pub index: u16,
}

/// Position of an existing compressed account in its state tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PackedMerkleContext {
    pub merkle_tree_pubkey_index: u8,
    pub nullifier_queue_pubkey_index: u8,
    pub leaf_index: u32,
    /// Only set for batched trees.
    pub queue_index: Option<QueueIndex>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedRequestArgs {
    pub seed: [u8; 32],
    pub proof: ValidityProof,
    pub new_address_params: NewAddressParamsPacked,
    pub output_state_tree_index: u8,
    /// Hash of the new record, computed off-chain.
    pub data_hash: [u8; 32],
    pub address: [u8; 32],
    pub remaining_accounts: Vec<AccountMeta>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedFulfillArgs {
    pub request_id: u64,
    pub randomness: [u8; 32],
    pub proof: ValidityProof,
    pub merkle_context: PackedMerkleContext,
    pub root_index: u16,
    /// The record as currently indexed; it is nullified and replaced.
    pub current: CompressedRandomnessRequest,
    pub input_data_hash: [u8; 32],
    pub address: [u8; 32],
    pub output_state_tree_index: u8,
    pub output_data_hash: [u8; 32],
    pub remaining_accounts: Vec<AccountMeta>,
}

fn config(program_id: &Pubkey) -> Result<Pubkey> {
    Ok(pda::config_address(program_id, ProtocolGeneration::Legacy)?.0)
}

pub fn request_randomness_compressed(
    program_id: &Pubkey,
    requester: &Pubkey,
    treasury: &Pubkey,
    args: &CompressedRequestArgs,
) -> Result<Instruction> {
    let mut data = payload(disc::REQUEST_RANDOMNESS_COMPRESSED, 32 + 128 + 36 + 1 + 64);
    data.bytes(&args.seed);
    args.proof.write(&mut data);
    let params = &args.new_address_params;
    data.bytes(&params.seed)
        .u8(params.address_queue_account_index)
        .u8(params.address_merkle_tree_account_index)
        .u16(params.address_merkle_tree_root_index)
        .u8(args.output_state_tree_index)
        .bytes(&args.data_hash)
        .bytes(&args.address);

    let mut accounts = vec![
        AccountMeta::new(*requester, true),
        AccountMeta::new(config(program_id)?, false),
        AccountMeta::new(*treasury, false),
        system_program(),
    ];
    accounts.extend_from_slice(&args.remaining_accounts);

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: data.into_inner(),
    })
}

pub fn fulfill_randomness_compressed(
    program_id: &Pubkey,
    authority: &Pubkey,
    args: &CompressedFulfillArgs,
) -> Result<Instruction> {
    let mut data = payload(
        disc::FULFILL_RANDOMNESS_COMPRESSED,
        8 + 32 + 128 + 10 + 2 + CompressedRandomnessRequest::LEN + 32 * 3 + 1,
    );
    data.u64(args.request_id).bytes(&args.randomness);
    args.proof.write(&mut data);
    let ctx = &args.merkle_context;
    data.u8(ctx.merkle_tree_pubkey_index)
        .u8(ctx.nullifier_queue_pubkey_index)
        .u32(ctx.leaf_index)
        .option(ctx.queue_index, |w, q| {
            w.u8(q.queue_id).u16(q.index);
        })
        .u16(args.root_index);
    args.current.write_body(&mut data);
    data.bytes(&args.input_data_hash)
        .bytes(&args.address)
        .u8(args.output_state_tree_index)
        .bytes(&args.output_data_hash);

    let mut accounts = vec![
        AccountMeta::new(*authority, true),
        AccountMeta::new_readonly(config(program_id)?, false),
        instructions_sysvar(),
    ];
    accounts.extend_from_slice(&args.remaining_accounts);

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: data.into_inner(),
    })
}
