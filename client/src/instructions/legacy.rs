//! Legacy generation: per-request fees paid to a treasury and an explicit
//! `request -> fulfill -> consume -> close` lifecycle.

use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;

use super::{instructions_sysvar, payload, require_non_zero, seed_from_slice, system_program};
use crate::ProtocolGeneration;
use crate::discriminator::instruction as disc;
use crate::error::Result;
use crate::pda;

/// Fields to change in [`update_config`]; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyConfigUpdate {
    pub authority: Option<Pubkey>,
    pub fee: Option<u64>,
    pub treasury: Option<Pubkey>,
    pub admin: Option<Pubkey>,
}

fn config(program_id: &Pubkey) -> Result<Pubkey> {
    Ok(pda::config_address(program_id, ProtocolGeneration::Legacy)?.0)
}

fn request(program_id: &Pubkey, request_id: u64) -> Result<Pubkey> {
    Ok(pda::request_address(program_id, ProtocolGeneration::Legacy, request_id)?.0)
}

pub fn initialize(
    program_id: &Pubkey,
    admin: &Pubkey,
    authority: &Pubkey,
    treasury: &Pubkey,
    fee: u64,
) -> Result<Instruction> {
    require_non_zero("authority", authority)?;
    let mut data = payload(disc::INITIALIZE, 8);
    data.u64(fee);

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*admin, true),
            AccountMeta::new_readonly(*authority, false),
            AccountMeta::new_readonly(*treasury, false),
            AccountMeta::new(config(program_id)?, false),
            system_program(),
        ],
        data: data.into_inner(),
    })
}

/// Request randomness for `request_id`, which must be the config's current
/// `request_counter` at execution time.
pub fn request_randomness(
    program_id: &Pubkey,
    requester: &Pubkey,
    treasury: &Pubkey,
    request_id: u64,
    seed: &[u8],
) -> Result<Instruction> {
    let seed = seed_from_slice(seed)?;
    let mut data = payload(disc::REQUEST_RANDOMNESS, 32);
    data.bytes(&seed);

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*requester, true),
            AccountMeta::new(config(program_id)?, false),
            AccountMeta::new(request(program_id, request_id)?, false),
            AccountMeta::new(*treasury, false),
            system_program(),
        ],
        data: data.into_inner(),
    })
}

/// Like [`request_randomness`] but records `callback_program` on the request.
pub fn request_randomness_with_callback(
    program_id: &Pubkey,
    requester: &Pubkey,
    treasury: &Pubkey,
    callback_program: &Pubkey,
    request_id: u64,
    seed: &[u8],
) -> Result<Instruction> {
    let seed = seed_from_slice(seed)?;
    require_non_zero("callback_program", callback_program)?;
    let mut data = payload(disc::REQUEST_RANDOMNESS_WITH_CALLBACK, 32);
    data.bytes(&seed);

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*requester, true),
            AccountMeta::new(config(program_id)?, false),
            AccountMeta::new(request(program_id, request_id)?, false),
            AccountMeta::new(*treasury, false),
            AccountMeta::new_readonly(*callback_program, false),
            system_program(),
        ],
        data: data.into_inner(),
    })
}

/// Oracle-side fulfillment. Must be preceded in the same transaction by an
/// Ed25519 verify instruction over `request_id || randomness`
/// (see [`crate::proof`]).
pub fn fulfill_randomness(
    program_id: &Pubkey,
    authority: &Pubkey,
    request_id: u64,
    randomness: &[u8; 32],
) -> Result<Instruction> {
    let mut data = payload(disc::FULFILL_RANDOMNESS, 8 + 32);
    data.u64(request_id).bytes(randomness);

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*authority, true),
            AccountMeta::new_readonly(config(program_id)?, false),
            AccountMeta::new(request(program_id, request_id)?, false),
            instructions_sysvar(),
        ],
        data: data.into_inner(),
    })
}

pub fn consume_randomness(
    program_id: &Pubkey,
    requester: &Pubkey,
    request_id: u64,
) -> Result<Instruction> {
    let mut data = payload(disc::CONSUME_RANDOMNESS, 8);
    data.u64(request_id);

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*requester, true),
            AccountMeta::new(request(program_id, request_id)?, false),
        ],
        data: data.into_inner(),
    })
}

/// Close a consumed request, refunding rent to `requester`.
pub fn close_request(program_id: &Pubkey, requester: &Pubkey, request_id: u64) -> Result<Instruction> {
    let mut data = payload(disc::CLOSE_REQUEST, 8);
    data.u64(request_id);

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*requester, true),
            AccountMeta::new(request(program_id, request_id)?, false),
        ],
        data: data.into_inner(),
    })
}

pub fn update_config(
    program_id: &Pubkey,
    admin: &Pubkey,
    update: &LegacyConfigUpdate,
) -> Result<Instruction> {
    if let Some(authority) = &update.authority {
        require_non_zero("authority", authority)?;
    }
    if let Some(new_admin) = &update.admin {
        require_non_zero("admin", new_admin)?;
    }

    let mut data = payload(disc::UPDATE_CONFIG, 4 + 32 * 3 + 8);
    data.option(update.authority.as_ref(), |w, k| {
        w.pubkey(k);
    })
    .option(update.fee, |w, fee| {
        w.u64(fee);
    })
    .option(update.treasury.as_ref(), |w, k| {
        w.pubkey(k);
    })
    .option(update.admin.as_ref(), |w, k| {
        w.pubkey(k);
    });

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*admin, true),
            AccountMeta::new(config(program_id)?, false),
        ],
        data: data.into_inner(),
    })
}
