//! Subscription generation: pooled fees, registered consumer programs and a
//! single-transaction fulfill + callback + close.

use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;

use super::{instructions_sysvar, payload, require_non_zero, system_program};
use crate::ProtocolGeneration;
use crate::discriminator::instruction as disc;
use crate::error::{ArgumentError, Result};
use crate::pda;
use crate::state::{MAX_CALLBACK_ACCOUNTS, RandomnessRequest};

/// Fields to change in [`update_config`]; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatorConfigUpdate {
    pub authority: Option<Pubkey>,
    pub fee_per_word: Option<u64>,
    pub max_num_words: Option<u32>,
    pub admin: Option<Pubkey>,
}

/// Arguments for [`request_random_words`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomWordsRequest {
    /// Advisory id: the config's `request_counter` as last read.
    pub request_id: u64,
    pub subscription_id: u64,
    pub consumer_program: Pubkey,
    pub num_words: u32,
    pub seed: [u8; 32],
    pub callback_compute_limit: u32,
    /// Accounts the consumer callback needs; stored on the request with
    /// their writability so the fulfiller can re-present them.
    pub callback_accounts: Vec<AccountMeta>,
}

fn config(program_id: &Pubkey) -> Result<Pubkey> {
    Ok(pda::config_address(program_id, ProtocolGeneration::Subscription)?.0)
}

fn subscription(program_id: &Pubkey, subscription_id: u64) -> Result<Pubkey> {
    Ok(pda::subscription_address(program_id, subscription_id)?.0)
}

fn registration(program_id: &Pubkey, subscription_id: u64, consumer: &Pubkey) -> Result<Pubkey> {
    Ok(pda::consumer_registration_address(program_id, subscription_id, consumer)?.0)
}

fn request(program_id: &Pubkey, request_id: u64) -> Result<Pubkey> {
    Ok(pda::request_address(program_id, ProtocolGeneration::Subscription, request_id)?.0)
}

pub fn initialize(
    program_id: &Pubkey,
    admin: &Pubkey,
    authority: &Pubkey,
    fee_per_word: u64,
    max_num_words: u32,
) -> Result<Instruction> {
    require_non_zero("authority", authority)?;
    if max_num_words == 0 {
        return Err(ArgumentError::OutOfRange {
            name: "max_num_words",
            value: 0,
            min: 1,
            max: u32::MAX as u64,
        }
        .into());
    }
    let mut data = payload(disc::INITIALIZE, 8 + 4);
    data.u64(fee_per_word).u32(max_num_words);

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*admin, true),
            AccountMeta::new_readonly(*authority, false),
            AccountMeta::new(config(program_id)?, false),
            system_program(),
        ],
        data: data.into_inner(),
    })
}

/// Create subscription `subscription_id`, which must equal the config's
/// `subscription_counter` when the transaction executes.
pub fn create_subscription(
    program_id: &Pubkey,
    owner: &Pubkey,
    subscription_id: u64,
) -> Result<Instruction> {
    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*owner, true),
            AccountMeta::new(config(program_id)?, false),
            AccountMeta::new(subscription(program_id, subscription_id)?, false),
            system_program(),
        ],
        data: payload(disc::CREATE_SUBSCRIPTION, 0).into_inner(),
    })
}

/// Anyone may fund a subscription.
pub fn fund_subscription(
    program_id: &Pubkey,
    funder: &Pubkey,
    subscription_id: u64,
    amount: u64,
) -> Result<Instruction> {
    let mut data = payload(disc::FUND_SUBSCRIPTION, 16);
    data.u64(subscription_id).u64(amount);

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*funder, true),
            AccountMeta::new(subscription(program_id, subscription_id)?, false),
            system_program(),
        ],
        data: data.into_inner(),
    })
}

pub fn add_consumer(
    program_id: &Pubkey,
    owner: &Pubkey,
    subscription_id: u64,
    consumer_program: &Pubkey,
) -> Result<Instruction> {
    require_non_zero("consumer_program", consumer_program)?;
    let mut data = payload(disc::ADD_CONSUMER, 8);
    data.u64(subscription_id);

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*owner, true),
            AccountMeta::new(subscription(program_id, subscription_id)?, false),
            AccountMeta::new_readonly(*consumer_program, false),
            AccountMeta::new(registration(program_id, subscription_id, consumer_program)?, false),
            system_program(),
        ],
        data: data.into_inner(),
    })
}

pub fn remove_consumer(
    program_id: &Pubkey,
    owner: &Pubkey,
    subscription_id: u64,
    consumer_program: &Pubkey,
) -> Result<Instruction> {
    require_non_zero("consumer_program", consumer_program)?;
    let mut data = payload(disc::REMOVE_CONSUMER, 8);
    data.u64(subscription_id);

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*owner, true),
            AccountMeta::new(subscription(program_id, subscription_id)?, false),
            AccountMeta::new_readonly(*consumer_program, false),
            AccountMeta::new(registration(program_id, subscription_id, consumer_program)?, false),
        ],
        data: data.into_inner(),
    })
}

/// Close a subscription with no consumers, refunding its balance to `owner`.
pub fn cancel_subscription(
    program_id: &Pubkey,
    owner: &Pubkey,
    subscription_id: u64,
) -> Result<Instruction> {
    let mut data = payload(disc::CANCEL_SUBSCRIPTION, 8);
    data.u64(subscription_id);

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*owner, true),
            AccountMeta::new(subscription(program_id, subscription_id)?, false),
        ],
        data: data.into_inner(),
    })
}

pub fn request_random_words(
    program_id: &Pubkey,
    requester: &Pubkey,
    args: &RandomWordsRequest,
) -> Result<Instruction> {
    require_non_zero("consumer_program", &args.consumer_program)?;
    if args.num_words == 0 {
        return Err(ArgumentError::OutOfRange {
            name: "num_words",
            value: 0,
            min: 1,
            max: u32::MAX as u64,
        }
        .into());
    }
    if args.callback_accounts.len() > MAX_CALLBACK_ACCOUNTS {
        return Err(ArgumentError::OutOfRange {
            name: "callback_accounts",
            value: args.callback_accounts.len() as u64,
            min: 0,
            max: MAX_CALLBACK_ACCOUNTS as u64,
        }
        .into());
    }
    let mut data = payload(disc::REQUEST_RANDOM_WORDS, 4 + 32 + 4);
    data.u32(args.num_words)
        .bytes(&args.seed)
        .u32(args.callback_compute_limit);

    let mut accounts = vec![
        AccountMeta::new(*requester, true),
        AccountMeta::new(config(program_id)?, false),
        AccountMeta::new(subscription(program_id, args.subscription_id)?, false),
        AccountMeta::new_readonly(
            registration(program_id, args.subscription_id, &args.consumer_program)?,
            false,
        ),
        AccountMeta::new_readonly(args.consumer_program, false),
        AccountMeta::new(request(program_id, args.request_id)?, false),
        system_program(),
    ];
    accounts.extend(args.callback_accounts.iter().map(|meta| AccountMeta {
        pubkey: meta.pubkey,
        is_signer: false,
        is_writable: meta.is_writable,
    }));

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: data.into_inner(),
    })
}

/// Oracle-side fulfillment for a stored request. The stored callback
/// accounts are appended with their recorded writability.
pub fn fulfill_random_words(
    program_id: &Pubkey,
    authority: &Pubkey,
    stored: &RandomnessRequest,
    randomness: &[u8; 32],
) -> Result<Instruction> {
    let mut data = payload(disc::FULFILL_RANDOM_WORDS, 8 + 32);
    data.u64(stored.request_id).bytes(randomness);

    let mut accounts = vec![
        AccountMeta::new(*authority, true),
        AccountMeta::new_readonly(config(program_id)?, false),
        AccountMeta::new(request(program_id, stored.request_id)?, false),
        AccountMeta::new(stored.requester, false),
        AccountMeta::new_readonly(stored.consumer_program, false),
        instructions_sysvar(),
    ];
    accounts.extend(stored.callback_account_metas());

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: data.into_inner(),
    })
}

pub fn update_config(
    program_id: &Pubkey,
    admin: &Pubkey,
    update: &CoordinatorConfigUpdate,
) -> Result<Instruction> {
    if let Some(authority) = &update.authority {
        require_non_zero("authority", authority)?;
    }
    if let Some(new_admin) = &update.admin {
        require_non_zero("admin", new_admin)?;
    }
    if update.max_num_words == Some(0) {
        return Err(ArgumentError::OutOfRange {
            name: "max_num_words",
            value: 0,
            min: 1,
            max: u32::MAX as u64,
        }
        .into());
    }

    let mut data = payload(disc::UPDATE_CONFIG, 4 + 32 * 2 + 8 + 4);
    data.option(update.authority.as_ref(), |w, k| {
        w.pubkey(k);
    })
    .option(update.fee_per_word, |w, fee| {
        w.u64(fee);
    })
    .option(update.max_num_words, |w, n| {
        w.u32(n);
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
