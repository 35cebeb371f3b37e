//! In-memory ledger that executes coordinator instructions with the crate's
//! own codecs, for driving the lifecycle end to end without a validator.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use solana_sdk::ed25519_program;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use vrf_client::ProtocolGeneration;
use vrf_client::codec::AccountLayout;
use vrf_client::discriminator::instruction as disc;
use vrf_client::events::{
    ProgramEvent, RandomWordsFulfilled, RandomWordsRequested, RandomnessFulfilled,
    RandomnessRequested,
};
use vrf_client::instructions::{legacy, subscription};
use vrf_client::ledger::{ExecutionResult, LedgerError, LedgerQuery};
use vrf_client::pda;
use vrf_client::proof;
use vrf_client::state::{
    ConsumerRegistration, CoordinatorConfig, LegacyConfig, LegacyRandomnessRequest,
    MAX_CALLBACK_ACCOUNTS, RandomnessRequest, RequestStatus, Subscription,
};

#[derive(Default)]
struct State {
    accounts: HashMap<Pubkey, Vec<u8>>,
    slot: u64,
    transactions: u64,
}

#[derive(Default)]
pub struct MockLedger {
    state: Mutex<State>,
}

type Exec<T = ()> = Result<T, String>;

impl MockLedger {
    pub fn new() -> Self {
        let ledger = Self::default();
        ledger.state.lock().unwrap().slot = 100;
        ledger
    }

    pub fn account(&self, address: &Pubkey) -> Option<Vec<u8>> {
        self.state.lock().unwrap().accounts.get(address).cloned()
    }

    pub fn set_account(&self, address: Pubkey, data: Vec<u8>) {
        self.state.lock().unwrap().accounts.insert(address, data);
    }

    pub fn remove_account(&self, address: &Pubkey) {
        self.state.lock().unwrap().accounts.remove(address);
    }

    pub fn transactions(&self) -> u64 {
        self.state.lock().unwrap().transactions
    }

    pub fn legacy_config(&self, program_id: &Pubkey) -> LegacyConfig {
        let (address, _) = pda::config_address(program_id, ProtocolGeneration::Legacy).unwrap();
        LegacyConfig::decode(&self.account(&address).unwrap()).unwrap()
    }

    pub fn coordinator_config(&self, program_id: &Pubkey) -> CoordinatorConfig {
        let (address, _) =
            pda::config_address(program_id, ProtocolGeneration::Subscription).unwrap();
        CoordinatorConfig::decode(&self.account(&address).unwrap()).unwrap()
    }

    /// Oracle side of the legacy generation: proof plus `fulfill_randomness`.
    pub async fn fulfill_legacy(
        &self,
        program_id: &Pubkey,
        authority: &Keypair,
        request_id: u64,
        randomness: [u8; 32],
    ) -> Result<ExecutionResult, LedgerError> {
        let message = proof::fulfillment_message(request_id, &randomness);
        let instructions = [
            proof::build_ed25519_instruction(authority, &message),
            legacy::fulfill_randomness(program_id, &authority.pubkey(), request_id, &randomness)
                .map_err(|e| LedgerError::CustomError(e.to_string()))?,
        ];
        self.submit(&instructions, &[authority]).await
    }

    /// Oracle side of the subscription generation: fulfill, callback and
    /// close in one transaction.
    pub async fn fulfill_subscription(
        &self,
        program_id: &Pubkey,
        authority: &Keypair,
        request_id: u64,
        randomness: [u8; 32],
    ) -> Result<ExecutionResult, LedgerError> {
        let (address, _) =
            pda::request_address(program_id, ProtocolGeneration::Subscription, request_id).unwrap();
        let stored = RandomnessRequest::decode(
            &self
                .account(&address)
                .ok_or_else(|| LedgerError::CustomError("request not found".into()))?,
        )
        .map_err(|e| LedgerError::CustomError(e.to_string()))?;

        let message = proof::fulfillment_message(request_id, &randomness);
        let instructions = [
            proof::build_ed25519_instruction(authority, &message),
            subscription::fulfill_random_words(program_id, &authority.pubkey(), &stored, &randomness)
                .map_err(|e| LedgerError::CustomError(e.to_string()))?,
        ];
        self.submit(&instructions, &[authority]).await
    }
}

#[async_trait]
impl LedgerQuery for MockLedger {
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError> {
        Ok(self.account(address))
    }

    async fn submit(
        &self,
        instructions: &[Instruction],
        signers: &[&Keypair],
    ) -> Result<ExecutionResult, LedgerError> {
        let signer_keys: Vec<Pubkey> = signers.iter().map(|k| k.pubkey()).collect();
        let mut state = self.state.lock().unwrap();

        // Execute against a copy so a failing transaction leaves no trace.
        let mut accounts = state.accounts.clone();
        let slot = state.slot + 1;
        let mut logs = Vec::new();
        for (index, ix) in instructions.iter().enumerate() {
            logs.push(format!("Program {} invoke [1]", ix.program_id));
            let mut exec = Executor {
                accounts: &mut accounts,
                slot,
                logs: &mut logs,
                transaction: instructions,
                signers: &signer_keys,
            };
            exec.run(ix)
                .map_err(|e| LedgerError::CustomError(format!("instruction {index} failed: {e}")))?;
            logs.push(format!("Program {} success", ix.program_id));
        }

        state.accounts = accounts;
        state.slot = slot;
        state.transactions += 1;

        let mut signature = [0u8; 64];
        signature[..8].copy_from_slice(&state.transactions.to_le_bytes());
        Ok(ExecutionResult {
            signature: Signature::from(signature),
            slot,
            logs,
        })
    }
}

struct Executor<'a> {
    accounts: &'a mut HashMap<Pubkey, Vec<u8>>,
    slot: u64,
    logs: &'a mut Vec<String>,
    transaction: &'a [Instruction],
    signers: &'a [Pubkey],
}

fn u32_at(data: &[u8], at: usize) -> Exec<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_le_bytes(b.try_into().unwrap()))
        .ok_or_else(|| "instruction data too short".to_string())
}

fn u64_at(data: &[u8], at: usize) -> Exec<u64> {
    data.get(at..at + 8)
        .map(|b| u64::from_le_bytes(b.try_into().unwrap()))
        .ok_or_else(|| "instruction data too short".to_string())
}

fn bytes32_at(data: &[u8], at: usize) -> Exec<[u8; 32]> {
    data.get(at..at + 32)
        .map(|b| b.try_into().unwrap())
        .ok_or_else(|| "instruction data too short".to_string())
}

impl Executor<'_> {
    fn run(&mut self, ix: &Instruction) -> Exec {
        if ix.program_id == ed25519_program::id() {
            return Ok(());
        }
        for meta in ix.accounts.iter().filter(|m| m.is_signer) {
            if !self.signers.contains(&meta.pubkey) {
                return Err(format!("missing signature for {}", meta.pubkey));
            }
        }

        let program = ix.program_id;
        let data = ix.data.as_slice();
        let key = |i: usize| -> Exec<Pubkey> {
            ix.accounts
                .get(i)
                .map(|m| m.pubkey)
                .ok_or_else(|| format!("missing account {i}"))
        };
        let tag: [u8; 8] = data
            .get(..8)
            .and_then(|d| d.try_into().ok())
            .ok_or("missing discriminator")?;

        match tag {
            disc::INITIALIZE if ix.accounts.len() == 5 => {
                let (address, bump) = self.expect_pda(
                    key(3)?,
                    pda::config_address(&program, ProtocolGeneration::Legacy),
                )?;
                self.create(
                    address,
                    LegacyConfig {
                        admin: key(0)?,
                        authority: key(1)?,
                        fee: u64_at(data, 8)?,
                        treasury: key(2)?,
                        request_counter: 0,
                        bump,
                    }
                    .encode(),
                )
            }
            disc::INITIALIZE => {
                let (address, bump) = self.expect_pda(
                    key(2)?,
                    pda::config_address(&program, ProtocolGeneration::Subscription),
                )?;
                self.create(
                    address,
                    CoordinatorConfig {
                        admin: key(0)?,
                        authority: key(1)?,
                        fee_per_word: u64_at(data, 8)?,
                        max_num_words: u32_at(data, 16)?,
                        request_counter: 0,
                        subscription_counter: 0,
                        bump,
                    }
                    .encode(),
                )
            }
            disc::REQUEST_RANDOMNESS | disc::REQUEST_RANDOMNESS_WITH_CALLBACK => {
                let requester = key(0)?;
                let mut config: LegacyConfig = self.load(&key(1)?)?;
                let request_id = config.request_counter;
                let (address, bump) = self.expect_pda(
                    key(2)?,
                    pda::request_address(&program, ProtocolGeneration::Legacy, request_id),
                )?;
                let callback_program = if tag == disc::REQUEST_RANDOMNESS_WITH_CALLBACK {
                    key(4)?
                } else {
                    Pubkey::default()
                };
                let seed = bytes32_at(data, 8)?;
                self.create(
                    address,
                    LegacyRandomnessRequest {
                        request_id,
                        requester,
                        seed,
                        request_slot: self.slot,
                        callback_program,
                        status: RequestStatus::Pending,
                        randomness: [0; 32],
                        fulfilled_slot: 0,
                        bump,
                    }
                    .encode(),
                )?;
                config.request_counter += 1;
                self.store(key(1)?, &config);
                self.emit(ProgramEvent::RandomnessRequested(RandomnessRequested {
                    request_id,
                    requester,
                    seed,
                    request_slot: self.slot,
                }));
                Ok(())
            }
            disc::FULFILL_RANDOMNESS => {
                let config: LegacyConfig = self.load(&key(1)?)?;
                let request_id = u64_at(data, 8)?;
                let randomness = bytes32_at(data, 16)?;
                self.verify_proof(&config.authority, request_id, &randomness)?;
                let mut request: LegacyRandomnessRequest = self.load(&key(2)?)?;
                if request.status != RequestStatus::Pending {
                    return Err("RequestNotPending".into());
                }
                request.status = RequestStatus::Fulfilled;
                request.randomness = randomness;
                request.fulfilled_slot = self.slot;
                self.store(key(2)?, &request);
                self.emit(ProgramEvent::RandomnessFulfilled(RandomnessFulfilled {
                    request_id,
                    randomness,
                }));
                Ok(())
            }
            disc::CONSUME_RANDOMNESS => {
                let mut request: LegacyRandomnessRequest = self.load(&key(1)?)?;
                if request.requester != key(0)? {
                    return Err("Unauthorized".into());
                }
                if request.status != RequestStatus::Fulfilled {
                    return Err("RequestNotFulfilled".into());
                }
                request.status = RequestStatus::Consumed;
                self.store(key(1)?, &request);
                Ok(())
            }
            disc::CLOSE_REQUEST => {
                let request: LegacyRandomnessRequest = self.load(&key(1)?)?;
                if request.status != RequestStatus::Consumed {
                    return Err("RequestNotConsumed".into());
                }
                self.accounts.remove(&key(1)?);
                Ok(())
            }
            disc::CREATE_SUBSCRIPTION => {
                let mut config: CoordinatorConfig = self.load(&key(1)?)?;
                let id = config.subscription_counter;
                let (address, bump) =
                    self.expect_pda(key(2)?, pda::subscription_address(&program, id))?;
                self.create(
                    address,
                    Subscription {
                        id,
                        owner: key(0)?,
                        balance: 0,
                        req_count: 0,
                        consumer_count: 0,
                        bump,
                    }
                    .encode(),
                )?;
                config.subscription_counter += 1;
                self.store(key(1)?, &config);
                Ok(())
            }
            disc::FUND_SUBSCRIPTION => {
                let mut sub: Subscription = self.load(&key(1)?)?;
                sub.balance = sub
                    .balance
                    .checked_add(u64_at(data, 16)?)
                    .ok_or("Overflow")?;
                self.store(key(1)?, &sub);
                Ok(())
            }
            disc::ADD_CONSUMER => {
                let mut sub: Subscription = self.load(&key(1)?)?;
                if sub.owner != key(0)? {
                    return Err("Unauthorized".into());
                }
                let consumer = key(2)?;
                let (address, bump) = self.expect_pda(
                    key(3)?,
                    pda::consumer_registration_address(&program, sub.id, &consumer),
                )?;
                self.create(
                    address,
                    ConsumerRegistration {
                        subscription_id: sub.id,
                        program_id: consumer,
                        nonce: 0,
                        bump,
                    }
                    .encode(),
                )?;
                sub.consumer_count += 1;
                self.store(key(1)?, &sub);
                Ok(())
            }
            disc::REMOVE_CONSUMER => {
                let mut sub: Subscription = self.load(&key(1)?)?;
                if sub.owner != key(0)? {
                    return Err("Unauthorized".into());
                }
                let _: ConsumerRegistration = self.load(&key(3)?)?;
                self.accounts.remove(&key(3)?);
                sub.consumer_count -= 1;
                self.store(key(1)?, &sub);
                Ok(())
            }
            disc::CANCEL_SUBSCRIPTION => {
                let sub: Subscription = self.load(&key(1)?)?;
                if sub.owner != key(0)? {
                    return Err("Unauthorized".into());
                }
                if sub.consumer_count > 0 {
                    return Err("SubscriptionHasConsumers".into());
                }
                self.accounts.remove(&key(1)?);
                Ok(())
            }
            disc::REQUEST_RANDOM_WORDS => {
                let requester = key(0)?;
                let mut config: CoordinatorConfig = self.load(&key(1)?)?;
                let mut sub: Subscription = self.load(&key(2)?)?;
                let registration: ConsumerRegistration = self.load(&key(3)?)?;
                let consumer_program = key(4)?;
                if registration.program_id != consumer_program {
                    return Err("ConsumerNotRegistered".into());
                }
                let num_words = u32_at(data, 8)?;
                let seed = bytes32_at(data, 12)?;
                let callback_compute_limit = u32_at(data, 44)?;
                if num_words == 0 || num_words > config.max_num_words {
                    return Err("InvalidNumWords".into());
                }
                let fee = config.fee_per_word * num_words as u64;
                if sub.balance < fee {
                    return Err("InsufficientBalance".into());
                }

                let request_id = config.request_counter;
                let (address, bump) = self.expect_pda(
                    key(5)?,
                    pda::request_address(&program, ProtocolGeneration::Subscription, request_id),
                )?;
                let extra = &ix.accounts[7..];
                if extra.len() > MAX_CALLBACK_ACCOUNTS {
                    return Err("TooManyCallbackAccounts".into());
                }
                let mut callback_accounts = [Pubkey::default(); MAX_CALLBACK_ACCOUNTS];
                let mut bitmap = 0u8;
                for (i, meta) in extra.iter().enumerate() {
                    callback_accounts[i] = meta.pubkey;
                    if meta.is_writable {
                        bitmap |= 1 << i;
                    }
                }

                self.create(
                    address,
                    RandomnessRequest {
                        request_id,
                        subscription_id: sub.id,
                        consumer_program,
                        requester,
                        num_words,
                        seed,
                        request_slot: self.slot,
                        callback_compute_limit,
                        status: RequestStatus::Pending,
                        randomness: [0; 32],
                        fulfilled_slot: 0,
                        num_callback_accounts: extra.len() as u8,
                        callback_accounts,
                        callback_writable_bitmap: bitmap,
                        bump,
                    }
                    .encode(),
                )?;
                sub.balance -= fee;
                sub.req_count += 1;
                config.request_counter += 1;
                self.store(key(1)?, &config);
                self.store(key(2)?, &sub);
                self.emit(ProgramEvent::RandomWordsRequested(RandomWordsRequested {
                    request_id,
                    subscription_id: sub.id,
                    consumer_program,
                    requester,
                    num_words,
                    seed,
                    request_slot: self.slot,
                    callback_compute_limit,
                }));
                Ok(())
            }
            disc::FULFILL_RANDOM_WORDS => {
                let config: CoordinatorConfig = self.load(&key(1)?)?;
                let request_id = u64_at(data, 8)?;
                let randomness = bytes32_at(data, 16)?;
                self.verify_proof(&config.authority, request_id, &randomness)?;
                let request: RandomnessRequest = self.load(&key(2)?)?;
                if request.status != RequestStatus::Pending {
                    return Err("RequestNotPending".into());
                }
                self.logs
                    .push(format!("Program {} invoke [2]", request.consumer_program));
                self.logs
                    .push(format!("Program {} success", request.consumer_program));
                self.accounts.remove(&key(2)?);
                self.emit(ProgramEvent::RandomWordsFulfilled(RandomWordsFulfilled {
                    request_id,
                    randomness,
                    consumer_program: request.consumer_program,
                }));
                Ok(())
            }
            other => Err(format!("unsupported instruction {other:?}")),
        }
    }

    fn expect_pda(
        &self,
        supplied: Pubkey,
        derived: Result<(Pubkey, u8), vrf_client::error::DerivationError>,
    ) -> Exec<(Pubkey, u8)> {
        let (address, bump) = derived.map_err(|e| e.to_string())?;
        if address != supplied {
            return Err(format!("ConstraintSeeds: expected {address}, got {supplied}"));
        }
        Ok((address, bump))
    }

    fn create(&mut self, address: Pubkey, data: Vec<u8>) -> Exec {
        if self.accounts.contains_key(&address) {
            return Err(format!("account {address} already in use"));
        }
        self.accounts.insert(address, data);
        Ok(())
    }

    fn load<T: AccountLayout>(&self, address: &Pubkey) -> Exec<T> {
        let data = self
            .accounts
            .get(address)
            .ok_or_else(|| format!("AccountNotInitialized: {address}"))?;
        T::decode(data).map_err(|e| e.to_string())
    }

    fn store<T: AccountLayout>(&mut self, address: Pubkey, value: &T) {
        self.accounts.insert(address, value.encode());
    }

    fn emit(&mut self, event: ProgramEvent) {
        self.logs.push(event.to_log_line());
    }

    /// The transaction must carry an Ed25519 precompile instruction signed
    /// by `authority` over `request_id || randomness`.
    fn verify_proof(&self, authority: &Pubkey, request_id: u64, randomness: &[u8; 32]) -> Exec {
        let expected = proof::fulfillment_message(request_id, randomness);
        let found = self
            .transaction
            .iter()
            .filter(|ix| ix.program_id == ed25519_program::id())
            .any(|ix| {
                let d = &ix.data;
                if d.len() < 112 {
                    return false;
                }
                let Ok(signature) = <[u8; 64]>::try_from(&d[48..112]) else {
                    return false;
                };
                &d[16..48] == authority.as_ref()
                    && d[112..] == expected
                    && Signature::from(signature).verify(authority.as_ref(), &d[112..])
            });
        if found {
            Ok(())
        } else {
            Err("InvalidProof".into())
        }
    }
}

/// A ledger with an initialized legacy coordinator.
pub async fn legacy_setup(fee: u64) -> (MockLedger, Pubkey, Keypair, Keypair) {
    let ledger = MockLedger::new();
    let program = Pubkey::new_unique();
    let admin = Keypair::new();
    let authority = Keypair::new();
    let treasury = Pubkey::new_unique();
    let ix = legacy::initialize(&program, &admin.pubkey(), &authority.pubkey(), &treasury, fee)
        .unwrap();
    ledger.submit(&[ix], &[&admin]).await.unwrap();
    (ledger, program, admin, authority)
}

/// A ledger with an initialized subscription coordinator.
pub async fn subscription_setup(
    fee_per_word: u64,
    max_num_words: u32,
) -> (MockLedger, Pubkey, Keypair, Keypair) {
    let ledger = MockLedger::new();
    let program = Pubkey::new_unique();
    let admin = Keypair::new();
    let authority = Keypair::new();
    let ix = subscription::initialize(
        &program,
        &admin.pubkey(),
        &authority.pubkey(),
        fee_per_word,
        max_num_words,
    )
    .unwrap();
    ledger.submit(&[ix], &[&admin]).await.unwrap();
    (ledger, program, admin, authority)
}
