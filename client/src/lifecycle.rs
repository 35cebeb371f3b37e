//! Request lifecycle: submit, observe and (legacy only) finalize.
//!
//! The client never retries a lifecycle violation; it reports the state it
//! found. Network failures surface as [`VrfClientError::Network`] and are
//! terminal for the call.

use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use tracing::{debug, info, instrument, warn};

use crate::ProtocolGeneration;
use crate::codec::AccountLayout;
use crate::error::{ArgumentError, LifecycleError, Result, VrfClientError};
use crate::events::{self, ProgramEvent};
use crate::instructions::subscription::RandomWordsRequest;
use crate::instructions::{legacy, seed_from_slice, subscription};
use crate::ledger::{ExecutionResult, LedgerQuery};
use crate::pda;
use crate::state::{
    ConfigAccount, ConsumerRegistration, CoordinatorConfig, LegacyConfig, RequestAccount,
    RequestStatus, Subscription,
};
use crate::vrf;

/// What a subscription-generation client requests against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionBinding {
    pub subscription_id: u64,
    pub consumer_program: Pubkey,
    pub callback_compute_limit: u32,
    /// At most four; stored on each request for the fulfiller.
    pub callback_accounts: Vec<AccountMeta>,
}

#[derive(Debug, Clone)]
enum Mode {
    Legacy { callback_program: Option<Pubkey> },
    Subscription(SubscriptionBinding),
}

/// A request being tracked. Produced by [`LifecycleClient::submit`] or
/// [`RequestHandle::watch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHandle {
    pub request_id: u64,
    pub address: Pubkey,
    pub generation: ProtocolGeneration,
    /// Set once the request is known to have existed on-chain, either from
    /// the submitting transaction or from an observation.
    pub seen: bool,
    pub signature: Option<Signature>,
}

impl RequestHandle {
    /// Track an existing request by id without having submitted it.
    pub fn watch(
        program_id: &Pubkey,
        generation: ProtocolGeneration,
        request_id: u64,
    ) -> Result<Self> {
        let (address, _) = pda::request_address(program_id, generation, request_id)?;
        Ok(Self {
            request_id,
            address,
            generation,
            seen: false,
            signature: None,
        })
    }

    pub fn mark_seen(&mut self) {
        self.seen = true;
    }
}

/// A decoded snapshot of a request account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestView {
    pub address: Pubkey,
    pub account: RequestAccount,
}

impl RequestView {
    pub fn request_id(&self) -> u64 {
        self.account.request_id()
    }

    pub fn status(&self) -> RequestStatus {
        self.account.status()
    }

    pub fn requester(&self) -> Pubkey {
        self.account.requester()
    }

    /// Base output; all zero until fulfilled.
    pub fn randomness(&self) -> [u8; 32] {
        self.account.randomness()
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(
            self.status(),
            RequestStatus::Fulfilled | RequestStatus::Consumed
        )
    }

    /// The requested words. Legacy requests carry a single word, the base.
    pub fn words(&self) -> Vec<[u8; 32]> {
        match &self.account {
            RequestAccount::Legacy(r) => vec![r.randomness],
            RequestAccount::Subscription(r) => vrf::expand_randomness(&r.randomness, r.num_words),
        }
    }
}

/// Why a request account is absent. The ledger reports both identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Absence {
    /// The request existed and has since been closed.
    Closed,
    /// No evidence the request was ever created.
    NotYetCreated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Found(RequestView),
    NotFound(Absence),
}

pub struct LifecycleClient<L> {
    ledger: L,
    program_id: Pubkey,
    mode: Mode,
}

impl<L: LedgerQuery> LifecycleClient<L> {
    pub fn legacy(ledger: L, program_id: Pubkey) -> Self {
        Self {
            ledger,
            program_id,
            mode: Mode::Legacy {
                callback_program: None,
            },
        }
    }

    /// Legacy client whose requests record `callback_program`.
    pub fn legacy_with_callback(ledger: L, program_id: Pubkey, callback_program: Pubkey) -> Self {
        Self {
            ledger,
            program_id,
            mode: Mode::Legacy {
                callback_program: Some(callback_program),
            },
        }
    }

    pub fn subscription(ledger: L, program_id: Pubkey, binding: SubscriptionBinding) -> Self {
        Self {
            ledger,
            program_id,
            mode: Mode::Subscription(binding),
        }
    }

    pub fn generation(&self) -> ProtocolGeneration {
        match self.mode {
            Mode::Legacy { .. } => ProtocolGeneration::Legacy,
            Mode::Subscription(_) => ProtocolGeneration::Subscription,
        }
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    fn require_subscription(&self, operation: &'static str) -> Result<()> {
        match self.mode {
            Mode::Subscription(_) => Ok(()),
            Mode::Legacy { .. } => Err(LifecycleError::UnsupportedGeneration {
                operation,
                required: "subscription",
            }
            .into()),
        }
    }

    async fn fetch<T: AccountLayout>(&self, what: &'static str, address: Pubkey) -> Result<T> {
        match self.ledger.get_account(&address).await? {
            Some(data) => Ok(T::decode(&data)?),
            None => Err(VrfClientError::NotFound { what, address }),
        }
    }

    pub async fn fetch_config(&self) -> Result<ConfigAccount> {
        let generation = self.generation();
        let (address, _) = pda::config_address(&self.program_id, generation)?;
        match self.ledger.get_account(&address).await? {
            Some(data) => Ok(ConfigAccount::decode(generation, &data)?),
            None => Err(VrfClientError::NotFound {
                what: "config",
                address,
            }),
        }
    }

    pub async fn fetch_subscription(&self, subscription_id: u64) -> Result<Subscription> {
        let (address, _) = pda::subscription_address(&self.program_id, subscription_id)?;
        self.fetch("subscription", address).await
    }

    /// `None` if `consumer_program` is not registered on the subscription.
    pub async fn fetch_consumer_registration(
        &self,
        subscription_id: u64,
        consumer_program: &Pubkey,
    ) -> Result<Option<ConsumerRegistration>> {
        let (address, _) =
            pda::consumer_registration_address(&self.program_id, subscription_id, consumer_program)?;
        match self.ledger.get_account(&address).await? {
            Some(data) => Ok(Some(ConsumerRegistration::decode(&data)?)),
            None => Ok(None),
        }
    }

    /// Submit a randomness request and return its handle without waiting.
    ///
    /// The id is taken from the config counter read immediately before
    /// building, then confirmed against the request event in the executed
    /// transaction's logs.
    #[instrument(skip_all, fields(generation = %self.generation(), requester = %requester.pubkey()))]
    pub async fn submit(
        &self,
        requester: &Keypair,
        seed: &[u8],
        num_words: Option<u32>,
    ) -> Result<RequestHandle> {
        let seed = seed_from_slice(seed)?;
        let generation = self.generation();

        let (advisory_id, instruction) = match &self.mode {
            Mode::Legacy { callback_program } => {
                if let Some(words) = num_words.filter(|w| *w != 1) {
                    return Err(ArgumentError::OutOfRange {
                        name: "num_words",
                        value: words as u64,
                        min: 1,
                        max: 1,
                    }
                    .into());
                }
                let config = self.fetch_legacy_config().await?;
                let id = config.request_counter;
                let ix = match callback_program {
                    Some(program) => legacy::request_randomness_with_callback(
                        &self.program_id,
                        &requester.pubkey(),
                        &config.treasury,
                        program,
                        id,
                        &seed,
                    )?,
                    None => legacy::request_randomness(
                        &self.program_id,
                        &requester.pubkey(),
                        &config.treasury,
                        id,
                        &seed,
                    )?,
                };
                (id, ix)
            }
            Mode::Subscription(binding) => {
                let words = num_words.unwrap_or(1);
                let config = self.preflight(binding, words).await?;
                let id = config.request_counter;
                let ix = subscription::request_random_words(
                    &self.program_id,
                    &requester.pubkey(),
                    &RandomWordsRequest {
                        request_id: id,
                        subscription_id: binding.subscription_id,
                        consumer_program: binding.consumer_program,
                        num_words: words,
                        seed,
                        callback_compute_limit: binding.callback_compute_limit,
                        callback_accounts: binding.callback_accounts.clone(),
                    },
                )?;
                (id, ix)
            }
        };

        debug!(advisory_id, "Submitting randomness request");
        let result = self.ledger.submit(&[instruction], &[requester]).await?;

        let request_id = match self.requested_id(&result, &requester.pubkey()) {
            Some(id) if id != advisory_id => {
                warn!(advisory_id, confirmed_id = id, "Request id moved before execution");
                id
            }
            Some(id) => id,
            None => {
                warn!(advisory_id, "No request event in transaction logs, keeping advisory id");
                advisory_id
            }
        };
        let (address, _) = pda::request_address(&self.program_id, generation, request_id)?;

        info!(
            request_id,
            address = %address,
            signature = %result.signature,
            slot = result.slot,
            "Randomness requested"
        );

        Ok(RequestHandle {
            request_id,
            address,
            generation,
            seen: true,
            signature: Some(result.signature),
        })
    }

    async fn fetch_legacy_config(&self) -> Result<LegacyConfig> {
        let (address, _) = pda::config_address(&self.program_id, ProtocolGeneration::Legacy)?;
        self.fetch("config", address).await
    }

    async fn fetch_coordinator_config(&self) -> Result<CoordinatorConfig> {
        let (address, _) = pda::config_address(&self.program_id, ProtocolGeneration::Subscription)?;
        self.fetch("config", address).await
    }

    /// Checks that would make the coordinator reject the request, done
    /// locally so a rejected request never consumes a counter value.
    async fn preflight(&self, binding: &SubscriptionBinding, words: u32) -> Result<CoordinatorConfig> {
        let config = self.fetch_coordinator_config().await?;

        if words == 0 || words > config.max_num_words {
            return Err(ArgumentError::OutOfRange {
                name: "num_words",
                value: words as u64,
                min: 1,
                max: config.max_num_words as u64,
            }
            .into());
        }

        if self
            .fetch_consumer_registration(binding.subscription_id, &binding.consumer_program)
            .await?
            .is_none()
        {
            return Err(LifecycleError::ConsumerNotRegistered {
                subscription_id: binding.subscription_id,
                consumer_program: binding.consumer_program,
            }
            .into());
        }

        let sub = self.fetch_subscription(binding.subscription_id).await?;
        let required = config.fee_for(words).unwrap_or(u64::MAX);
        if sub.balance < required {
            return Err(LifecycleError::InsufficientBalance {
                subscription_id: binding.subscription_id,
                required,
                available: sub.balance,
            }
            .into());
        }

        Ok(config)
    }

    fn requested_id(&self, result: &ExecutionResult, requester: &Pubkey) -> Option<u64> {
        events::parse_logs(&result.logs)
            .into_iter()
            .find_map(|event| match (&self.mode, event) {
                (Mode::Legacy { .. }, ProgramEvent::RandomnessRequested(e))
                    if e.requester == *requester =>
                {
                    Some(e.request_id)
                }
                (Mode::Subscription(binding), ProgramEvent::RandomWordsRequested(e))
                    if e.requester == *requester
                        && e.consumer_program == binding.consumer_program =>
                {
                    Some(e.request_id)
                }
                _ => None,
            })
    }

    /// One read-decode cycle. Absence is not an error; the handle decides
    /// whether it means closed or not yet created.
    pub async fn observe(&self, handle: &RequestHandle) -> Result<Observation> {
        match self.ledger.get_account(&handle.address).await? {
            Some(data) => {
                let account = RequestAccount::decode(handle.generation, &data)?;
                Ok(Observation::Found(RequestView {
                    address: handle.address,
                    account,
                }))
            }
            None if handle.seen => Ok(Observation::NotFound(Absence::Closed)),
            None => Ok(Observation::NotFound(Absence::NotYetCreated)),
        }
    }

    /// Consume then close a fulfilled legacy request, returning its
    /// randomness. `view` must come from a prior [`Self::observe`]; the
    /// account is re-read before each step.
    #[instrument(skip_all, fields(request_id = view.request_id()))]
    pub async fn finalize(&self, requester: &Keypair, view: &RequestView) -> Result<[u8; 32]> {
        if !matches!(self.mode, Mode::Legacy { .. }) {
            return Err(LifecycleError::UnsupportedGeneration {
                operation: "finalize",
                required: "legacy",
            }
            .into());
        }
        let request_id = view.request_id();
        if view.status() == RequestStatus::Pending {
            return Err(LifecycleError::WrongState {
                request_id,
                expected: RequestStatus::Fulfilled,
                actual: RequestStatus::Pending,
            }
            .into());
        }

        let current = self.reread(view).await?;
        match current.status() {
            RequestStatus::Fulfilled => {
                let ix = legacy::consume_randomness(&self.program_id, &requester.pubkey(), request_id)?;
                self.send_step("consume", ix, requester).await?;
            }
            RequestStatus::Consumed => debug!("Already consumed, closing"),
            actual => {
                return Err(LifecycleError::WrongState {
                    request_id,
                    expected: RequestStatus::Fulfilled,
                    actual,
                }
                .into());
            }
        }

        let consumed = self.reread(view).await?;
        if consumed.status() != RequestStatus::Consumed {
            return Err(LifecycleError::WrongState {
                request_id,
                expected: RequestStatus::Consumed,
                actual: consumed.status(),
            }
            .into());
        }
        let ix = legacy::close_request(&self.program_id, &requester.pubkey(), request_id)?;
        self.send_step("close", ix, requester).await?;

        info!(request_id, "Request finalized");
        Ok(consumed.randomness())
    }

    async fn reread(&self, view: &RequestView) -> Result<RequestAccount> {
        match self.ledger.get_account(&view.address).await? {
            Some(data) => Ok(RequestAccount::decode(self.generation(), &data)?),
            None => Err(VrfClientError::NotFound {
                what: "randomness request",
                address: view.address,
            }),
        }
    }

    async fn send_step(
        &self,
        step: &'static str,
        instruction: Instruction,
        signer: &Keypair,
    ) -> Result<ExecutionResult> {
        let result = self.ledger.submit(&[instruction], &[signer]).await?;
        debug!(step, signature = %result.signature, "Step confirmed");
        Ok(result)
    }

    /// Create a subscription owned by `owner` and return its id.
    pub async fn create_subscription(&self, owner: &Keypair) -> Result<u64> {
        self.require_subscription("create_subscription")?;
        let id = self.fetch_coordinator_config().await?.subscription_counter;
        let ix = subscription::create_subscription(&self.program_id, &owner.pubkey(), id)?;
        self.send_step("create_subscription", ix, owner).await?;
        info!(subscription_id = id, owner = %owner.pubkey(), "Subscription created");
        Ok(id)
    }

    pub async fn fund_subscription(
        &self,
        funder: &Keypair,
        subscription_id: u64,
        amount: u64,
    ) -> Result<ExecutionResult> {
        self.require_subscription("fund_subscription")?;
        let ix = subscription::fund_subscription(
            &self.program_id,
            &funder.pubkey(),
            subscription_id,
            amount,
        )?;
        self.send_step("fund_subscription", ix, funder).await
    }

    pub async fn add_consumer(
        &self,
        owner: &Keypair,
        subscription_id: u64,
        consumer_program: &Pubkey,
    ) -> Result<ExecutionResult> {
        self.require_subscription("add_consumer")?;
        let ix = subscription::add_consumer(
            &self.program_id,
            &owner.pubkey(),
            subscription_id,
            consumer_program,
        )?;
        self.send_step("add_consumer", ix, owner).await
    }

    pub async fn remove_consumer(
        &self,
        owner: &Keypair,
        subscription_id: u64,
        consumer_program: &Pubkey,
    ) -> Result<ExecutionResult> {
        self.require_subscription("remove_consumer")?;
        let ix = subscription::remove_consumer(
            &self.program_id,
            &owner.pubkey(),
            subscription_id,
            consumer_program,
        )?;
        self.send_step("remove_consumer", ix, owner).await
    }

    /// Cancel a subscription. Refused locally while consumers remain.
    pub async fn cancel_subscription(
        &self,
        owner: &Keypair,
        subscription_id: u64,
    ) -> Result<ExecutionResult> {
        self.require_subscription("cancel_subscription")?;
        let sub = self.fetch_subscription(subscription_id).await?;
        if sub.consumer_count > 0 {
            return Err(LifecycleError::SubscriptionHasConsumers {
                subscription_id,
                consumer_count: sub.consumer_count,
            }
            .into());
        }
        let ix = subscription::cancel_subscription(&self.program_id, &owner.pubkey(), subscription_id)?;
        self.send_step("cancel_subscription", ix, owner).await
    }
}
