//! Polling until a request is fulfilled or a deadline passes.
//!
//! Each [`FulfillmentWaiter::wait`] call owns its own timer and handle copy,
//! so concurrent waits never interfere. Cancellation is by timeout only; a
//! caller wanting to stop early can drop the future.

use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, instrument};

use crate::ProtocolGeneration;
use crate::error::{LifecycleError, Result, VrfClientError};
use crate::ledger::LedgerQuery;
use crate::lifecycle::{Absence, LifecycleClient, Observation, RequestHandle, RequestView};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The request account shows a fulfilled status.
    Fulfilled(RequestView),
    /// Subscription generation: the request was fulfilled, its callback ran
    /// and the account was closed. The output is only available from the
    /// consumer program's own state now.
    ClosedAfterCallback { request_id: u64 },
}

impl WaitOutcome {
    pub fn request_id(&self) -> u64 {
        match self {
            WaitOutcome::Fulfilled(view) => view.request_id(),
            WaitOutcome::ClosedAfterCallback { request_id } => *request_id,
        }
    }
}

pub struct FulfillmentWaiter<'a, L> {
    client: &'a LifecycleClient<L>,
}

impl<'a, L: LedgerQuery> FulfillmentWaiter<'a, L> {
    pub fn new(client: &'a LifecycleClient<L>) -> Self {
        Self { client }
    }

    /// Poll `handle` every `interval` until fulfilled, closed after callback,
    /// or `timeout` elapses.
    ///
    /// A legacy request that disappears was consumed and closed by someone
    /// else before its randomness was read, which is reported as
    /// [`LifecycleError::RequestClosed`].
    #[instrument(skip_all, fields(request_id = handle.request_id))]
    pub async fn wait(
        &self,
        handle: &RequestHandle,
        timeout: Duration,
        interval: Duration,
    ) -> Result<WaitOutcome> {
        let start = Instant::now();
        let mut handle = handle.clone();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            match self.client.observe(&handle).await? {
                Observation::Found(view) => {
                    handle.mark_seen();
                    if view.is_fulfilled() {
                        info!(attempts, elapsed = ?start.elapsed(), "Request fulfilled");
                        return Ok(WaitOutcome::Fulfilled(view));
                    }
                    debug!(attempt = attempts, status = %view.status(), "Not fulfilled yet");
                }
                Observation::NotFound(Absence::Closed) => {
                    return match handle.generation {
                        ProtocolGeneration::Subscription => {
                            info!(attempts, elapsed = ?start.elapsed(), "Request closed after callback");
                            Ok(WaitOutcome::ClosedAfterCallback {
                                request_id: handle.request_id,
                            })
                        }
                        ProtocolGeneration::Legacy => Err(LifecycleError::RequestClosed {
                            request_id: handle.request_id,
                        }
                        .into()),
                    };
                }
                Observation::NotFound(Absence::NotYetCreated) => {
                    debug!(attempt = attempts, "Request account not created yet");
                }
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Err(VrfClientError::Timeout {
                    request_id: handle.request_id,
                    elapsed,
                    attempts,
                });
            }
            sleep(interval.min(timeout - elapsed)).await;
        }
    }

    /// Wait on several requests at once, each with its own timer. Results
    /// are in the order of `handles`.
    pub async fn wait_all(
        &self,
        handles: &[RequestHandle],
        timeout: Duration,
        interval: Duration,
    ) -> Vec<Result<WaitOutcome>> {
        join_all(
            handles
                .iter()
                .map(|handle| self.wait(handle, timeout, interval)),
        )
        .await
    }
}
