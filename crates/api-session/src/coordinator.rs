//! Single-flight credential renewal.
//!
//! The first caller to see an authorization failure starts a renewal
//! episode; every caller that arrives while it is in flight joins a FIFO
//! queue instead of starting its own. When the episode settles the queue
//! is drained in arrival order, each waiter receiving either the renewed
//! credential or a `SESSION_EXPIRED` error.
//!
//! The queue and the state machine share one lock, so the check for an
//! in-flight episode and the decision to start one are atomic. The lock is
//! never held across an await. The renewal call runs on its own task: a
//! caller that gives up waiting cannot strand the others.

use crate::backend::Backend;
use crate::credential::{Credential, Identity, TokenGrant};
use crate::error::{ClassifiedError, Failure};
use crate::notifier::SessionNotifier;
use crate::renewal_fsm::{RenewalInput, RenewalMachine, RenewalMachineState, RenewalPhase};
use crate::request::ApiRequest;
use crate::store::CredentialStore;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// What a queued caller receives when the episode settles.
pub(crate) type RenewalOutcome = Result<Credential, ClassifiedError>;

type Waiter = oneshot::Sender<RenewalOutcome>;

struct RenewalState {
    machine: RenewalMachine,
    waiters: VecDeque<Waiter>,
    episodes: u64,
}

enum Admission {
    Joined,
    Started {
        episode: u64,
        refresh_token: String,
        generation: u64,
    },
    NoRenewalCredential,
}

pub(crate) struct RenewalCoordinator {
    state: Mutex<RenewalState>,
    backend: Arc<Backend>,
    store: Arc<CredentialStore>,
    notifier: Arc<SessionNotifier>,
}

impl RenewalCoordinator {
    pub(crate) fn new(
        backend: Arc<Backend>,
        store: Arc<CredentialStore>,
        notifier: Arc<SessionNotifier>,
    ) -> Self {
        Self {
            state: Mutex::new(RenewalState {
                machine: RenewalMachine::new(),
                waiters: VecDeque::new(),
                episodes: 0,
            }),
            backend,
            store,
            notifier,
        }
    }

    pub(crate) fn phase(&self) -> RenewalPhase {
        RenewalPhase::from(self.state.lock().machine.state())
    }

    /// Callers currently waiting on the in-flight episode.
    pub(crate) fn pending(&self) -> usize {
        self.state.lock().waiters.len()
    }

    /// Renewal episodes started since construction.
    pub(crate) fn episodes_started(&self) -> u64 {
        self.state.lock().episodes
    }

    /// Wait for a renewed credential, joining the in-flight episode or
    /// starting one.
    pub(crate) async fn renewed_credential(self: &Arc<Self>) -> RenewalOutcome {
        let (tx, rx) = oneshot::channel();

        match self.admit(tx) {
            Admission::Joined => {}
            Admission::Started {
                episode,
                refresh_token,
                generation,
            } => {
                let coordinator = Arc::clone(self);
                tokio::spawn(async move {
                    coordinator
                        .run_episode(episode, refresh_token, generation)
                        .await;
                });
            }
            Admission::NoRenewalCredential => {
                warn!("Renewal required but no usable renewal credential is held");
                self.end_session();
                return Err(ClassifiedError::session_expired(
                    Failure::MissingRenewalCredential,
                ));
            }
        }

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ClassifiedError::session_expired(Failure::RenewalAbandoned)),
        }
    }

    /// Clear the session and report it ended (at most once per session).
    pub(crate) fn end_session(&self) {
        self.store.clear();
        self.notifier.notify_session_ended();
    }

    fn admit(&self, waiter: Waiter) -> Admission {
        let mut state = self.state.lock();

        if *state.machine.state() == RenewalMachineState::Renewing {
            state.waiters.push_back(waiter);
            debug!(
                episode = state.episodes,
                queued = state.waiters.len(),
                "Joined in-flight renewal"
            );
            return Admission::Joined;
        }

        let Some((refresh_token, generation)) = self.store.renewal_snapshot() else {
            return Admission::NoRenewalCredential;
        };

        transition(&mut state, &RenewalInput::RenewalRequired);
        state.episodes += 1;
        state.waiters.push_back(waiter);

        Admission::Started {
            episode: state.episodes,
            refresh_token,
            generation,
        }
    }

    async fn run_episode(&self, episode: u64, refresh_token: String, generation: u64) {
        let mut guard = EpisodeGuard {
            coordinator: self,
            episode,
            settled: false,
        };
        info!(episode, "Credential renewal started");

        let outcome = self.renew(&refresh_token).await;
        guard.settled = true;

        match outcome {
            Ok((credential, identity)) => self.succeed(episode, generation, credential, identity),
            Err(failure) => self.fail(episode, failure),
        }
    }

    async fn renew(&self, refresh_token: &str) -> Result<(Credential, Option<Identity>), Failure> {
        let request = ApiRequest::post(self.backend.routes().refresh.clone())
            .json(serde_json::json!({ "refresh_token": refresh_token }));
        let http = self.backend.build(&request, None)?;
        let response = self.backend.execute(http).await?;

        if !response.is_success() {
            return Err(Failure::Status {
                status: response.status,
                body: response.body,
            });
        }

        let grant: TokenGrant = serde_json::from_str(&response.body)?;
        Ok(grant.into_credential(Some(refresh_token.to_string())))
    }

    fn succeed(
        &self,
        episode: u64,
        generation: u64,
        credential: Credential,
        identity: Option<Identity>,
    ) {
        if !self
            .store
            .replace_if_unchanged(generation, credential.clone(), identity)
        {
            info!(episode, "Session changed during renewal, discarding renewed credential");
            let waiters = self.settle(&RenewalInput::RenewalFailed);
            let outcome = self
                .store
                .current()
                .filter(|current| !current.is_expired())
                .ok_or_else(|| ClassifiedError::session_expired(Failure::SessionReplaced));
            for waiter in waiters {
                let _ = waiter.send(outcome.clone());
            }
            return;
        }

        let waiters = self.settle(&RenewalInput::RenewalSucceeded);
        info!(episode, resumed = waiters.len(), "Credential renewed");
        self.notifier.renewed(self.store.identity());

        for waiter in waiters {
            let _ = waiter.send(Ok(credential.clone()));
        }
    }

    fn fail(&self, episode: u64, failure: Failure) {
        warn!(episode, error = %failure, "Credential renewal failed, ending session");
        self.store.clear();

        let waiters = self.settle(&RenewalInput::RenewalFailed);
        let error = ClassifiedError::session_expired(failure);
        debug!(episode, failed = waiters.len(), "Failing queued callers");
        for waiter in waiters {
            let _ = waiter.send(Err(error.clone()));
        }

        self.notifier.notify_session_ended();
    }

    /// The episode task died before settling. Release the queue but leave
    /// the stored credential alone: nothing is known about it.
    fn abandon(&self, episode: u64) {
        error!(episode, "Renewal episode abandoned before settling");
        let waiters = self.settle(&RenewalInput::RenewalFailed);
        let error = ClassifiedError::session_expired(Failure::RenewalAbandoned);
        for waiter in waiters {
            let _ = waiter.send(Err(error.clone()));
        }
    }

    fn settle(&self, input: &RenewalInput) -> VecDeque<Waiter> {
        let mut state = self.state.lock();
        transition(&mut state, input);
        std::mem::take(&mut state.waiters)
    }
}

fn transition(state: &mut RenewalState, input: &RenewalInput) {
    let old_state = RenewalPhase::from(state.machine.state());
    if state.machine.consume(input).is_err() {
        error!(
            input = ?input,
            state = ?old_state,
            "Impossible renewal state transition"
        );
        return;
    }
    debug!(
        old_state = ?old_state,
        new_state = ?RenewalPhase::from(state.machine.state()),
        "Renewal state transition"
    );
}

struct EpisodeGuard<'a> {
    coordinator: &'a RenewalCoordinator,
    episode: u64,
    settled: bool,
}

impl Drop for EpisodeGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.coordinator.abandon(self.episode);
        }
    }
}
