//! Addressing timer actors by user

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use lk_core::config::RetryPolicy;
use lk_core::error::{ScheduleError, StoreError};
use lk_core::session::ActorState;
use lk_core::time::Clock;
use lk_core::traits::{SessionStore, StateStore};
use lk_core::types::UserId;

use super::timer::{self, ActorCommand, ActorHandle, FireReport, Reply, ScheduleRequest};
use crate::orchestrator::CleanupOrchestrator;

/// Times a command is resent after landing on a retiring actor
const MAX_DISPATCH_ATTEMPTS: usize = 3;

/// Collaborators shared by every timer actor
pub struct ActorDeps {
    pub orchestrator: CleanupOrchestrator,
    pub sessions: Arc<dyn SessionStore>,
    pub states: Arc<dyn StateStore>,
    pub clock: Arc<dyn Clock>,
    pub retry: RetryPolicy,
}

/// Routes commands to the single actor owning each user.
///
/// Actors are spawned on first use and remove themselves once they hold no
/// state, so the map only contains users with a pending or failing cleanup
/// (plus actors that are about to retire).
#[derive(Clone)]
pub struct ActorRegistry {
    actors: Arc<DashMap<UserId, ActorHandle>>,
    deps: Arc<ActorDeps>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl ActorRegistry {
    /// Create an empty registry
    pub fn new(deps: ActorDeps) -> Self {
        Self {
            actors: Arc::new(DashMap::new()),
            deps: Arc::new(deps),
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Arm (or replace) the user's cleanup alarm.
    ///
    /// Returns the alarm instant in unix millis.
    pub async fn schedule(&self, request: ScheduleRequest) -> Result<u64, ScheduleError> {
        request.validate()?;
        let user_id = request.user_id.clone();

        self.dispatch(&user_id, |reply| ActorCommand::Schedule {
            request: request.clone(),
            reply,
        })
        .await?
    }

    /// Drop the user's state and alarm.
    ///
    /// Returns the user ID if anything was scheduled, `None` otherwise.
    pub async fn cancel(&self, user_id: &UserId) -> Result<Option<UserId>, ScheduleError> {
        if user_id.is_blank() {
            return Err(ScheduleError::MissingField("user_id"));
        }

        self.dispatch(user_id, |reply| ActorCommand::Cancel { reply })
            .await?
    }

    /// Run the alarm handler now, as if the alarm had fired
    pub async fn fire(&self, user_id: &UserId) -> Result<FireReport, ScheduleError> {
        self.dispatch(user_id, |reply| ActorCommand::Fire { reply })
            .await
    }

    /// Snapshot of the actor's state, `None` when idle
    pub async fn inspect(&self, user_id: &UserId) -> Result<Option<ActorState>, ScheduleError> {
        self.dispatch(user_id, |reply| ActorCommand::Inspect { reply })
            .await
    }

    /// Start an actor for every persisted state so their alarms are re-armed
    pub async fn rehydrate(&self) -> Result<usize, StoreError> {
        let states = self.deps.states.list().await?;
        for state in &states {
            self.handle_for(&state.user_id);
        }

        if !states.is_empty() {
            tracing::info!("Restored {} timer actors from persisted state", states.len());
        }
        Ok(states.len())
    }

    /// Number of live actors
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    /// Check if no actors are live
    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Stop every actor and wait for them to exit.
    ///
    /// Persisted state is kept; alarms are re-armed by [`rehydrate`] on the
    /// next start.
    ///
    /// [`rehydrate`]: ActorRegistry::rehydrate
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        self.actors.clear();
        tracing::debug!("All timer actors stopped");
    }

    async fn dispatch<T>(
        &self,
        user_id: &UserId,
        make: impl Fn(oneshot::Sender<Reply<T>>) -> ActorCommand,
    ) -> Result<T, ScheduleError> {
        for _ in 0..MAX_DISPATCH_ATTEMPTS {
            if self.shutdown.is_cancelled() {
                break;
            }

            let handle = self.handle_for(user_id);
            let (tx, rx) = oneshot::channel();
            if handle.send(make(tx)).await.is_err() {
                self.forget(user_id, &handle);
                continue;
            }

            match rx.await {
                Ok(Reply::Done(value)) => return Ok(value),
                Ok(Reply::Retired) | Err(_) => self.forget(user_id, &handle),
            }
        }

        Err(ScheduleError::ActorStopped(user_id.clone()))
    }

    fn handle_for(&self, user_id: &UserId) -> ActorHandle {
        self.actors
            .entry(user_id.clone())
            .or_insert_with(|| {
                timer::spawn(
                    user_id.clone(),
                    Arc::clone(&self.deps),
                    Arc::clone(&self.actors),
                    self.shutdown.clone(),
                    &self.tracker,
                )
            })
            .clone()
    }

    fn forget(&self, user_id: &UserId, handle: &ActorHandle) {
        self.actors
            .remove_if(user_id, |_, current| current.same_actor(handle));
    }
}
