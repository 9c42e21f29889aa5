//! The timer actor task

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use lk_core::error::{CleanupError, ScheduleError};
use lk_core::session::{ActorState, MILLIS_PER_MINUTE};
use lk_core::time;
use lk_core::types::{ResourceId, UserId};

use super::registry::ActorDeps;

/// Commands buffered per actor before senders wait
const MAILBOX_CAPACITY: usize = 32;

/// Arguments of `schedule`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleRequest {
    pub user_id: UserId,
    pub primary_resource_id: ResourceId,
    pub secondary_resource_ids: Vec<ResourceId>,
    pub duration_minutes: u32,
}

impl ScheduleRequest {
    /// Reject requests with missing or empty fields
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.user_id.is_blank() {
            return Err(ScheduleError::MissingField("user_id"));
        }
        if self.primary_resource_id.is_blank() {
            return Err(ScheduleError::MissingField("primary_resource_id"));
        }
        if let Some(index) = self
            .secondary_resource_ids
            .iter()
            .position(ResourceId::is_blank)
        {
            return Err(ScheduleError::InvalidField {
                field: "secondary_resource_ids",
                reason: format!("entry {} is empty", index),
            });
        }
        if self.duration_minutes == 0 {
            return Err(ScheduleError::MissingField("duration_minutes"));
        }
        Ok(())
    }
}

/// What happened when an alarm fired
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FireReport {
    /// No state was held; nothing ran
    NoState,
    /// Resources and session record are gone, state cleared
    Completed,
    /// The attempt failed and a new alarm is armed
    Retrying { next_alarm_at: u64, attempts: u32 },
    /// The attempt failed and the retry policy is used up
    Exhausted { attempts: u32 },
}

/// Reply envelope; `Retired` asks the caller to resend to a fresh actor
pub(crate) enum Reply<T> {
    Done(T),
    Retired,
}

type ReplyTx<T> = oneshot::Sender<Reply<T>>;

pub(crate) enum ActorCommand {
    Schedule {
        request: ScheduleRequest,
        reply: ReplyTx<Result<u64, ScheduleError>>,
    },
    Cancel {
        reply: ReplyTx<Result<Option<UserId>, ScheduleError>>,
    },
    Fire {
        reply: ReplyTx<FireReport>,
    },
    Inspect {
        reply: ReplyTx<Option<ActorState>>,
    },
}

impl ActorCommand {
    fn retire(self) {
        match self {
            ActorCommand::Schedule { reply, .. } => {
                let _ = reply.send(Reply::Retired);
            }
            ActorCommand::Cancel { reply } => {
                let _ = reply.send(Reply::Retired);
            }
            ActorCommand::Fire { reply } => {
                let _ = reply.send(Reply::Retired);
            }
            ActorCommand::Inspect { reply } => {
                let _ = reply.send(Reply::Retired);
            }
        }
    }
}

/// Mailbox of a running actor
#[derive(Clone)]
pub(crate) struct ActorHandle {
    tx: mpsc::Sender<ActorCommand>,
}

impl ActorHandle {
    /// Queue a command, handing it back if the actor has stopped
    pub(crate) async fn send(&self, command: ActorCommand) -> Result<(), ActorCommand> {
        self.tx.send(command).await.map_err(|e| e.0)
    }

    pub(crate) fn same_actor(&self, other: &ActorHandle) -> bool {
        self.tx.same_channel(&other.tx)
    }
}

/// Start an actor for `user_id` and return its mailbox
pub(crate) fn spawn(
    user_id: UserId,
    deps: Arc<ActorDeps>,
    actors: Arc<DashMap<UserId, ActorHandle>>,
    shutdown: CancellationToken,
    tracker: &TaskTracker,
) -> ActorHandle {
    let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
    let handle = ActorHandle { tx };
    let span = tracing::info_span!("timer_actor", user_id = %user_id);

    let actor = TimerActor {
        user_id,
        state: None,
        deps,
        rx,
        handle: handle.clone(),
        actors,
        shutdown,
    };
    tracker.spawn(actor.run().instrument(span));

    handle
}

struct TimerActor {
    user_id: UserId,
    state: Option<ActorState>,
    deps: Arc<ActorDeps>,
    rx: mpsc::Receiver<ActorCommand>,
    handle: ActorHandle,
    actors: Arc<DashMap<UserId, ActorHandle>>,
    shutdown: CancellationToken,
}

async fn sleep_until_alarm(alarm_at: Option<u64>, now: u64) {
    match alarm_at {
        Some(at) => tokio::time::sleep(time::until(at, now)).await,
        None => std::future::pending().await,
    }
}

impl TimerActor {
    async fn run(mut self) {
        self.restore().await;

        loop {
            let alarm_at = self.state.as_ref().and_then(|s| s.alarm_at);
            let now = self.deps.clock.now_millis();

            // Commands win over a due alarm, so a cancel that is already
            // queued is applied before the cleanup would start.
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    tracing::debug!("Timer actor stopping for shutdown");
                    return;
                }
                command = self.rx.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => return,
                },
                _ = sleep_until_alarm(alarm_at, now) => {
                    self.on_alarm_fired().await;
                }
            }

            if self.state.is_none() {
                self.retire().await;
                return;
            }
        }
    }

    /// Load persisted state and re-arm anything an earlier process left behind
    async fn restore(&mut self) {
        let mut state = match self.deps.states.load(&self.user_id).await {
            Ok(Some(state)) if state.completed => {
                tracing::debug!("Discarding timer state of a finished cleanup");
                if let Err(e) = self.deps.states.clear(&self.user_id).await {
                    tracing::warn!("Failed to remove finished timer state: {}", e);
                }
                return;
            }
            Ok(Some(state)) => state,
            Ok(None) => return,
            Err(e) => {
                tracing::error!("Failed to load timer state: {}", e);
                return;
            }
        };

        if state.alarm_at.is_none() {
            let now = self.deps.clock.now_millis();
            if !state.exhausted {
                tracing::info!("Resuming cleanup attempt interrupted by restart");
                state.alarm_at = Some(now);
            } else if !self.deps.retry.is_exhausted(state.attempts) {
                tracing::info!(
                    "Retry policy allows more than {} attempts, re-arming",
                    state.attempts
                );
                state.exhausted = false;
                state.alarm_at = Some(now);
            }
            if let Err(e) = self.deps.states.save(&state).await {
                tracing::warn!("Failed to persist restored timer state: {}", e);
            }
        }

        self.state = Some(state);
    }

    async fn handle(&mut self, command: ActorCommand) {
        match command {
            ActorCommand::Schedule { request, reply } => {
                let result = self.schedule(request).await;
                let _ = reply.send(Reply::Done(result));
            }
            ActorCommand::Cancel { reply } => {
                let result = self.cancel().await;
                let _ = reply.send(Reply::Done(result));
            }
            ActorCommand::Fire { reply } => {
                let report = self.on_alarm_fired().await;
                let _ = reply.send(Reply::Done(report));
            }
            ActorCommand::Inspect { reply } => {
                let _ = reply.send(Reply::Done(self.state.clone()));
            }
        }
    }

    async fn schedule(&mut self, request: ScheduleRequest) -> Result<u64, ScheduleError> {
        let now = self.deps.clock.now_millis();
        let alarm_at =
            now.saturating_add(u64::from(request.duration_minutes) * MILLIS_PER_MINUTE);

        let state = ActorState {
            user_id: request.user_id,
            primary_resource_id: request.primary_resource_id,
            secondary_resource_ids: request.secondary_resource_ids,
            duration_minutes: request.duration_minutes,
            created_at: now,
            alarm_at: Some(alarm_at),
            attempts: 0,
            last_error: None,
            exhausted: false,
            completed: false,
        };
        self.deps.states.save(&state).await?;

        if let Some(previous) = self.state.as_ref().and_then(|s| s.alarm_at) {
            tracing::debug!("Replacing pending alarm at {}", previous);
        }
        tracing::info!(
            "Cleanup of {} scheduled in {} minutes",
            state.primary_resource_id,
            state.duration_minutes
        );
        self.state = Some(state);

        Ok(alarm_at)
    }

    async fn cancel(&mut self) -> Result<Option<UserId>, ScheduleError> {
        // The persisted copy goes first. If it cannot be removed the alarm
        // stays armed here too, so memory and store never disagree.
        self.deps.states.clear(&self.user_id).await?;
        let canceled = self.state.take().map(|s| s.user_id);

        if canceled.is_some() {
            tracing::info!("Scheduled cleanup canceled");
        }
        Ok(canceled)
    }

    async fn on_alarm_fired(&mut self) -> FireReport {
        let Some(mut state) = self.state.take() else {
            tracing::debug!("Alarm fired without timer state, ignoring");
            return FireReport::NoState;
        };

        state.alarm_at = None;
        if let Err(e) = self.deps.states.save(&state).await {
            tracing::warn!("Failed to persist firing state: {}", e);
        }

        tracing::info!(
            "Lease expired, tearing down {} and {} secondary resources",
            state.primary_resource_id,
            state.secondary_resource_ids.len()
        );

        match self.cleanup(&state).await {
            Ok(()) => {
                self.discard_finished(state).await;
                tracing::info!("Cleanup complete");
                FireReport::Completed
            }
            Err(e) => {
                state.attempts = state.attempts.saturating_add(1);
                state.last_error = Some(e.to_string());

                let report = if self.deps.retry.is_exhausted(state.attempts) {
                    state.exhausted = true;
                    tracing::error!(
                        "Cleanup failed {} times, giving up: {}",
                        state.attempts,
                        e
                    );
                    FireReport::Exhausted {
                        attempts: state.attempts,
                    }
                } else {
                    let delay = self.deps.retry.delay_for(state.attempts);
                    let next_alarm_at = self
                        .deps
                        .clock
                        .now_millis()
                        .saturating_add(time::as_millis(delay));
                    state.alarm_at = Some(next_alarm_at);
                    tracing::warn!(
                        "Cleanup attempt {} failed, retrying in {:?}: {}",
                        state.attempts,
                        delay,
                        e
                    );
                    FireReport::Retrying {
                        next_alarm_at,
                        attempts: state.attempts,
                    }
                };

                if let Err(e) = self.deps.states.save(&state).await {
                    tracing::error!("Failed to persist retry state: {}", e);
                }
                self.state = Some(state);
                report
            }
        }
    }

    /// Remove the state of a finished cleanup.
    ///
    /// When the removal fails the state is rewritten as completed, which
    /// `restore` drops instead of re-arming.
    async fn discard_finished(&self, mut state: ActorState) {
        let Err(e) = self.deps.states.clear(&self.user_id).await else {
            return;
        };
        tracing::warn!("Failed to clear timer state after cleanup: {}", e);

        state.completed = true;
        if let Err(e) = self.deps.states.save(&state).await {
            tracing::error!("Finished timer state could not be cleared or marked: {}", e);
        }
    }

    /// Tear down resources, then remove the session record
    async fn cleanup(&self, state: &ActorState) -> Result<(), CleanupError> {
        self.deps
            .orchestrator
            .run(
                &state.user_id,
                &state.primary_resource_id,
                &state.secondary_resource_ids,
            )
            .await
            .into_result()?;

        if !self.deps.sessions.delete(&state.user_id).await? {
            tracing::debug!("Session record was already removed");
        }
        Ok(())
    }

    /// Leave the registry, bounce anything still queued, and stop
    async fn retire(mut self) {
        let own = self.handle.clone();
        self.actors
            .remove_if(&self.user_id, |_, handle| handle.same_actor(&own));

        self.rx.close();
        while let Some(command) = self.rx.recv().await {
            command.retire();
        }
        tracing::debug!("Timer actor retired");
    }
}
