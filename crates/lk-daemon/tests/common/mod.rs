//! Shared fixtures for daemon integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use lk_core::config::RetryPolicy;
use lk_core::error::{GatewayError, StoreError};
use lk_core::session::{ActorState, NewSession, Session, SessionUpdate};
use lk_core::time::{Clock, TokioClock};
use lk_core::traits::{BackendGateway, DeleteAck, ServiceDeleteAck, SessionStore, StateStore};
use lk_core::types::{ResourceId, UserId};
use lk_daemon::actor::ActorDeps;
use lk_daemon::store::{MemorySessionStore, MemoryStateStore};
use lk_daemon::{ActorRegistry, CleanupOrchestrator, LabSessions};

/// Unix time the test clock starts at
pub const BASE_MILLIS: u64 = 1_700_000_000_000;

pub const MINUTE: Duration = Duration::from_secs(60);

/// Backend double that records every call.
///
/// Resource deletions fail while the resource has failures left in
/// `fail_counts`; `u32::MAX` fails forever.
#[derive(Default)]
pub struct FakeGateway {
    calls: Mutex<Vec<String>>,
    fail_counts: Mutex<HashMap<String, u32>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_times(&self, resource: &str, times: u32) {
        self.fail_counts
            .lock()
            .unwrap()
            .insert(resource.to_string(), times);
    }

    /// Block every resource deletion until the returned `Notify` fires
    pub fn hold_deletes(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn resource_deletes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix("delete:").map(str::to_string))
            .collect()
    }

    pub fn expose_deletes(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with("expose:"))
            .count()
    }
}

#[async_trait]
impl BackendGateway for FakeGateway {
    async fn delete_exposed_services(
        &self,
        primary_resource_id: &ResourceId,
    ) -> Result<ServiceDeleteAck, GatewayError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("expose:{}", primary_resource_id));
        Ok(ServiceDeleteAck {
            status: 200,
            body: String::new(),
        })
    }

    async fn delete_resource(
        &self,
        resource_id: &ResourceId,
        _user_id: &UserId,
    ) -> Result<DeleteAck, GatewayError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("delete:{}", resource_id));

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut fail_counts = self.fail_counts.lock().unwrap();
        if let Some(remaining) = fail_counts.get_mut(resource_id.as_str()) {
            if *remaining > 0 {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                return Err(GatewayError::Status {
                    status: 500,
                    body: format!("{} is busy", resource_id),
                });
            }
        }
        Ok(DeleteAck { status: 202 })
    }
}

/// Session store wrapper counting deletions and optionally failing them
pub struct CountingSessionStore {
    inner: MemorySessionStore,
    pub deletes: AtomicUsize,
    failing_deletes: AtomicUsize,
}

impl CountingSessionStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemorySessionStore::new(),
            deletes: AtomicUsize::new(0),
            failing_deletes: AtomicUsize::new(0),
        })
    }

    /// Make the next `times` deletions fail
    pub fn fail_deletes(&self, times: usize) {
        self.failing_deletes.store(times, Ordering::SeqCst);
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionStore for CountingSessionStore {
    async fn insert(&self, session: Session) -> Result<(), StoreError> {
        self.inner.insert(session).await
    }

    async fn get(&self, user_id: &UserId) -> Result<Option<Session>, StoreError> {
        self.inner.get(user_id).await
    }

    async fn update(
        &self,
        user_id: &UserId,
        update: &SessionUpdate,
        now_millis: u64,
    ) -> Result<Session, StoreError> {
        self.inner.update(user_id, update, now_millis).await
    }

    async fn delete(&self, user_id: &UserId) -> Result<bool, StoreError> {
        let failing = self.failing_deletes.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_deletes.store(failing - 1, Ordering::SeqCst);
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk unavailable",
            )));
        }
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(user_id).await
    }

    async fn list(&self) -> Result<Vec<Session>, StoreError> {
        self.inner.list().await
    }
}

/// State store wrapper counting clears and optionally failing them
#[derive(Default)]
pub struct CountingStateStore {
    inner: MemoryStateStore,
    pub clears: AtomicUsize,
    failing_clears: AtomicUsize,
}

impl CountingStateStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    /// Make the next `times` clears fail
    pub fn fail_clears(&self, times: usize) {
        self.failing_clears.store(times, Ordering::SeqCst);
    }
}

#[async_trait]
impl StateStore for CountingStateStore {
    async fn load(&self, user_id: &UserId) -> Result<Option<ActorState>, StoreError> {
        self.inner.load(user_id).await
    }

    async fn save(&self, state: &ActorState) -> Result<(), StoreError> {
        self.inner.save(state).await
    }

    async fn clear(&self, user_id: &UserId) -> Result<(), StoreError> {
        let failing = self.failing_clears.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_clears.store(failing - 1, Ordering::SeqCst);
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk unavailable",
            )));
        }
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.inner.clear(user_id).await
    }

    async fn list(&self) -> Result<Vec<ActorState>, StoreError> {
        self.inner.list().await
    }
}

/// A wired-up daemon core over fakes, driven by tokio's clock
pub struct Harness {
    pub gateway: Arc<FakeGateway>,
    pub sessions: Arc<CountingSessionStore>,
    pub states: Arc<CountingStateStore>,
    pub clock: Arc<dyn Clock>,
    pub registry: ActorRegistry,
    pub service: LabSessions,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_retry(RetryPolicy::default())
    }

    pub fn with_retry(retry: RetryPolicy) -> Self {
        let gateway = FakeGateway::new();
        let sessions = CountingSessionStore::new();
        let states = CountingStateStore::new();
        let clock: Arc<dyn Clock> = Arc::new(TokioClock::starting_at(BASE_MILLIS));

        let registry = ActorRegistry::new(ActorDeps {
            orchestrator: CleanupOrchestrator::new(gateway.clone()),
            sessions: sessions.clone(),
            states: states.clone(),
            clock: Arc::clone(&clock),
            retry,
        });
        let service = LabSessions::new(sessions.clone(), registry.clone(), Arc::clone(&clock));

        Self {
            gateway,
            sessions,
            states,
            clock,
            registry,
            service,
        }
    }
}

pub fn new_session(user: &str, primary: &str, secondary: &[&str], minutes: u32) -> NewSession {
    NewSession {
        user_id: UserId::new(user),
        primary_resource_id: ResourceId::new(primary),
        secondary_resource_ids: secondary.iter().map(|s| ResourceId::new(*s)).collect(),
        duration_minutes: minutes,
    }
}

/// Let paused time run forward, firing any alarms that come due
pub async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
}
