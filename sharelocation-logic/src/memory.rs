//! In-process collaborators, used by tests and the simulation daemon.
//!
//! Every type here keeps its state behind plain mutexes and completes its futures
//! immediately. The store and the account registry can be told to fail, which is how
//! outages are simulated.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
};

use futures::StreamExt;
use log::warn;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    account::MIN_PASSWORD_LEN,
    auth::{AuthError, AuthProvider},
    location::{Location, LocationRequest, Permission, PositionError, PositionSource, PositionStream},
    map::{MapSurface, MarkerHandle},
    record::{PositionUpdate, UserId, UserPosition},
    store::{PositionStore, StoreError},
};

/// Shared store living in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<UserId, UserPosition>>,
    attempted_writes: Mutex<Vec<(UserId, PositionUpdate)>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following write fail (or succeed again)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every following read fail (or succeed again)
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// All writes attempted so far, including ones that failed
    pub fn attempted_writes(&self) -> Vec<(UserId, PositionUpdate)> {
        self.attempted_writes.lock().unwrap().clone()
    }

    /// Read a record without going through the (possibly failing) store interface
    pub fn record(&self, user_id: &str) -> Option<UserPosition> {
        self.records.lock().unwrap().get(user_id).cloned()
    }

    pub fn records(&self) -> Vec<UserPosition> {
        self.records.lock().unwrap().values().cloned().collect()
    }

    /// Insert or replace a whole record
    pub fn insert(&self, record: UserPosition) {
        self.records
            .lock()
            .unwrap()
            .insert(record.user_id.clone(), record);
    }
}

impl PositionStore for MemoryStore {
    async fn upsert(&self, user_id: &str, update: PositionUpdate) -> Result<(), StoreError> {
        self.attempted_writes
            .lock()
            .unwrap()
            .push((user_id.to_string(), update.clone()));

        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::WriteFailed("simulated outage".to_string()));
        }

        self.records
            .lock()
            .unwrap()
            .entry(user_id.to_string())
            .or_insert_with(|| UserPosition::new(user_id))
            .apply(&update);

        Ok(())
    }

    async fn get(&self, user_id: &str) -> Result<Option<UserPosition>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::ReadFailed("simulated outage".to_string()));
        }
        Ok(self.record(user_id))
    }

    async fn get_all(&self) -> Result<Vec<UserPosition>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::ReadFailed("simulated outage".to_string()));
        }
        Ok(self.records())
    }
}

#[derive(Debug, Clone)]
struct Account {
    user_id: UserId,
    password: String,
}

/// Accounts known to the simulated auth provider, shared by every [MemoryAuth]
#[derive(Debug, Default)]
pub struct AccountRegistry {
    accounts: Mutex<HashMap<String, Account>>,
    offline: AtomicBool,
}

impl AccountRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every following request fail with [AuthError::Network]
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.accounts.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_online(&self) -> Result<(), AuthError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(AuthError::Network("simulated outage".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Auth provider for one device, accounts are shared through the [AccountRegistry]
#[derive(Debug)]
pub struct MemoryAuth {
    registry: Arc<AccountRegistry>,
    current: Mutex<Option<UserId>>,
    create_calls: AtomicUsize,
}

impl MemoryAuth {
    pub fn new(registry: Arc<AccountRegistry>) -> Self {
        Self {
            registry,
            current: Mutex::new(None),
            create_calls: AtomicUsize::new(0),
        }
    }

    /// Number of times [AuthProvider::create_account] was called
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }
}

impl AuthProvider for MemoryAuth {
    async fn create_account(&self, email: &str, password: &str) -> Result<UserId, AuthError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.registry.check_online()?;

        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }

        let mut accounts = self.registry.accounts.lock().unwrap();
        if accounts.contains_key(email) {
            return Err(AuthError::AlreadyExists);
        }

        let user_id = Uuid::new_v4().to_string();
        accounts.insert(
            email.to_string(),
            Account {
                user_id: user_id.clone(),
                password: password.to_string(),
            },
        );
        drop(accounts);

        // Like most providers, creating an account also signs into it
        *self.current.lock().unwrap() = Some(user_id.clone());
        Ok(user_id)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<UserId, AuthError> {
        self.registry.check_online()?;

        let accounts = self.registry.accounts.lock().unwrap();
        let user_id = accounts
            .get(email)
            .filter(|account| account.password == password)
            .map(|account| account.user_id.clone())
            .ok_or(AuthError::InvalidCredentials)?;
        drop(accounts);

        *self.current.lock().unwrap() = Some(user_id.clone());
        Ok(user_id)
    }

    async fn sign_out(&self) {
        *self.current.lock().unwrap() = None;
    }

    async fn current_user(&self) -> Option<UserId> {
        self.current.lock().unwrap().clone()
    }
}

/// A position source whose location is set by hand
#[derive(Debug)]
pub struct SimulatedPosition {
    current: Mutex<Option<Location>>,
    granted: AtomicBool,
    reads: AtomicUsize,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Result<Location, PositionError>>>>,
    last_request: Mutex<Option<LocationRequest>>,
}

impl Default for SimulatedPosition {
    fn default() -> Self {
        Self {
            current: Mutex::new(None),
            granted: AtomicBool::new(true),
            reads: AtomicUsize::new(0),
            subscribers: Mutex::new(Vec::new()),
            last_request: Mutex::new(None),
        }
    }
}

impl SimulatedPosition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(location: Location) -> Self {
        let source = Self::default();
        source.set_location(location);
        source
    }

    /// Move the device, subscribers receive the new fix right away
    pub fn set_location(&self, location: Location) {
        *self.current.lock().unwrap() = Some(location);
        self.subscribers
            .lock()
            .unwrap()
            .retain(|tx| tx.send(Ok(location)).is_ok());
    }

    /// Revoking the permission ends every subscription with [PositionError::PermissionDenied]
    pub fn set_permission(&self, granted: bool) {
        self.granted.store(granted, Ordering::SeqCst);
        if !granted {
            for tx in self.subscribers.lock().unwrap().drain(..) {
                tx.send(Err(PositionError::PermissionDenied)).ok();
            }
        }
    }

    /// Number of times the last known position was requested
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<LocationRequest> {
        *self.last_request.lock().unwrap()
    }

    fn is_granted(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }
}

impl PositionSource for SimulatedPosition {
    async fn permission(&self) -> Permission {
        if self.is_granted() {
            Permission::Granted
        } else {
            Permission::Denied
        }
    }

    async fn last_known_position(&self) -> Result<Option<Location>, PositionError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if !self.is_granted() {
            return Err(PositionError::PermissionDenied);
        }
        Ok(*self.current.lock().unwrap())
    }

    async fn subscribe(&self, request: LocationRequest) -> Result<PositionStream, PositionError> {
        if !self.is_granted() {
            return Err(PositionError::PermissionDenied);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(location) = *self.current.lock().unwrap() {
            tx.send(Ok(location)).ok();
        }
        self.subscribers.lock().unwrap().push(tx);
        *self.last_request.lock().unwrap() = Some(request);

        let stream =
            futures::stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|loc| (loc, rx)) });

        Ok(stream.boxed())
    }

    async fn unsubscribe(&self) {
        self.subscribers.lock().unwrap().clear();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawnMarker {
    pub location: Location,
    pub title: String,
}

/// Map surface that only remembers what was drawn
#[derive(Debug, Default)]
pub struct MemoryMap {
    next_handle: AtomicU64,
    markers: Mutex<HashMap<MarkerHandle, DrawnMarker>>,
    camera: Mutex<Option<(Location, f32)>>,
    added: AtomicUsize,
}

impl MemoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn marker(&self, handle: MarkerHandle) -> Option<DrawnMarker> {
        self.markers.lock().unwrap().get(&handle).cloned()
    }

    pub fn marker_count(&self) -> usize {
        self.markers.lock().unwrap().len()
    }

    /// Total markers ever added, including removed ones
    pub fn added_count(&self) -> usize {
        self.added.load(Ordering::SeqCst)
    }

    pub fn camera(&self) -> Option<(Location, f32)> {
        *self.camera.lock().unwrap()
    }
}

impl MapSurface for MemoryMap {
    fn add_marker(&self, location: Location, title: &str) -> MarkerHandle {
        let handle = MarkerHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.added.fetch_add(1, Ordering::SeqCst);
        self.markers.lock().unwrap().insert(
            handle,
            DrawnMarker {
                location,
                title: title.to_string(),
            },
        );
        handle
    }

    fn move_marker(&self, handle: MarkerHandle, location: Location) {
        match self.markers.lock().unwrap().get_mut(&handle) {
            Some(marker) => marker.location = location,
            None => warn!("Tried to move unknown marker {handle:?}"),
        }
    }

    fn set_marker_title(&self, handle: MarkerHandle, title: &str) {
        match self.markers.lock().unwrap().get_mut(&handle) {
            Some(marker) => marker.title = title.to_string(),
            None => warn!("Tried to rename unknown marker {handle:?}"),
        }
    }

    fn remove_marker(&self, handle: MarkerHandle) {
        self.markers.lock().unwrap().remove(&handle);
    }

    fn center_on(&self, location: Location, zoom: f32) {
        *self.camera.lock().unwrap() = Some((location, zoom));
    }
}
