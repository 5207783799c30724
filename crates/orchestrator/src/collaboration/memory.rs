//! In-process collaboration backend.
//!
//! Replicas that share a room name propagate their metadata writes to each
//! other, arriving at peers with [`Origin::Remote`]. Used for local-only
//! sessions and to exercise the orchestrator's collaboration paths.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, Weak,
    },
};

use tracing::debug;

use super::{
    AttachContext, CollaborationBackend, CollaborationHandle, MetaChange, MetaObserver,
    MetaValue, ObserverId, Origin, Replica, SyncProvider, Transport, META_IMMEDIATE_SAVE,
    META_IMMEDIATE_SAVE_FINISHED,
};
use crate::{
    config::{CollaborationConfig, CommentsConfig},
    document::Document,
    types::DocumentId,
    Error, Result,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ═══════════════════════════════════════════════════════════════════════════
// ROOMS & REPLICAS
// ═══════════════════════════════════════════════════════════════════════════

/// Replicas of the same shared document.
#[derive(Debug, Default)]
pub struct MemoryRoom {
    members: Mutex<Vec<Weak<MemoryReplica>>>,
}

impl MemoryRoom {
    /// Create a replica that is a member of this room.
    pub fn join(self: &Arc<Self>, name: impl Into<String>) -> Arc<MemoryReplica> {
        let replica = Arc::new(MemoryReplica {
            name: name.into(),
            room: Some(Arc::clone(self)),
            state: Mutex::new(ReplicaState::default()),
        });
        let mut members = lock(&self.members);
        members.retain(|member| member.strong_count() > 0);
        members.push(Arc::downgrade(&replica));
        drop(members);
        replica
    }

    /// Members whose replica is still alive.
    pub fn live_members(&self) -> usize {
        lock(&self.members)
            .iter()
            .filter(|member| member.strong_count() > 0)
            .count()
    }

    fn peers_of(&self, replica: &MemoryReplica) -> Vec<Arc<MemoryReplica>> {
        lock(&self.members)
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|member| !std::ptr::eq(member.as_ref(), replica))
            .collect()
    }
}

#[derive(Default)]
struct ReplicaState {
    meta: BTreeMap<String, MetaValue>,
    observers: Vec<(ObserverId, MetaObserver)>,
    next_observer: u64,
    destroyed: bool,
}

impl std::fmt::Debug for ReplicaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicaState")
            .field("meta", &self.meta)
            .field("observers", &self.observers.len())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

/// A replica whose shared metadata lives in memory.
#[derive(Debug)]
pub struct MemoryReplica {
    name: String,
    room: Option<Arc<MemoryRoom>>,
    state: Mutex<ReplicaState>,
}

impl MemoryReplica {
    /// A replica with no peers.
    pub fn standalone(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            room: None,
            state: Mutex::new(ReplicaState::default()),
        })
    }

    pub fn is_destroyed(&self) -> bool {
        lock(&self.state).destroyed
    }

    pub fn observer_count(&self) -> usize {
        lock(&self.state).observers.len()
    }

    /// Apply writes as if they arrived from a peer.
    pub fn apply_remote(&self, writes: Vec<(String, MetaValue)>) {
        self.apply(writes, Origin::Remote);
    }

    fn apply(&self, writes: Vec<(String, MetaValue)>, origin: Origin) -> bool {
        let mut state = lock(&self.state);
        if state.destroyed {
            debug!(replica = %self.name, "Ignoring write to destroyed replica");
            return false;
        }

        let mut keys = BTreeSet::new();
        for (key, value) in writes {
            keys.insert(key.clone());
            state.meta.insert(key, value);
        }
        let observers: Vec<MetaObserver> = state
            .observers
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        drop(state);

        let change = MetaChange { keys, origin };
        for observer in observers {
            observer(&change);
        }
        true
    }
}

impl Replica for MemoryReplica {
    fn name(&self) -> &str {
        &self.name
    }

    fn transact_meta(&self, writes: Vec<(String, MetaValue)>) {
        if !self.apply(writes.clone(), Origin::Local) {
            return;
        }
        if let Some(room) = &self.room {
            for peer in room.peers_of(self) {
                peer.apply(writes.clone(), Origin::Remote);
            }
        }
    }

    fn get_meta(&self, key: &str) -> Option<MetaValue> {
        lock(&self.state).meta.get(key).cloned()
    }

    fn observe_meta(&self, observer: MetaObserver) -> ObserverId {
        let mut state = lock(&self.state);
        state.next_observer += 1;
        let id = ObserverId(state.next_observer);
        state.observers.push((id, observer));
        id
    }

    fn unobserve_meta(&self, id: ObserverId) {
        lock(&self.state).observers.retain(|(existing, _)| *existing != id);
    }

    fn destroy(&self) {
        let mut state = lock(&self.state);
        state.destroyed = true;
        state.observers.clear();
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PROVIDER & TRANSPORT
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct MemoryProvider {
    name: String,
    connected: AtomicBool,
    destroyed: AtomicBool,
}

impl MemoryProvider {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            connected: AtomicBool::new(true),
            destroyed: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

impl SyncProvider for MemoryProvider {
    fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug)]
pub struct MemoryTransport {
    url: Option<String>,
    connected: AtomicBool,
    retry_cancelled: AtomicBool,
    destroyed: AtomicBool,
}

impl MemoryTransport {
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn is_retry_cancelled(&self) -> bool {
        self.retry_cancelled.load(Ordering::SeqCst)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

impl Transport for MemoryTransport {
    fn cancel_retry(&self) {
        self.retry_cancelled.store(true, Ordering::SeqCst);
    }

    fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// BACKEND
// ═══════════════════════════════════════════════════════════════════════════

/// Collaboration backend wiring replicas together in memory.
///
/// With [`MemoryBackend::with_save_acknowledgments`], every open room gets
/// one persistence peer that answers `immediate-save` requests by writing
/// `immediate-save-finished`. A peer is released once it is the only live
/// member left in its room.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    rooms: Mutex<HashMap<String, Arc<MemoryRoom>>>,
    transports: Mutex<Vec<Arc<MemoryTransport>>>,
    providers: Mutex<Vec<Arc<MemoryProvider>>>,
    persistence_peers: Mutex<HashMap<String, Arc<MemoryReplica>>>,
    comments_channel: Mutex<Option<String>>,
    acknowledge_saves: bool,
    fail_connect: bool,
    failing_documents: HashSet<DocumentId>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_save_acknowledgments(mut self) -> Self {
        self.acknowledge_saves = true;
        self
    }

    /// Make `connect` fail with a network error.
    #[must_use]
    pub fn fail_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Make attaching the given document fail.
    #[must_use]
    pub fn fail_document(mut self, id: DocumentId) -> Self {
        self.failing_documents.insert(id);
        self
    }

    /// The room of a shared document, created on first use.
    pub fn room(&self, name: &str) -> Arc<MemoryRoom> {
        Arc::clone(
            lock(&self.rooms)
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(MemoryRoom::default())),
        )
    }

    /// Join a room as an additional peer.
    pub fn join(&self, room: &str, peer_name: impl Into<String>) -> Arc<MemoryReplica> {
        self.room(room).join(peer_name)
    }

    pub fn transports(&self) -> Vec<Arc<MemoryTransport>> {
        lock(&self.transports).clone()
    }

    pub fn providers(&self) -> Vec<Arc<MemoryProvider>> {
        lock(&self.providers).clone()
    }

    /// Replica name comment sync was started on.
    pub fn comments_channel(&self) -> Option<String> {
        lock(&self.comments_channel).clone()
    }

    /// Rooms currently served by a persistence peer.
    pub fn persistence_peer_count(&self) -> usize {
        lock(&self.persistence_peers).len()
    }

    fn open(&self, room_name: &str) -> CollaborationHandle {
        let room = self.room(room_name);
        let replica = room.join(room_name);
        if self.acknowledge_saves {
            self.ensure_persistence_peer(&room, room_name);
        }
        let provider = MemoryProvider::new(room_name);
        lock(&self.providers).push(Arc::clone(&provider));
        CollaborationHandle::new(replica, provider)
    }

    fn ensure_persistence_peer(&self, room: &Arc<MemoryRoom>, room_name: &str) {
        let rooms = lock(&self.rooms);
        let mut peers = lock(&self.persistence_peers);
        peers.retain(|name, _| {
            name == room_name || rooms.get(name).is_some_and(|other| other.live_members() > 1)
        });
        drop(rooms);
        if !peers.contains_key(room_name) {
            peers.insert(room_name.to_string(), Self::spawn_persistence_peer(room, room_name));
            debug!(room = room_name, "Persistence peer joined");
        }
    }

    fn spawn_persistence_peer(room: &Arc<MemoryRoom>, room_name: &str) -> Arc<MemoryReplica> {
        let peer = room.join(format!("{room_name}#persistence"));
        let weak = Arc::downgrade(&peer);
        peer.observe_meta(Arc::new(move |change: &MetaChange| {
            if change.is_local() || !change.has(META_IMMEDIATE_SAVE) {
                return;
            }
            if let Some(peer) = weak.upgrade() {
                let finished = peer
                    .get_meta(META_IMMEDIATE_SAVE_FINISHED)
                    .and_then(|value| value.as_bool())
                    .unwrap_or(false);
                peer.set_meta(META_IMMEDIATE_SAVE_FINISHED, MetaValue::Bool(!finished));
            }
        }));
        peer
    }
}

impl CollaborationBackend for MemoryBackend {
    fn connect(&self, config: &CollaborationConfig) -> Result<Arc<dyn Transport>> {
        if self.fail_connect {
            return Err(Error::network(format!(
                "unable to reach {}",
                config.url.as_deref().unwrap_or("collaboration server")
            )));
        }
        let transport = Arc::new(MemoryTransport {
            url: config.url.clone(),
            connected: AtomicBool::new(true),
            retry_cancelled: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
        });
        lock(&self.transports).push(Arc::clone(&transport));
        Ok(transport)
    }

    fn attach_document(
        &self,
        _ctx: &AttachContext<'_>,
        document: &Document,
    ) -> Result<CollaborationHandle> {
        if self.failing_documents.contains(&document.id) {
            return Err(Error::network(format!(
                "failed to open replica for {}",
                document.id
            )));
        }
        Ok(self.open(document.id.as_str()))
    }

    fn create_session_channel(&self, ctx: &AttachContext<'_>) -> Result<CollaborationHandle> {
        Ok(self.open(&format!("session:{}", ctx.session_id)))
    }

    fn init_comments_sync(
        &self,
        handle: &CollaborationHandle,
        _comments: &CommentsConfig,
    ) -> Result<()> {
        *lock(&self.comments_channel) = Some(handle.replica.name().to_string());
        Ok(())
    }
}
