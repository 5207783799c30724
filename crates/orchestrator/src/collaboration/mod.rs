//! Collaboration Initializer
//!
//! Attaches CRDT replicas and sync providers to the documents of a session
//! and decides the session-wide collaboration handle. The replica, provider
//! and transport are external collaborators modeled as traits; the wire
//! protocol lives behind [`CollaborationBackend`].
//!
//! Runs once, at session construction.

pub mod memory;

use std::{collections::BTreeSet, fmt, sync::Arc};

use tracing::{debug, info, warn};

use crate::{
    config::{CollaborationConfig, CommentsConfig, ModulesConfig},
    document::Document,
    types::User,
    Error, Result,
};

pub use memory::{MemoryBackend, MemoryProvider, MemoryReplica, MemoryTransport};

// ═══════════════════════════════════════════════════════════════════════════
// SHARED METADATA
// ═══════════════════════════════════════════════════════════════════════════

/// Metadata key holding the lock flag.
pub const META_LOCKED: &str = "locked";
/// Metadata key holding the user who set the lock.
pub const META_LOCKED_BY: &str = "lockedBy";
/// Metadata key a client sets to request an immediate save.
pub const META_IMMEDIATE_SAVE: &str = "immediate-save";
/// Metadata key flipped by the persistence peer once the save is done.
pub const META_IMMEDIATE_SAVE_FINISHED: &str = "immediate-save-finished";

pub type MetaValue = serde_json::Value;

/// Whether a metadata transaction was issued by this replica or received
/// from a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Local,
    Remote,
}

/// Keys touched by one metadata transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaChange {
    pub keys: BTreeSet<String>,
    pub origin: Origin,
}

impl MetaChange {
    pub fn has(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub const fn is_local(&self) -> bool {
        matches!(self.origin, Origin::Local)
    }
}

pub type MetaObserver = Arc<dyn Fn(&MetaChange) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub u64);

// ═══════════════════════════════════════════════════════════════════════════
// EXTERNAL COLLABORATORS
// ═══════════════════════════════════════════════════════════════════════════

/// A CRDT replica exposing its shared metadata map.
pub trait Replica: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Apply all writes inside one atomic transaction.
    fn transact_meta(&self, writes: Vec<(String, MetaValue)>);

    fn set_meta(&self, key: &str, value: MetaValue) {
        self.transact_meta(vec![(key.to_string(), value)]);
    }

    fn get_meta(&self, key: &str) -> Option<MetaValue>;

    fn observe_meta(&self, observer: MetaObserver) -> ObserverId;

    fn unobserve_meta(&self, id: ObserverId);

    fn destroy(&self);
}

/// Propagates replica updates between peers.
pub trait SyncProvider: Send + Sync + fmt::Debug {
    fn disconnect(&self);
    fn destroy(&self);
}

/// The one socket shared by every provider of a session.
pub trait Transport: Send + Sync + fmt::Debug {
    fn cancel_retry(&self);
    fn disconnect(&self);
    fn destroy(&self);
}

/// A replica together with the provider syncing it.
#[derive(Debug, Clone)]
pub struct CollaborationHandle {
    pub replica: Arc<dyn Replica>,
    pub provider: Arc<dyn SyncProvider>,
}

impl CollaborationHandle {
    pub fn new(replica: Arc<dyn Replica>, provider: Arc<dyn SyncProvider>) -> Self {
        Self { replica, provider }
    }

    /// Disconnect and destroy the provider, then destroy the replica.
    pub fn shutdown(&self) {
        self.provider.disconnect();
        self.provider.destroy();
        self.replica.destroy();
    }
}

/// Session-wide collaboration handle, selected once at initialization.
#[derive(Debug, Clone, Default)]
pub enum CollaborationMode {
    /// Not collaborative
    #[default]
    None,
    /// The session reuses the first document's replica/provider
    PerDocument(CollaborationHandle),
    /// A dedicated replica/provider for cross-document sync
    SharedSession(CollaborationHandle),
}

impl CollaborationMode {
    pub const fn handle(&self) -> Option<&CollaborationHandle> {
        match self {
            Self::None => None,
            Self::PerDocument(handle) | Self::SharedSession(handle) => Some(handle),
        }
    }

    pub const fn is_collaborative(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Everything a backend needs to open a channel.
#[derive(Debug, Clone, Copy)]
pub struct AttachContext<'a> {
    pub session_id: &'a str,
    pub transport: &'a Arc<dyn Transport>,
    pub config: &'a CollaborationConfig,
    pub user: &'a User,
}

/// Creates transports, replicas and providers for a given wire protocol.
pub trait CollaborationBackend: Send + Sync {
    /// Open the single shared socket of the session.
    fn connect(&self, config: &CollaborationConfig) -> Result<Arc<dyn Transport>>;

    /// Create the replica/provider pair of one document.
    fn attach_document(
        &self,
        ctx: &AttachContext<'_>,
        document: &Document,
    ) -> Result<CollaborationHandle>;

    /// Create the dedicated session-wide replica/provider pair.
    fn create_session_channel(&self, ctx: &AttachContext<'_>) -> Result<CollaborationHandle>;

    /// Start comment synchronization over the resolved session handle.
    fn init_comments_sync(
        &self,
        _handle: &CollaborationHandle,
        _comments: &CommentsConfig,
    ) -> Result<()> {
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// INITIALIZATION
// ═══════════════════════════════════════════════════════════════════════════

/// Outcome of collaboration setup.
///
/// Failures are collected rather than returned; the session re-emits them as
/// `exception` events.
#[derive(Debug, Default)]
pub struct CollaborationSetup {
    pub transport: Option<Arc<dyn Transport>>,
    pub mode: CollaborationMode,
    pub failures: Vec<Error>,
}

/// Attach collaboration to `documents` when the collaboration module is
/// configured. Without it the documents are left untouched.
pub fn initialize(
    backend: &dyn CollaborationBackend,
    modules: &ModulesConfig,
    session_id: &str,
    user: &User,
    documents: &mut [Document],
) -> CollaborationSetup {
    let Some(config) = modules.collaboration.as_ref() else {
        return CollaborationSetup::default();
    };

    let mut setup = CollaborationSetup::default();

    let transport = match backend.connect(config) {
        Ok(transport) => transport,
        Err(e) => {
            warn!(error = %e, "Collaboration transport failed to connect");
            setup.failures.push(e);
            return setup;
        }
    };
    info!(provider = %config.provider_type, "Collaboration transport connected");

    let ctx = AttachContext {
        session_id,
        transport: &transport,
        config,
        user,
    };

    for document in documents.iter_mut() {
        match backend.attach_document(&ctx, document) {
            Ok(handle) => {
                debug!(document_id = %document.id, replica = handle.replica.name(), "Attached replica");
                document.attach_collaboration(handle);
            }
            Err(e) => {
                warn!(document_id = %document.id, error = %e, "Failed to attach replica");
                setup.failures.push(e);
            }
        }
    }

    let comments = modules.comments.clone().unwrap_or_default();

    setup.mode = if comments.wants_dedicated_channel() {
        match backend.create_session_channel(&ctx) {
            Ok(handle) => CollaborationMode::SharedSession(handle),
            Err(e) => {
                warn!(error = %e, "Failed to create session channel");
                setup.failures.push(e);
                first_document_mode(documents)
            }
        }
    } else {
        first_document_mode(documents)
    };

    if let Some(handle) = setup.mode.handle() {
        if let Err(e) = backend.init_comments_sync(handle, &comments) {
            warn!(error = %e, "Failed to start comments sync");
            setup.failures.push(e);
        }
    }

    setup.transport = Some(transport);
    setup
}

fn first_document_mode(documents: &[Document]) -> CollaborationMode {
    documents
        .first()
        .and_then(Document::collaboration)
        .cloned()
        .map_or_else(
            || {
                debug!("No first document replica; session has no collaboration handle");
                CollaborationMode::None
            },
            CollaborationMode::PerDocument,
        )
}
