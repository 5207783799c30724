//! Session event bus
//!
//! A fixed set of lifecycle events, each with exactly one payload shape.
//! Handlers run synchronously on the emitting task, after every internal
//! lock has been released, so a handler may call back into the session.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

use strum::{AsRefStr, Display, EnumIter, EnumString};
use tracing::trace;

use crate::{
    editor::EditorRef,
    session::Session,
    types::{DocumentId, FileHandle, User},
    Error,
};

/// Names of every event the session emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr)]
pub enum EventKind {
    #[strum(serialize = "editorBeforeCreate")]
    EditorBeforeCreate,
    #[strum(serialize = "editorCreate")]
    EditorCreate,
    #[strum(serialize = "editorDestroy")]
    EditorDestroy,
    #[strum(serialize = "ready")]
    Ready,
    #[strum(serialize = "comments-update")]
    CommentsUpdate,
    #[strum(serialize = "awareness-update")]
    AwarenessUpdate,
    #[strum(serialize = "locked")]
    Locked,
    #[strum(serialize = "pdf-document-ready")]
    PdfDocumentReady,
    #[strum(serialize = "sidebar-toggle")]
    SidebarToggle,
    #[strum(serialize = "collaboration-ready")]
    CollaborationReady,
    #[strum(serialize = "editor-update")]
    EditorUpdate,
    #[strum(serialize = "content-error")]
    ContentError,
    #[strum(serialize = "exception")]
    Exception,
    #[strum(serialize = "list-definitions-change")]
    ListDefinitionsChange,
    #[strum(serialize = "comments-list-change")]
    CommentsListChange,
}

/// An emitted event and its payload.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    EditorBeforeCreate {
        editor: EditorRef,
    },
    EditorCreate {
        editor: EditorRef,
    },
    EditorDestroy,
    Ready {
        session: Session,
    },
    CommentsUpdate {
        kind: String,
        data: serde_json::Value,
    },
    AwarenessUpdate {
        context: Session,
        states: Vec<serde_json::Value>,
    },
    Locked {
        is_locked: bool,
        locked_by: Option<User>,
    },
    PdfDocumentReady,
    SidebarToggle(bool),
    CollaborationReady {
        editor: EditorRef,
    },
    EditorUpdate {
        editor: EditorRef,
    },
    ContentError {
        error: Error,
        editor: EditorRef,
        document_id: DocumentId,
        file: Option<FileHandle>,
    },
    Exception {
        error: Error,
        editor: Option<EditorRef>,
    },
    ListDefinitionsChange(serde_json::Value),
    CommentsListChange {
        is_rendered: bool,
    },
}

impl SessionEvent {
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::EditorBeforeCreate { .. } => EventKind::EditorBeforeCreate,
            Self::EditorCreate { .. } => EventKind::EditorCreate,
            Self::EditorDestroy => EventKind::EditorDestroy,
            Self::Ready { .. } => EventKind::Ready,
            Self::CommentsUpdate { .. } => EventKind::CommentsUpdate,
            Self::AwarenessUpdate { .. } => EventKind::AwarenessUpdate,
            Self::Locked { .. } => EventKind::Locked,
            Self::PdfDocumentReady => EventKind::PdfDocumentReady,
            Self::SidebarToggle(_) => EventKind::SidebarToggle,
            Self::CollaborationReady { .. } => EventKind::CollaborationReady,
            Self::EditorUpdate { .. } => EventKind::EditorUpdate,
            Self::ContentError { .. } => EventKind::ContentError,
            Self::Exception { .. } => EventKind::Exception,
            Self::ListDefinitionsChange(_) => EventKind::ListDefinitionsChange,
            Self::CommentsListChange { .. } => EventKind::CommentsListChange,
        }
    }
}

pub type EventHandler = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Listener {
    id: ListenerId,
    kind: EventKind,
    once: bool,
    handler: EventHandler,
}

/// Listener registry keyed by [`EventKind`].
#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<Vec<Listener>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<Listener>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, kind: EventKind, once: bool, handler: EventHandler) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners().push(Listener {
            id,
            kind,
            once,
            handler,
        });
        id
    }

    pub fn on<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.register(kind, false, Arc::new(handler))
    }

    /// Register a handler removed after its first invocation.
    pub fn once<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.register(kind, true, Arc::new(handler))
    }

    pub(crate) fn on_shared(&self, kind: EventKind, handler: EventHandler) -> ListenerId {
        self.register(kind, false, handler)
    }

    /// Returns `true` if the listener was registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners();
        let before = listeners.len();
        listeners.retain(|listener| listener.id != id);
        before != listeners.len()
    }

    pub fn emit(&self, event: &SessionEvent) {
        let kind = event.kind();
        let handlers: Vec<EventHandler> = {
            let mut listeners = self.listeners();
            let handlers = listeners
                .iter()
                .filter(|listener| listener.kind == kind)
                .map(|listener| Arc::clone(&listener.handler))
                .collect();
            listeners.retain(|listener| !(listener.once && listener.kind == kind));
            handlers
        };

        trace!(event = %kind, listeners = handlers.len(), "Emitting event");
        for handler in handlers {
            handler(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners().len()
    }

    pub fn listener_count_for(&self, kind: EventKind) -> usize {
        self.listeners()
            .iter()
            .filter(|listener| listener.kind == kind)
            .count()
    }

    /// Detach every listener.
    pub fn clear(&self) {
        self.listeners().clear();
    }
}
