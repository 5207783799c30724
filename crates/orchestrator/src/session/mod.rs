//! Session Orchestrator
//!
//! A [`Session`] owns the Documents, the roster, the role-gated mode, the
//! lock state and the event bus of one editing session. It is a cheap
//! `Clone` handle; every clone refers to the same session.
//!
//! State sits behind one mutex that is never held across an `.await` or
//! while event handlers run. Mode transitions and lock writes are not
//! queued: concurrent callers race and the last writer wins.

mod commands;
mod locking;
mod readiness;
mod save;
mod signals;
mod teardown;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

pub use commands::SessionCommand;
pub use readiness::Readiness;

use crate::{
    collaboration::{
        self, CollaborationBackend, CollaborationMode, MemoryBackend, ObserverId, Replica,
        Transport,
    },
    config::SessionConfig,
    document::Document,
    editor::{
        CommandSurface, CommentsStore, Editor, EditorRef, HostSurface, HtmlOptions, ImageUploader,
        SearchMatch, SearchQuery,
    },
    events::{EventBus, EventHandler, EventKind, ListenerId, SessionEvent},
    export::sink::DownloadSink,
    mode,
    registry::{DocumentNormalizer, DocumentRegistry},
    roster::Roster,
    types::{DocumentId, DocumentMode, FileHandle, Role, User},
    Error, Result,
};

/// Zoom level a session starts at, in percent.
pub const DEFAULT_ZOOM: u32 = 100;

// ═══════════════════════════════════════════════════════════════════════════
// STATE
// ═══════════════════════════════════════════════════════════════════════════

/// Local lock state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockStatus {
    pub is_locked: bool,
    pub locked_by: Option<User>,
    pub locked_at: Option<DateTime<Utc>>,
}

pub(crate) struct SessionState {
    pub(crate) documents: Vec<Document>,
    pub(crate) user: User,
    pub(crate) roster: Roster,
    pub(crate) role: Role,
    pub(crate) document_mode: DocumentMode,
    pub(crate) lock: LockStatus,
    pub(crate) active_editor: Option<Weak<dyn Editor>>,
    pub(crate) readiness: Readiness,
    pub(crate) rulers: bool,
    pub(crate) pagination: bool,
    pub(crate) high_contrast: bool,
    pub(crate) active_zoom: u32,
    pub(crate) comments_element: Option<String>,
    pub(crate) comments_list_rendered: bool,
    pub(crate) saves: save::SaveRounds,
    pub(crate) transport: Option<Arc<dyn Transport>>,
    pub(crate) collaboration: CollaborationMode,
    pub(crate) lock_observers: Vec<(Arc<dyn Replica>, ObserverId)>,
    pub(crate) destroyed: bool,
}

impl SessionState {
    pub(crate) fn active_editor(&self) -> Option<EditorRef> {
        self.active_editor.as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn bound_editors(&self) -> Vec<EditorRef> {
        self.documents
            .iter()
            .filter_map(Document::editor)
            .cloned()
            .collect()
    }

    pub(crate) fn first_editor(&self) -> Option<EditorRef> {
        self.documents.first().and_then(Document::editor).cloned()
    }

    pub(crate) fn document_of(&self, editor: &EditorRef) -> Option<&Document> {
        self.documents
            .iter()
            .find(|doc| doc.editor().is_some_and(|bound| Arc::ptr_eq(bound, editor)))
    }
}

/// Non-serializable collaborators supplied at construction.
#[derive(Default)]
pub(crate) struct Collaborators {
    pub(crate) command_surface: Option<Arc<dyn CommandSurface>>,
    pub(crate) host: Option<Arc<dyn HostSurface>>,
    pub(crate) comments_store: Option<Arc<dyn CommentsStore>>,
    pub(crate) uploader: Option<Arc<dyn ImageUploader>>,
    pub(crate) sink: Option<Arc<dyn DownloadSink>>,
}

pub(crate) struct SessionInner {
    pub(crate) id: String,
    pub(crate) config: SessionConfig,
    pub(crate) events: EventBus,
    pub(crate) collaborators: Collaborators,
    pub(crate) state: Mutex<SessionState>,
}

impl SessionInner {
    pub(crate) fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// BUILDER
// ═══════════════════════════════════════════════════════════════════════════

/// Collects configuration and collaborators, then constructs a [`Session`].
pub struct SessionBuilder {
    config: SessionConfig,
    registry: DocumentRegistry,
    backend: Option<Arc<dyn CollaborationBackend>>,
    handlers: Vec<(EventKind, EventHandler)>,
    collaborators: Collaborators,
}

impl SessionBuilder {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            registry: DocumentRegistry::default(),
            backend: None,
            handlers: Vec::new(),
            collaborators: Collaborators::default(),
        }
    }

    /// Register an event callback before any event can fire.
    #[must_use]
    pub fn on<F>(mut self, kind: EventKind, handler: F) -> Self
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.handlers.push((kind, Arc::new(handler)));
        self
    }

    #[must_use]
    pub fn normalizer(mut self, normalizer: Arc<dyn DocumentNormalizer>) -> Self {
        self.registry = DocumentRegistry::new(normalizer);
        self
    }

    /// Backend used when the collaboration module is configured. Defaults
    /// to an in-process [`MemoryBackend`].
    #[must_use]
    pub fn collaboration_backend(mut self, backend: Arc<dyn CollaborationBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    #[must_use]
    pub fn command_surface(mut self, surface: Arc<dyn CommandSurface>) -> Self {
        self.collaborators.command_surface = Some(surface);
        self
    }

    #[must_use]
    pub fn host_surface(mut self, host: Arc<dyn HostSurface>) -> Self {
        self.collaborators.host = Some(host);
        self
    }

    #[must_use]
    pub fn comments_store(mut self, store: Arc<dyn CommentsStore>) -> Self {
        self.collaborators.comments_store = Some(store);
        self
    }

    #[must_use]
    pub fn image_uploader(mut self, uploader: Arc<dyn ImageUploader>) -> Self {
        self.collaborators.uploader = Some(uploader);
        self
    }

    #[must_use]
    pub fn download_sink(mut self, sink: Arc<dyn DownloadSink>) -> Self {
        self.collaborators.sink = Some(sink);
        self
    }

    /// Construct the session.
    ///
    /// Only configuration validation fails. Collaboration failures are
    /// re-emitted as `exception` events to the callbacks registered with
    /// [`SessionBuilder::on`].
    pub fn build(self) -> Result<Session> {
        let Self {
            mut config,
            registry,
            backend,
            handlers,
            collaborators,
        } = self;

        config.validate()?;

        let id = config
            .session_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut documents =
            registry.resolve(config.document.take(), std::mem::take(&mut config.documents));
        for document in &mut documents {
            document.rulers = config.rulers;
            document.pagination = config.pagination;
        }

        let events = EventBus::new();
        for (kind, handler) in handlers {
            events.on_shared(kind, handler);
        }

        let backend = backend.unwrap_or_else(|| Arc::new(MemoryBackend::new()));
        let setup = collaboration::initialize(
            backend.as_ref(),
            &config.modules,
            &id,
            &config.user,
            &mut documents,
        );

        let required = documents.iter().filter(|doc| doc.is_docx()).count();
        let roster = Roster::shuffled(
            config.colors.clone(),
            config.users.clone(),
            &mut rand::thread_rng(),
        );

        let state = SessionState {
            readiness: Readiness::new(required),
            user: config.user.clone(),
            roster,
            role: config.role,
            document_mode: mode::resolve(config.role, config.document_mode),
            lock: LockStatus {
                is_locked: config.is_locked,
                locked_by: config.locked_by.clone(),
                locked_at: config.is_locked.then(Utc::now),
            },
            active_editor: None,
            rulers: config.rulers,
            pagination: config.pagination,
            high_contrast: false,
            active_zoom: DEFAULT_ZOOM,
            comments_element: config
                .modules
                .comments
                .as_ref()
                .and_then(|comments| comments.element.clone()),
            comments_list_rendered: false,
            saves: save::SaveRounds::default(),
            transport: setup.transport,
            collaboration: setup.mode,
            lock_observers: Vec::new(),
            destroyed: false,
            documents,
        };

        let session = Session {
            inner: Arc::new(SessionInner {
                id,
                config,
                events,
                collaborators,
                state: Mutex::new(state),
            }),
        };

        session.observe_lock_changes();

        if let Some(surface) = &session.inner.collaborators.command_surface {
            let surface = Arc::clone(surface);
            session
                .inner
                .events
                .once(EventKind::EditorCreate, move |_| surface.refresh());
        }

        if let (Some(host), Some(selector)) = (
            &session.inner.collaborators.host,
            session.inner.config.selector.as_deref(),
        ) {
            host.mount(selector);
        }

        info!(
            session_id = %session.inner.id,
            documents = session.inner.state().documents.len(),
            required_editors = required,
            collaborative = session.is_collaborative(),
            "Session created"
        );

        for failure in setup.failures {
            session.exception(failure, None);
        }

        Ok(session)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SESSION
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct Session {
    pub(crate) inner: Arc<SessionInner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn builder(config: SessionConfig) -> SessionBuilder {
        SessionBuilder::new(config)
    }

    /// Construct a session with no callbacks or collaborators.
    pub fn new(config: SessionConfig) -> Result<Self> {
        SessionBuilder::new(config).build()
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, SessionState> {
        self.inner.state()
    }

    pub(crate) fn emit(&self, event: &SessionEvent) {
        self.inner.events.emit(event);
    }

    /// Re-emit an internal failure as an `exception` event.
    pub(crate) fn exception(&self, error: Error, editor: Option<EditorRef>) {
        warn!(session_id = %self.inner.id, error = %error, "Session exception");
        self.emit(&SessionEvent::Exception { error, editor });
    }

    /// Whether both handles refer to the same session.
    pub fn same_session(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ─── identity & state ───────────────────────────────────────────────────

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn title(&self) -> &str {
        &self.inner.config.title
    }

    pub fn user(&self) -> User {
        self.state().user.clone()
    }

    pub fn role(&self) -> Role {
        self.state().role
    }

    pub fn document_mode(&self) -> DocumentMode {
        self.state().document_mode
    }

    pub fn documents(&self) -> Vec<Document> {
        self.state().documents.clone()
    }

    pub fn document(&self, id: &DocumentId) -> Option<Document> {
        self.state()
            .documents
            .iter()
            .find(|doc| &doc.id == id)
            .cloned()
    }

    pub fn readiness(&self) -> Readiness {
        self.state().readiness
    }

    pub fn ready_editor_count(&self) -> usize {
        self.state().readiness.ready()
    }

    pub fn required_editor_count(&self) -> usize {
        self.state().readiness.required()
    }

    pub fn lock_status(&self) -> LockStatus {
        self.state().lock.clone()
    }

    pub fn is_locked(&self) -> bool {
        self.state().lock.is_locked
    }

    pub fn active_editor(&self) -> Option<EditorRef> {
        self.state().active_editor()
    }

    pub fn collaboration_mode(&self) -> CollaborationMode {
        self.state().collaboration.clone()
    }

    pub fn is_collaborative(&self) -> bool {
        self.inner.config.is_collaborative()
    }

    pub fn rulers(&self) -> bool {
        self.state().rulers
    }

    pub fn pagination(&self) -> bool {
        self.state().pagination
    }

    pub fn high_contrast(&self) -> bool {
        self.state().high_contrast
    }

    pub fn active_zoom(&self) -> u32 {
        self.state().active_zoom
    }

    pub fn is_destroyed(&self) -> bool {
        self.state().destroyed
    }

    // ─── events ─────────────────────────────────────────────────────────────

    pub fn on<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.inner.events.on(kind, handler)
    }

    pub fn once<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.inner.events.once(kind, handler)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.events.off(id)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.events.listener_count()
    }

    // ─── roster ─────────────────────────────────────────────────────────────

    pub fn users(&self) -> Vec<User> {
        self.state().roster.users()
    }

    pub fn user_color(&self, email: &str) -> Option<String> {
        self.state().roster.color_of(email).map(str::to_string)
    }

    /// Share the session with `user`; ignored if the email is already shared.
    pub fn add_shared_user(&self, user: User) -> bool {
        self.state().roster.add(user)
    }

    pub fn remove_shared_user(&self, email: &str) -> usize {
        self.state().roster.remove(email)
    }

    // ─── mode state machine ─────────────────────────────────────────────────

    /// Request `requested`; the role may downgrade it. Returns the mode
    /// actually entered.
    pub fn set_document_mode(&self, requested: DocumentMode) -> DocumentMode {
        let (resolved, editors, active) = {
            let mut state = self.state();
            let resolved = mode::resolve(state.role, requested);
            let viewing = resolved == DocumentMode::Viewing;
            state.document_mode = resolved;

            for doc in state.documents.iter_mut().filter(|doc| doc.is_ready()) {
                if viewing {
                    doc.remove_comments();
                } else {
                    doc.restore_comments();
                }
            }

            if viewing {
                state.active_editor = None;
            } else if let Some(first) = state.first_editor() {
                state.active_editor = Some(Arc::downgrade(&first));
            }

            (resolved, state.bound_editors(), state.active_editor())
        };

        if resolved == requested {
            info!(mode = %resolved, "Document mode changed");
        } else {
            info!(requested = %requested, mode = %resolved, "Document mode downgraded by role");
        }

        for editor in &editors {
            editor.set_document_mode(resolved);
        }

        if let Some(surface) = &self.inner.collaborators.command_surface {
            surface.set_document_mode(resolved);
            surface.set_active_editor(active.as_ref());
            surface.refresh();
        }

        resolved
    }

    /// Point the session at `editor`, which must be bound to one of its
    /// Documents. The session never owns the active editor.
    pub fn set_active_editor(&self, editor: &EditorRef) -> Result<()> {
        {
            let mut state = self.state();
            if state.document_of(editor).is_none() {
                return Err(Error::UnknownEditor);
            }
            state.active_editor = Some(Arc::downgrade(editor));
        }
        debug!(document_id = %editor.document_id(), "Active editor changed");
        if let Some(surface) = &self.inner.collaborators.command_surface {
            surface.set_active_editor(Some(editor));
        }
        Ok(())
    }

    // ─── display ────────────────────────────────────────────────────────────

    /// Returns the new ruler flag.
    pub fn toggle_ruler(&self) -> bool {
        let mut state = self.state();
        state.rulers = !state.rulers;
        let rulers = state.rulers;
        for doc in &mut state.documents {
            doc.rulers = rulers;
        }
        rulers
    }

    /// Returns the new pagination flag.
    pub fn toggle_pagination(&self) -> bool {
        let (pagination, editors) = {
            let mut state = self.state();
            state.pagination = !state.pagination;
            let pagination = state.pagination;
            for doc in &mut state.documents {
                doc.pagination = pagination;
            }
            (pagination, state.bound_editors())
        };
        for editor in editors {
            editor.toggle_pagination();
        }
        pagination
    }

    pub fn set_high_contrast_mode(&self, enabled: bool) {
        let Some(editor) = self.active_editor() else {
            debug!("No active editor; high contrast unchanged");
            return;
        };
        editor.set_high_contrast_mode(enabled);
        self.state().high_contrast = enabled;
    }

    /// Focus the active editor, else the first bound editor.
    pub fn focus(&self) {
        let editor = {
            let state = self.state();
            state
                .active_editor()
                .or_else(|| state.bound_editors().into_iter().next())
        };
        if let Some(editor) = editor {
            editor.focus();
        }
    }

    // ─── content ────────────────────────────────────────────────────────────

    /// Search the active editor; empty without one.
    pub fn search(&self, query: &SearchQuery) -> Vec<SearchMatch> {
        self.active_editor()
            .map(|editor| editor.search(query))
            .unwrap_or_default()
    }

    pub fn go_to_search_result(&self, hit: &SearchMatch) {
        if let Some(editor) = self.active_editor() {
            editor.go_to_search_result(hit);
        }
    }

    /// HTML of every bound editor in registration order.
    pub fn get_html(&self, options: &HtmlOptions) -> Vec<String> {
        let editors = self.state().bound_editors();
        editors.iter().map(|editor| editor.html(options)).collect()
    }

    /// Plain text of the active editor, falling back to the first
    /// Document's editor.
    pub fn get_document_context(&self) -> String {
        let editor = {
            let state = self.state();
            state.active_editor().or_else(|| state.first_editor())
        };
        editor.map(|editor| editor.text_content()).unwrap_or_default()
    }

    pub async fn upload_image(&self, file: &FileHandle) -> Result<String> {
        let uploader = self
            .inner
            .collaborators
            .uploader
            .clone()
            .ok_or_else(|| Error::Upload("no image uploader configured".into()))?;
        uploader.upload(file).await
    }

    // ─── comments list ──────────────────────────────────────────────────────

    /// Render the comments list. Requires the comments module and a
    /// non-viewer role.
    pub fn add_comments_list(&self, element: Option<String>) -> bool {
        {
            let mut state = self.state();
            if self.inner.config.modules.comments.is_none() || state.role == Role::Viewer {
                debug!("Comments list unavailable for this session");
                return false;
            }
            if element.is_some() {
                state.comments_element = element;
            }
            state.comments_list_rendered = true;
        }
        self.emit(&SessionEvent::CommentsListChange { is_rendered: true });
        true
    }

    pub fn remove_comments_list(&self) -> bool {
        let was_rendered = std::mem::take(&mut self.state().comments_list_rendered);
        if was_rendered {
            self.emit(&SessionEvent::CommentsListChange { is_rendered: false });
        }
        was_rendered
    }

    pub fn comments_list_element(&self) -> Option<String> {
        self.state().comments_element.clone()
    }

    pub fn is_comments_list_rendered(&self) -> bool {
        self.state().comments_list_rendered
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{
        config::CommentsConfig,
        editor::BufferEditor,
        registry::{DocumentDescriptor, DocumentInput},
        types::DocumentType,
    };

    fn config(ids: &[&str]) -> SessionConfig {
        let mut config = SessionConfig::with_selector("#app");
        config.documents = ids
            .iter()
            .map(|id| DocumentInput::from(DocumentDescriptor::with_id(*id, DocumentType::Docx)))
            .collect();
        config
    }

    fn bind(session: &Session, id: &str, text: &str) -> Arc<BufferEditor> {
        let editor = Arc::new(BufferEditor::new(id, text));
        let editor_ref: EditorRef = editor.clone();
        session.editor_created(editor_ref);
        editor
    }

    #[test]
    fn test_missing_selector_is_fatal() {
        let result = Session::new(SessionConfig::default());
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_session_id_from_config_or_generated() -> Result<()> {
        let mut cfg = config(&[]);
        cfg.session_id = Some("fixed".into());
        assert_eq!(Session::new(cfg)?.id(), "fixed");
        assert!(!Session::new(config(&[]))?.id().is_empty());
        Ok(())
    }

    #[test]
    fn test_initial_mode_respects_role() -> Result<()> {
        let mut cfg = config(&[]);
        cfg.role = Role::Viewer;
        assert_eq!(Session::new(cfg)?.document_mode(), DocumentMode::Viewing);
        Ok(())
    }

    #[test]
    fn test_viewer_cannot_edit() -> Result<()> {
        let mut cfg = config(&["a"]);
        cfg.role = Role::Viewer;
        let session = Session::new(cfg)?;
        let editor = bind(&session, "a", "");

        assert_eq!(session.set_document_mode(DocumentMode::Editing), DocumentMode::Viewing);
        assert_eq!(editor.mode(), Some(DocumentMode::Viewing));
        assert!(session.active_editor().is_none());
        Ok(())
    }

    #[test]
    fn test_mode_transition_updates_editors_and_overlays() -> Result<()> {
        let session = Session::new(config(&["a", "b"]))?;
        let a = bind(&session, "a", "");
        let b = bind(&session, "b", "");

        session.set_document_mode(DocumentMode::Viewing);
        assert!(session.documents().iter().all(|doc| !doc.comments_visible()));
        assert_eq!(b.mode(), Some(DocumentMode::Viewing));

        session.set_document_mode(DocumentMode::Suggesting);
        assert!(session.documents().iter().all(Document::comments_visible));
        assert_eq!(a.mode(), Some(DocumentMode::Suggesting));
        let active = session.active_editor();
        assert_eq!(
            active.as_ref().map(|e| e.document_id().as_str()),
            Some("a")
        );
        Ok(())
    }

    #[test]
    fn test_set_active_editor_requires_bound_editor() -> Result<()> {
        let session = Session::new(config(&["a", "b"]))?;
        bind(&session, "a", "");
        let b = bind(&session, "b", "");
        let b_ref: EditorRef = b;
        session.set_active_editor(&b_ref)?;
        assert_eq!(
            session.active_editor().map(|e| e.document_id().clone()),
            Some(DocumentId::new("b"))
        );

        let stranger = BufferEditor::new("b", "").into_ref();
        assert_eq!(session.set_active_editor(&stranger), Err(Error::UnknownEditor));
        Ok(())
    }

    #[test]
    fn test_active_editor_is_not_owned() -> Result<()> {
        let session = Session::new(config(&["a"]))?;
        let editor = bind(&session, "a", "");
        session.set_document_mode(DocumentMode::Editing);
        assert!(session.active_editor().is_some());

        let editor_ref: EditorRef = editor;
        session.editor_destroyed(&editor_ref);
        drop(editor_ref);
        assert!(session.active_editor().is_none());
        Ok(())
    }

    #[test]
    fn test_toggles() -> Result<()> {
        let session = Session::new(config(&["a"]))?;
        let editor = bind(&session, "a", "");

        assert!(session.toggle_ruler());
        assert!(session.documents()[0].rulers);
        assert!(!session.toggle_ruler());

        assert!(session.toggle_pagination());
        assert!(session.documents()[0].pagination);
        assert_eq!(editor.pagination_toggles(), 1);
        Ok(())
    }

    #[test]
    fn test_search_uses_active_editor() -> Result<()> {
        let session = Session::new(config(&["a", "b"]))?;
        bind(&session, "a", "alpha beta");
        bind(&session, "b", "beta beta");

        assert!(session.search(&"beta".into()).is_empty());
        session.set_document_mode(DocumentMode::Editing);
        let hits = session.search(&"beta".into());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_id.as_str(), "a");
        Ok(())
    }

    #[test]
    fn test_context_html_focus_and_contrast() -> Result<()> {
        let session = Session::new(config(&["a", "b"]))?;
        assert_eq!(session.get_document_context(), "");

        let a = bind(&session, "a", "first");
        bind(&session, "b", "second");
        assert_eq!(session.get_document_context(), "first");
        assert_eq!(
            session.get_html(&HtmlOptions::default()),
            vec!["<p>first</p>", "<p>second</p>"]
        );

        session.set_high_contrast_mode(true);
        assert!(!session.high_contrast());

        session.focus();
        assert!(a.is_focused());

        session.set_document_mode(DocumentMode::Editing);
        session.set_high_contrast_mode(true);
        assert!(session.high_contrast());
        assert!(a.is_high_contrast());
        Ok(())
    }

    #[test]
    fn test_shared_users() -> Result<()> {
        let mut cfg = config(&[]);
        cfg.colors = vec!["#111".into()];
        cfg.users = vec![User::new("Ada", "ada@x")];
        let session = Session::new(cfg)?;

        assert!(!session.add_shared_user(User::new("Ada L.", "ada@x")));
        assert!(session.add_shared_user(User::new("Grace", "grace@x")));
        assert_eq!(session.user_color("grace@x").as_deref(), Some("#111"));
        assert_eq!(session.remove_shared_user("ada@x"), 1);
        assert_eq!(session.users().len(), 1);
        Ok(())
    }

    #[test]
    fn test_comments_list() -> Result<()> {
        let changes = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&changes);

        let mut cfg = config(&[]);
        cfg.modules.comments = Some(CommentsConfig::default());
        let session = Session::builder(cfg)
            .on(EventKind::CommentsListChange, move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .build()?;

        assert!(!session.remove_comments_list());
        assert!(session.add_comments_list(Some("#comments".into())));
        assert_eq!(session.comments_list_element().as_deref(), Some("#comments"));
        assert!(session.remove_comments_list());
        assert_eq!(changes.load(Ordering::SeqCst), 2);

        let mut viewer = config(&[]);
        viewer.role = Role::Viewer;
        viewer.modules.comments = Some(CommentsConfig::default());
        assert!(!Session::new(viewer)?.add_comments_list(None));

        assert!(!Session::new(config(&[]))?.add_comments_list(None));
        Ok(())
    }

    #[tokio::test]
    async fn test_upload_without_uploader() -> Result<()> {
        let session = Session::new(config(&[]))?;
        let file = FileHandle::new("logo.png", "image/png", vec![1, 2, 3]);
        assert!(matches!(session.upload_image(&file).await, Err(Error::Upload(_))));
        Ok(())
    }

    #[test]
    fn test_initial_lock_from_config() -> Result<()> {
        let mut cfg = config(&[]);
        cfg.is_locked = true;
        cfg.locked_by = Some(User::new("Ada", "ada@x"));
        let status = Session::new(cfg)?.lock_status();
        assert!(status.is_locked);
        assert!(status.locked_at.is_some());
        assert_eq!(status.locked_by, Some(User::new("Ada", "ada@x")));
        Ok(())
    }
}
