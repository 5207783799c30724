//! Lifecycle signals reported by editors and UI components.
//!
//! Each signal updates session state where needed and is re-emitted on the
//! event bus. Failures never propagate to the reporter; they surface as
//! `exception` events.

use std::sync::Arc;

use tracing::{debug, info};

use super::Session;
use crate::{
    document::DocumentSource,
    editor::EditorRef,
    events::SessionEvent,
    types::DocumentMode,
    Error,
};

impl Session {
    pub fn editor_before_create(&self, editor: EditorRef) {
        self.emit(&SessionEvent::EditorBeforeCreate { editor });
    }

    /// An editor finished creation: bind it to its Document and count it
    /// toward readiness.
    pub fn editor_created(&self, editor: EditorRef) {
        let document_id = editor.document_id().clone();
        let outcome = {
            let mut state = self.state();
            let mode = state.document_mode;
            let bound = state
                .documents
                .iter_mut()
                .find(|doc| doc.id == document_id)
                .ok_or_else(|| Error::UnknownDocument(document_id.clone()))
                .and_then(|doc| {
                    doc.bind_editor(Arc::clone(&editor))?;
                    if mode == DocumentMode::Viewing {
                        doc.remove_comments();
                    } else {
                        doc.restore_comments();
                    }
                    Ok(doc.is_docx())
                });

            bound.map(|counted| {
                let crossed = counted && state.readiness.bound();
                (mode, crossed, state.readiness)
            })
        };

        let (mode, crossed, readiness) = match outcome {
            Ok(outcome) => outcome,
            Err(error) => {
                self.exception(error, Some(editor));
                return;
            }
        };

        editor.set_document_mode(mode);
        debug!(
            document_id = %document_id,
            ready = readiness.ready(),
            required = readiness.required(),
            "Editor bound"
        );

        if crossed {
            info!(session_id = %self.id(), editors = readiness.ready(), "Session ready");
            self.emit(&SessionEvent::Ready {
                session: self.clone(),
            });
        }
        self.emit(&SessionEvent::EditorCreate { editor });
    }

    /// An editor was torn down: unbind it and re-arm readiness.
    pub fn editor_destroyed(&self, editor: &EditorRef) {
        {
            let mut state = self.state();
            let is_active = state
                .active_editor()
                .is_some_and(|active| Arc::ptr_eq(&active, editor));
            if is_active {
                state.active_editor = None;
            }

            let unbound = state
                .documents
                .iter_mut()
                .find(|doc| doc.editor().is_some_and(|bound| Arc::ptr_eq(bound, editor)))
                .map(|doc| {
                    doc.unbind_editor();
                    doc.is_docx()
                });

            match unbound {
                Some(true) => state.readiness.unbound(),
                Some(false) => {}
                None => debug!("Destroyed editor was not bound"),
            }
        }
        self.emit(&SessionEvent::EditorDestroy);
    }

    /// An editor could not render its content. Other Documents are
    /// unaffected.
    pub fn content_error(&self, message: impl Into<String>, editor: EditorRef) {
        let document_id = editor.document_id().clone();
        let file = {
            let state = self.state();
            state
                .documents
                .iter()
                .find(|doc| doc.id == document_id)
                .map(|doc| match &doc.source {
                    Some(DocumentSource::File(file)) => Some(file.clone()),
                    _ => None,
                })
        };

        let Some(file) = file else {
            self.exception(Error::UnknownDocument(document_id), Some(editor));
            return;
        };

        let error = Error::content(document_id.clone(), message);
        debug!(document_id = %document_id, error = %error, "Content error");
        self.emit(&SessionEvent::ContentError {
            error,
            editor,
            document_id,
            file,
        });
    }

    /// Report a failure from the editor or collaboration layer.
    pub fn report_exception(&self, error: Error, editor: Option<EditorRef>) {
        self.exception(error, editor);
    }

    pub fn pdf_document_ready(&self) {
        self.emit(&SessionEvent::PdfDocumentReady);
    }

    pub fn sidebar_toggle(&self, is_opened: bool) {
        self.emit(&SessionEvent::SidebarToggle(is_opened));
    }

    pub fn collaboration_ready(&self, editor: EditorRef) {
        self.emit(&SessionEvent::CollaborationReady { editor });
    }

    pub fn editor_update(&self, editor: EditorRef) {
        self.emit(&SessionEvent::EditorUpdate { editor });
    }

    pub fn comments_update(&self, kind: impl Into<String>, data: serde_json::Value) {
        self.emit(&SessionEvent::CommentsUpdate {
            kind: kind.into(),
            data,
        });
    }

    pub fn awareness_update(&self, states: Vec<serde_json::Value>) {
        self.emit(&SessionEvent::AwarenessUpdate {
            context: self.clone(),
            states,
        });
    }

    pub fn list_definitions_change(&self, change: serde_json::Value) {
        self.emit(&SessionEvent::ListDefinitionsChange(change));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, PoisonError};

    use super::*;
    use crate::{
        config::SessionConfig,
        editor::BufferEditor,
        events::EventKind,
        registry::{DocumentDescriptor, DocumentInput},
        types::{DocumentId, DocumentType, FileHandle},
        Result,
    };

    type Log = Arc<Mutex<Vec<String>>>;

    fn record(log: &Log, entry: impl Into<String>) {
        log.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.into());
    }

    fn session_with(docs: Vec<DocumentDescriptor>, log: &Log) -> Result<Session> {
        let mut config = SessionConfig::with_selector("#app");
        config.documents = docs.into_iter().map(DocumentInput::from).collect();

        let mut builder = Session::builder(config);
        for kind in [
            EventKind::Ready,
            EventKind::EditorCreate,
            EventKind::EditorDestroy,
            EventKind::Exception,
            EventKind::ContentError,
        ] {
            let log = Arc::clone(log);
            builder = builder.on(kind, move |event| record(&log, event.kind().to_string()));
        }
        builder.build()
    }

    fn docx(id: &str) -> DocumentDescriptor {
        DocumentDescriptor::with_id(id, DocumentType::Docx)
    }

    #[test]
    fn test_ready_after_every_docx_editor() -> Result<()> {
        let log = Log::default();
        let session = session_with(vec![docx("a"), docx("b")], &log)?;

        session.editor_created(BufferEditor::new("a", "").into_ref());
        assert_eq!(session.ready_editor_count(), 1);
        session.editor_created(BufferEditor::new("b", "").into_ref());
        assert_eq!(session.ready_editor_count(), 2);

        let entries = log.lock().unwrap_or_else(PoisonError::into_inner).clone();
        assert_eq!(entries, vec!["editorCreate", "ready", "editorCreate"]);
        Ok(())
    }

    #[test]
    fn test_pdf_documents_are_not_required() -> Result<()> {
        let log = Log::default();
        let session = session_with(
            vec![docx("a"), DocumentDescriptor::with_id("p", DocumentType::Pdf)],
            &log,
        )?;
        assert_eq!(session.required_editor_count(), 1);

        session.editor_created(BufferEditor::new("p", "").into_ref());
        assert_eq!(session.ready_editor_count(), 0);
        session.editor_created(BufferEditor::new("a", "").into_ref());
        assert!(session.readiness().is_ready());
        Ok(())
    }

    #[test]
    fn test_double_bind_raises_exception() -> Result<()> {
        let log = Log::default();
        let session = session_with(vec![docx("a"), docx("b")], &log)?;

        session.editor_created(BufferEditor::new("a", "").into_ref());
        session.editor_created(BufferEditor::new("a", "").into_ref());
        session.editor_created(BufferEditor::new("zzz", "").into_ref());

        assert_eq!(session.ready_editor_count(), 1);
        let entries = log.lock().unwrap_or_else(PoisonError::into_inner).clone();
        assert_eq!(entries, vec!["editorCreate", "exception", "exception"]);
        Ok(())
    }

    #[test]
    fn test_destroy_and_rebind_fires_ready_again() -> Result<()> {
        let log = Log::default();
        let session = session_with(vec![docx("a")], &log)?;

        let first = BufferEditor::new("a", "").into_ref();
        session.editor_created(Arc::clone(&first));
        session.editor_destroyed(&first);
        assert_eq!(session.ready_editor_count(), 0);
        assert!(session.document(&DocumentId::new("a")).is_some_and(|d| !d.is_ready()));

        session.editor_created(BufferEditor::new("a", "").into_ref());
        let entries = log.lock().unwrap_or_else(PoisonError::into_inner).clone();
        assert_eq!(
            entries,
            vec!["ready", "editorCreate", "editorDestroy", "ready", "editorCreate"]
        );
        Ok(())
    }

    #[test]
    fn test_content_error_resolves_owning_document() -> Result<()> {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);

        let mut config = SessionConfig::with_selector("#app");
        config.document = Some(DocumentInput::File(FileHandle::new(
            "broken.docx",
            "",
            b"??".to_vec(),
        )));
        let session = Session::builder(config)
            .on(EventKind::ContentError, move |event| {
                if let SessionEvent::ContentError {
                    document_id, file, ..
                } = event
                {
                    *sink.lock().unwrap_or_else(PoisonError::into_inner) =
                        Some((document_id.clone(), file.clone()));
                }
            })
            .build()?;

        let id = session.documents()[0].id.clone();
        session.content_error("unsupported element", BufferEditor::new(id.clone(), "").into_ref());

        let captured = seen.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let (document_id, file) = captured.ok_or(Error::UnknownEditor)?;
        assert_eq!(document_id, id);
        assert_eq!(file.map(|f| f.name).as_deref(), Some("broken.docx"));
        Ok(())
    }

    #[test]
    fn test_passthrough_signals() -> Result<()> {
        let log = Log::default();
        let mut config = SessionConfig::with_selector("#app");
        config.documents = vec![DocumentInput::from(docx("a"))];
        let mut builder = Session::builder(config);
        for kind in [
            EventKind::SidebarToggle,
            EventKind::PdfDocumentReady,
            EventKind::CommentsUpdate,
            EventKind::AwarenessUpdate,
            EventKind::ListDefinitionsChange,
            EventKind::EditorUpdate,
            EventKind::EditorBeforeCreate,
            EventKind::CollaborationReady,
        ] {
            let log = Arc::clone(&log);
            builder = builder.on(kind, move |event| record(&log, event.kind().to_string()));
        }
        let session = builder.build()?;

        session.sidebar_toggle(true);
        session.pdf_document_ready();
        session.comments_update("add", serde_json::json!({"id": 1}));
        session.awareness_update(vec![]);
        session.list_definitions_change(serde_json::json!({}));
        let editor = BufferEditor::new("a", "").into_ref();
        session.editor_update(editor.clone());
        session.editor_before_create(editor.clone());
        session.collaboration_ready(editor);

        let entries = log.lock().unwrap_or_else(PoisonError::into_inner).clone();
        assert_eq!(
            entries,
            vec![
                "sidebar-toggle",
                "pdf-document-ready",
                "comments-update",
                "awareness-update",
                "list-definitions-change",
                "editor-update",
                "editorBeforeCreate",
                "collaboration-ready"
            ]
        );
        Ok(())
    }
}
