//! The canonical Document record.
//!
//! A Document is owned by exactly one session. It carries at most one bound
//! editor and, in collaborative sessions, its own replica/provider pair.

use serde::Serialize;

use crate::{
    collaboration::CollaborationHandle,
    editor::EditorRef,
    registry::DocumentDescriptor,
    types::{Blob, DocumentId, DocumentType, FileHandle},
    Error, Result,
};

/// Where a Document's initial content comes from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DocumentSource {
    Url(String),
    File(FileHandle),
    Blob(Blob),
    /// Inline data handed over verbatim to the editor
    Data(serde_json::Value),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub name: String,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub source: Option<DocumentSource>,
    pub is_new_file: bool,
    pub rulers: bool,
    pub pagination: bool,
    #[serde(skip)]
    collaboration: Option<CollaborationHandle>,
    #[serde(skip)]
    editor: Option<EditorRef>,
    #[serde(skip)]
    comments_visible: bool,
}

impl Document {
    /// Build the canonical record, generating an id when none was supplied.
    pub fn from_descriptor(descriptor: DocumentDescriptor) -> Self {
        let DocumentDescriptor {
            id,
            doc_type,
            url,
            name,
            is_new_file,
            data,
            file,
            blob,
        } = descriptor;

        let source = file
            .map(DocumentSource::File)
            .or_else(|| blob.map(DocumentSource::Blob))
            .or_else(|| url.map(DocumentSource::Url))
            .or_else(|| data.map(DocumentSource::Data));

        let doc_type = doc_type.unwrap_or_default();
        let name = name.unwrap_or_else(|| default_name(doc_type));

        Self {
            id: id
                .filter(|id| !id.trim().is_empty())
                .map_or_else(DocumentId::generate, DocumentId::new),
            doc_type,
            name,
            source,
            is_new_file: is_new_file.unwrap_or(false),
            rulers: false,
            pagination: false,
            collaboration: None,
            editor: None,
            comments_visible: true,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match &self.source {
            Some(DocumentSource::Url(url)) => Some(url),
            _ => None,
        }
    }

    pub const fn is_docx(&self) -> bool {
        matches!(self.doc_type, DocumentType::Docx)
    }

    // ─── collaboration ──────────────────────────────────────────────────────

    pub const fn collaboration(&self) -> Option<&CollaborationHandle> {
        self.collaboration.as_ref()
    }

    pub const fn is_collaborative(&self) -> bool {
        self.collaboration.is_some()
    }

    pub(crate) fn attach_collaboration(&mut self, handle: CollaborationHandle) {
        self.collaboration = Some(handle);
    }

    pub(crate) fn take_collaboration(&mut self) -> Option<CollaborationHandle> {
        self.collaboration.take()
    }

    // ─── editor binding ─────────────────────────────────────────────────────

    pub const fn editor(&self) -> Option<&EditorRef> {
        self.editor.as_ref()
    }

    /// A Document is ready once an editor is bound to it.
    pub const fn is_ready(&self) -> bool {
        self.editor.is_some()
    }

    pub(crate) fn bind_editor(&mut self, editor: EditorRef) -> Result<()> {
        if self.editor.is_some() {
            return Err(Error::EditorAlreadyBound(self.id.clone()));
        }
        self.editor = Some(editor);
        Ok(())
    }

    pub(crate) fn unbind_editor(&mut self) -> Option<EditorRef> {
        self.editor.take()
    }

    // ─── comment overlay ────────────────────────────────────────────────────

    pub const fn comments_visible(&self) -> bool {
        self.comments_visible
    }

    pub(crate) fn restore_comments(&mut self) {
        self.comments_visible = true;
    }

    pub(crate) fn remove_comments(&mut self) {
        self.comments_visible = false;
    }
}

fn default_name(doc_type: DocumentType) -> String {
    format!("document.{doc_type}")
}
