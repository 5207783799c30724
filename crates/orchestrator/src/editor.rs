//! External collaborator interfaces.
//!
//! The rich-text engine, the command surface (toolbar), the hosting UI
//! surface, the comments store and the image uploader all live outside the
//! orchestrator. They are reached only through the traits below.
//!
//! [`BufferEditor`] is a plain in-memory engine used for headless sessions
//! and by the `folio` binary.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{
    types::{Blob, DocumentId, DocumentMode, DocumentType, FileHandle},
    Error, Result,
};

/// Shared handle to an editor instance.
pub type EditorRef = Arc<dyn Editor>;

// ═══════════════════════════════════════════════════════════════════════════
// REQUEST / RESPONSE TYPES
// ═══════════════════════════════════════════════════════════════════════════

/// What a search looks for.
#[derive(Debug, Clone)]
pub enum SearchQuery {
    Text(String),
    Pattern(Regex),
}

impl SearchQuery {
    /// Compile a regular expression query.
    pub fn pattern(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(Self::Pattern)
            .map_err(|e| Error::Parse(format!("Invalid search pattern: {e}")))
    }

    /// Byte ranges of every non-overlapping match in `haystack`.
    pub fn find_in(&self, haystack: &str) -> Vec<(usize, usize)> {
        match self {
            Self::Text(needle) if needle.is_empty() => Vec::new(),
            Self::Text(needle) => haystack
                .match_indices(needle.as_str())
                .map(|(start, found)| (start, start + found.len()))
                .collect(),
            Self::Pattern(regex) => regex
                .find_iter(haystack)
                .filter(|m| !m.as_str().is_empty())
                .map(|m| (m.start(), m.end()))
                .collect(),
        }
    }
}

impl From<&str> for SearchQuery {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// One search hit inside a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMatch {
    pub document_id: DocumentId,
    pub text: String,
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlOptions {
    /// Emit nested list markup instead of the flattened editor form
    pub unflatten_lists: bool,
}

/// How comments are carried into exported documents.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CommentsType {
    #[default]
    External,
    /// Strip comments from the output
    Clean,
}

/// A comment translated into the exporter's format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedComment {
    pub comment_id: String,
    pub document_id: Option<DocumentId>,
    pub author: Option<String>,
    pub text: String,
    pub is_internal: bool,
}

/// Serialization request sent to every bound editor during export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocxExportRequest {
    pub is_final_doc: bool,
    pub comments_type: CommentsType,
    pub comments: Vec<ExportedComment>,
    pub fields_highlight_color: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════
// COLLABORATOR TRAITS
// ═══════════════════════════════════════════════════════════════════════════

/// A rich-text editing engine bound to one Document.
#[async_trait]
pub trait Editor: Send + Sync + fmt::Debug {
    /// Document this editor was created for.
    fn document_id(&self) -> &DocumentId;

    fn set_document_mode(&self, mode: DocumentMode);

    fn search(&self, _query: &SearchQuery) -> Vec<SearchMatch> {
        Vec::new()
    }

    fn go_to_search_result(&self, _hit: &SearchMatch) {}

    fn html(&self, options: &HtmlOptions) -> String;

    /// Plain text of the whole document.
    fn text_content(&self) -> String;

    fn focus(&self) {}

    fn set_high_contrast_mode(&self, _enabled: bool) {}

    fn toggle_pagination(&self) {}

    fn set_autocomplete(&self, _enabled: bool) {}

    /// Serialize the document to DOCX.
    async fn export_docx(&self, request: &DocxExportRequest) -> Result<Blob>;
}

/// Toolbar-like surface that mirrors session state.
pub trait CommandSurface: Send + Sync {
    fn set_document_mode(&self, mode: DocumentMode);
    fn set_active_editor(&self, editor: Option<&EditorRef>);
    /// Re-read session state and redraw.
    fn refresh(&self);
}

/// The UI the session is mounted into.
pub trait HostSurface: Send + Sync {
    fn mount(&self, selector: &str);
    fn unmount(&self);
}

pub trait CommentsStore: Send + Sync {
    fn comments_for_export(&self) -> Vec<ExportedComment>;
}

/// Stores an image and returns the URL to reference it by.
#[async_trait]
pub trait ImageUploader: Send + Sync {
    async fn upload(&self, file: &FileHandle) -> Result<String>;
}

// ═══════════════════════════════════════════════════════════════════════════
// IN-MEMORY EDITOR
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
struct BufferState {
    text: String,
    mode: Option<DocumentMode>,
    focused: bool,
    high_contrast: bool,
    pagination_toggles: usize,
    autocomplete: bool,
    selection: Option<(usize, usize)>,
    exports: Vec<DocxExportRequest>,
}

/// Editor over a plain text buffer and a fixed DOCX payload.
#[derive(Debug)]
pub struct BufferEditor {
    document_id: DocumentId,
    docx: Blob,
    export_delay: Option<Duration>,
    export_failure: Option<String>,
    state: Mutex<BufferState>,
}

impl BufferEditor {
    pub fn new(document_id: impl Into<DocumentId>, text: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            docx: Blob::new(Vec::new(), DocumentType::Docx.mime_type()),
            export_delay: None,
            export_failure: None,
            state: Mutex::new(BufferState {
                text: text.into(),
                ..BufferState::default()
            }),
        }
    }

    /// Export `data` verbatim instead of an empty payload.
    #[must_use]
    pub fn with_docx(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.docx = Blob::new(data, DocumentType::Docx.mime_type());
        self
    }

    #[must_use]
    pub const fn with_export_delay(mut self, delay: Duration) -> Self {
        self.export_delay = Some(delay);
        self
    }

    /// Make every export reject with `message`.
    #[must_use]
    pub fn failing_export(mut self, message: impl Into<String>) -> Self {
        self.export_failure = Some(message.into());
        self
    }

    pub fn into_ref(self) -> EditorRef {
        Arc::new(self)
    }

    fn state(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mode(&self) -> Option<DocumentMode> {
        self.state().mode
    }

    pub fn is_focused(&self) -> bool {
        self.state().focused
    }

    pub fn is_high_contrast(&self) -> bool {
        self.state().high_contrast
    }

    pub fn pagination_toggles(&self) -> usize {
        self.state().pagination_toggles
    }

    pub fn autocomplete(&self) -> bool {
        self.state().autocomplete
    }

    pub fn selection(&self) -> Option<(usize, usize)> {
        self.state().selection
    }

    /// Export requests received so far.
    pub fn exports(&self) -> Vec<DocxExportRequest> {
        self.state().exports.clone()
    }
}

#[async_trait]
impl Editor for BufferEditor {
    fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    fn set_document_mode(&self, mode: DocumentMode) {
        self.state().mode = Some(mode);
    }

    fn search(&self, query: &SearchQuery) -> Vec<SearchMatch> {
        let state = self.state();
        query
            .find_in(&state.text)
            .into_iter()
            .map(|(from, to)| SearchMatch {
                document_id: self.document_id.clone(),
                text: state.text[from..to].to_string(),
                from,
                to,
            })
            .collect()
    }

    fn go_to_search_result(&self, hit: &SearchMatch) {
        if hit.document_id == self.document_id {
            self.state().selection = Some((hit.from, hit.to));
        }
    }

    fn html(&self, _options: &HtmlOptions) -> String {
        self.state()
            .text
            .lines()
            .map(|line| format!("<p>{}</p>", escape_html(line)))
            .collect()
    }

    fn text_content(&self) -> String {
        self.state().text.clone()
    }

    fn focus(&self) {
        self.state().focused = true;
    }

    fn set_high_contrast_mode(&self, enabled: bool) {
        self.state().high_contrast = enabled;
    }

    fn toggle_pagination(&self) {
        self.state().pagination_toggles += 1;
    }

    fn set_autocomplete(&self, enabled: bool) {
        self.state().autocomplete = enabled;
    }

    async fn export_docx(&self, request: &DocxExportRequest) -> Result<Blob> {
        self.state().exports.push(request.clone());
        if let Some(delay) = self.export_delay {
            tokio::time::sleep(delay).await;
        }
        match &self.export_failure {
            Some(message) => Err(Error::export(format!("{}: {message}", self.document_id))),
            None => Ok(self.docx.clone()),
        }
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_search() {
        let editor = BufferEditor::new("a", "one two one");
        let hits = editor.search(&"one".into());
        assert_eq!(hits.len(), 2);
        assert_eq!((hits[1].from, hits[1].to), (8, 11));
        assert!(editor.search(&"".into()).is_empty());
    }

    #[test]
    fn test_pattern_search() -> Result<()> {
        let editor = BufferEditor::new("a", "Invoice 2024-01, Invoice 2024-02");
        let hits = editor.search(&SearchQuery::pattern(r"\d{4}-\d{2}")?);
        let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, vec!["2024-01", "2024-02"]);

        assert!(matches!(SearchQuery::pattern("("), Err(Error::Parse(_))));
        Ok(())
    }

    #[test]
    fn test_go_to_result_selects_range() {
        let editor = BufferEditor::new("a", "hello world");
        let hit = editor.search(&"world".into()).remove(0);
        editor.go_to_search_result(&hit);
        assert_eq!(editor.selection(), Some((6, 11)));
    }

    #[test]
    fn test_html_escapes() {
        let editor = BufferEditor::new("a", "a < b\nc");
        assert_eq!(editor.html(&HtmlOptions::default()), "<p>a &lt; b</p><p>c</p>");
    }

    #[tokio::test]
    async fn test_export_records_request() -> Result<()> {
        let editor = BufferEditor::new("a", "").with_docx(b"PK".to_vec());
        let request = DocxExportRequest {
            comments_type: CommentsType::Clean,
            ..DocxExportRequest::default()
        };
        let blob = editor.export_docx(&request).await?;
        assert_eq!(blob.data, b"PK");
        assert_eq!(editor.exports(), vec![request]);
        Ok(())
    }

    #[tokio::test]
    async fn test_failing_export() {
        let editor = BufferEditor::new("a", "").failing_export("corrupt");
        let result = editor.export_docx(&DocxExportRequest::default()).await;
        assert!(matches!(result, Err(Error::Export(msg)) if msg.contains("corrupt")));
    }
}
