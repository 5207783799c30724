//! Document Registry
//!
//! Normalizes the heterogeneous `document` / `documents` inputs of a session
//! configuration into an ordered list of canonical [`Document`]s.
//!
//! Rules:
//! - A single `document` always wins over a `documents` list. Supplying both
//!   logs a warning and the list is discarded.
//! - A bare URL string becomes `{type: docx, url, name: "document.docx", isNewFile: true}`.
//! - File, blob, descriptor and uploader-wrapper shapes go through a
//!   [`DocumentNormalizer`]; ids are generated when absent.
//! - Ids are unique: a later Document reusing an earlier id is dropped.
//! - Resolution never fails. Unrecognized entries are dropped, so the worst
//!   case is an empty document set.

use std::{collections::HashSet, sync::Arc};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    document::Document,
    types::{Blob, DocumentType, FileHandle},
};

/// File name given to documents created from a bare URL.
pub const URL_DOCUMENT_NAME: &str = "document.docx";

// ═══════════════════════════════════════════════════════════════════════════
// INPUT SHAPES
// ═══════════════════════════════════════════════════════════════════════════

/// One document as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DocumentInput {
    /// A URL to fetch the document from
    Url(String),
    /// An object describing the document
    Descriptor(DocumentDescriptor),
    #[serde(skip)]
    File(FileHandle),
    #[serde(skip)]
    Blob(Blob),
    /// A foreign uploader wrapper around a file
    #[serde(skip)]
    Upload(UploadEntry),
}

impl From<&str> for DocumentInput {
    fn from(url: &str) -> Self {
        Self::Url(url.to_string())
    }
}

impl From<FileHandle> for DocumentInput {
    fn from(file: FileHandle) -> Self {
        Self::File(file)
    }
}

impl From<Blob> for DocumentInput {
    fn from(blob: Blob) -> Self {
        Self::Blob(blob)
    }
}

impl From<DocumentDescriptor> for DocumentInput {
    fn from(descriptor: DocumentDescriptor) -> Self {
        Self::Descriptor(descriptor)
    }
}

/// Normalized description of a document before an id is assigned.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentDescriptor {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub doc_type: Option<DocumentType>,
    pub url: Option<String>,
    pub name: Option<String>,
    pub is_new_file: Option<bool>,
    pub data: Option<serde_json::Value>,
    #[serde(skip)]
    pub file: Option<FileHandle>,
    #[serde(skip)]
    pub blob: Option<Blob>,
}

impl DocumentDescriptor {
    pub fn with_id(id: impl Into<String>, doc_type: DocumentType) -> Self {
        Self {
            id: Some(id.into()),
            doc_type: Some(doc_type),
            ..Self::default()
        }
    }

    /// An object with no recognizable keys.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Wrapper shape produced by upload widgets: the file sits one level down.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadEntry {
    pub uid: Option<String>,
    pub name: Option<String>,
    pub file: Option<FileHandle>,
}

// ═══════════════════════════════════════════════════════════════════════════
// NORMALIZATION
// ═══════════════════════════════════════════════════════════════════════════

/// Resolves non-URL input shapes into descriptors.
///
/// Returning `None` drops the entry.
pub trait DocumentNormalizer: Send + Sync {
    fn normalize(&self, input: DocumentInput) -> Option<DocumentDescriptor>;
}

/// Default normalizer: infers types from MIME types and file names and
/// unwraps uploader entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardNormalizer;

impl DocumentNormalizer for StandardNormalizer {
    fn normalize(&self, input: DocumentInput) -> Option<DocumentDescriptor> {
        match input {
            DocumentInput::Url(url) => descriptor_from_url(&url),
            DocumentInput::Descriptor(descriptor) => normalize_descriptor(descriptor),
            DocumentInput::File(file) => Some(descriptor_from_file(file)),
            DocumentInput::Blob(blob) => Some(descriptor_from_blob(blob)),
            DocumentInput::Upload(entry) => {
                let UploadEntry { uid, name, file } = entry;
                let mut descriptor = descriptor_from_file(file?);
                descriptor.id = uid;
                if name.is_some() {
                    descriptor.name = name;
                }
                Some(descriptor)
            }
        }
    }
}

fn descriptor_from_url(url: &str) -> Option<DocumentDescriptor> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    Some(DocumentDescriptor {
        doc_type: Some(DocumentType::Docx),
        url: Some(url.to_string()),
        name: Some(URL_DOCUMENT_NAME.to_string()),
        is_new_file: Some(true),
        ..DocumentDescriptor::default()
    })
}

fn normalize_descriptor(mut descriptor: DocumentDescriptor) -> Option<DocumentDescriptor> {
    if descriptor.is_empty() {
        return None;
    }
    if descriptor.doc_type.is_none() {
        descriptor.doc_type = descriptor
            .name
            .as_deref()
            .and_then(DocumentType::from_file_name)
            .or_else(|| descriptor.url.as_deref().and_then(DocumentType::from_file_name));
    }
    Some(descriptor)
}

fn descriptor_from_file(file: FileHandle) -> DocumentDescriptor {
    let doc_type = DocumentType::from_mime(&file.content_type)
        .or_else(|| DocumentType::from_file_name(&file.name))
        .unwrap_or_default();
    DocumentDescriptor {
        doc_type: Some(doc_type),
        name: Some(file.name.clone()),
        file: Some(file),
        ..DocumentDescriptor::default()
    }
}

fn descriptor_from_blob(blob: Blob) -> DocumentDescriptor {
    let doc_type = DocumentType::from_mime(&blob.content_type).unwrap_or_default();
    DocumentDescriptor {
        doc_type: Some(doc_type),
        name: Some(format!("document.{doc_type}")),
        blob: Some(blob),
        ..DocumentDescriptor::default()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// REGISTRY
// ═══════════════════════════════════════════════════════════════════════════

/// Turns configuration input into canonical Documents.
#[derive(Clone)]
pub struct DocumentRegistry {
    normalizer: Arc<dyn DocumentNormalizer>,
}

impl Default for DocumentRegistry {
    fn default() -> Self {
        Self::new(Arc::new(StandardNormalizer))
    }
}

impl std::fmt::Debug for DocumentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentRegistry").finish_non_exhaustive()
    }
}

impl DocumentRegistry {
    pub fn new(normalizer: Arc<dyn DocumentNormalizer>) -> Self {
        Self { normalizer }
    }

    /// Resolve `document` / `documents` into an ordered list of Documents.
    pub fn resolve(
        &self,
        document: Option<DocumentInput>,
        documents: Vec<DocumentInput>,
    ) -> Vec<Document> {
        if document.is_some() && !documents.is_empty() {
            warn!("Both `document` and `documents` were provided; `document` takes priority");
        }

        let single = document.and_then(|input| self.normalize(input));

        let descriptors: Vec<DocumentDescriptor> = match single {
            Some(descriptor) => vec![descriptor],
            None => documents
                .into_iter()
                .filter_map(|input| self.normalize(input))
                .collect(),
        };

        let mut seen = HashSet::new();
        let resolved: Vec<Document> = descriptors
            .into_iter()
            .map(Document::from_descriptor)
            .filter(|doc| {
                let fresh = seen.insert(doc.id.clone());
                if !fresh {
                    warn!(document_id = %doc.id, "Dropping document with duplicate id");
                }
                fresh
            })
            .collect();

        debug!(count = resolved.len(), "Resolved session documents");
        resolved
    }

    fn normalize(&self, input: DocumentInput) -> Option<DocumentDescriptor> {
        let descriptor = match input {
            DocumentInput::Url(url) => descriptor_from_url(&url),
            other => self.normalizer.normalize(other),
        };
        if descriptor.is_none() {
            warn!("Dropping unrecognized document input");
        }
        descriptor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentSource;

    #[test]
    fn test_bare_url_becomes_canonical_docx() {
        let docs = DocumentRegistry::default().resolve(Some("https://x/y.docx".into()), vec![]);

        assert_eq!(docs.len(), 1);
        let doc = &docs[0];
        assert_eq!(doc.doc_type, DocumentType::Docx);
        assert_eq!(doc.url(), Some("https://x/y.docx"));
        assert_eq!(doc.name, "document.docx");
        assert!(doc.is_new_file);
        assert!(!doc.id.as_str().is_empty());
    }

    #[test]
    fn test_single_document_overwrites_list() {
        let list = vec![
            DocumentInput::from(DocumentDescriptor::with_id("a", DocumentType::Docx)),
            DocumentInput::from(DocumentDescriptor::with_id("b", DocumentType::Docx)),
        ];
        let docs = DocumentRegistry::default().resolve(Some("https://x/y.docx".into()), list);

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].url(), Some("https://x/y.docx"));
    }

    #[test]
    fn test_unrecognized_single_document_falls_back_to_list() {
        let list = vec![DocumentInput::from(DocumentDescriptor::with_id(
            "a",
            DocumentType::Docx,
        ))];
        let docs = DocumentRegistry::default().resolve(
            Some(DocumentInput::Descriptor(DocumentDescriptor::default())),
            list,
        );

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id.as_str(), "a");
    }

    #[test]
    fn test_list_preserves_order_and_ids() {
        let list = vec![
            DocumentInput::from(DocumentDescriptor::with_id("a", DocumentType::Docx)),
            DocumentInput::from(DocumentDescriptor::with_id("b", DocumentType::Pdf)),
            DocumentInput::from(DocumentDescriptor::default()),
        ];
        let docs = DocumentRegistry::default().resolve(None, list);

        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(docs[1].doc_type, DocumentType::Pdf);
    }

    #[test]
    fn test_duplicate_ids_keep_first_document() {
        let list = vec![
            DocumentInput::from(DocumentDescriptor::with_id("a", DocumentType::Docx)),
            DocumentInput::from(DocumentDescriptor::with_id("b", DocumentType::Docx)),
            DocumentInput::from(DocumentDescriptor::with_id("a", DocumentType::Pdf)),
        ];
        let docs = DocumentRegistry::default().resolve(None, list);

        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(docs[0].doc_type, DocumentType::Docx);
    }

    #[test]
    fn test_file_and_blob_inputs() {
        let file = FileHandle::new("scan.pdf", "application/pdf", b"%PDF".to_vec());
        let docs = DocumentRegistry::default().resolve(Some(file.into()), vec![]);
        assert_eq!(docs[0].doc_type, DocumentType::Pdf);
        assert_eq!(docs[0].name, "scan.pdf");
        assert!(matches!(docs[0].source, Some(DocumentSource::File(_))));

        let blob = Blob::new(b"<p>hi</p>".to_vec(), "text/html");
        let docs = DocumentRegistry::default().resolve(Some(blob.into()), vec![]);
        assert_eq!(docs[0].doc_type, DocumentType::Html);
        assert_eq!(docs[0].name, "document.html");
    }

    #[test]
    fn test_upload_wrapper_is_unwrapped() {
        let entry = UploadEntry {
            uid: Some("rc-upload-1".into()),
            name: Some("Offer letter.docx".into()),
            file: Some(FileHandle::new("offer.docx", "", b"PK".to_vec())),
        };
        let docs = DocumentRegistry::default().resolve(None, vec![DocumentInput::Upload(entry)]);

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id.as_str(), "rc-upload-1");
        assert_eq!(docs[0].name, "Offer letter.docx");
        assert_eq!(docs[0].doc_type, DocumentType::Docx);
    }

    #[test]
    fn test_unrecognized_input_degrades_to_empty() {
        let docs = DocumentRegistry::default().resolve(
            Some(DocumentInput::Url("   ".into())),
            vec![DocumentInput::Upload(UploadEntry::default())],
        );
        assert!(docs.is_empty());
    }

    #[test]
    fn test_custom_normalizer_is_consulted() {
        struct RejectAll;
        impl DocumentNormalizer for RejectAll {
            fn normalize(&self, _input: DocumentInput) -> Option<DocumentDescriptor> {
                None
            }
        }

        let registry = DocumentRegistry::new(Arc::new(RejectAll));
        let docs = registry.resolve(
            None,
            vec![
                DocumentInput::from(DocumentDescriptor::with_id("a", DocumentType::Docx)),
                DocumentInput::from("https://x/y.docx"),
            ],
        );
        // URLs never reach the normalizer
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].url(), Some("https://x/y.docx"));
    }
}
