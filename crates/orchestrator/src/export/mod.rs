//! Export Pipeline
//!
//! Serializes every bound editor to DOCX concurrently and delivers the
//! result either as a single file or as a zip bundle. Output order is
//! Document registration order, whatever order the editors finish in. One
//! failing editor fails the whole export.

pub mod sink;

use std::{
    collections::HashSet,
    io::{Cursor, Write},
    sync::OnceLock,
};

use futures::future::try_join_all;
use itertools::{EitherOrBoth, Itertools};
use regex::Regex;
use tracing::{debug, info, warn};
use zip::{write::SimpleFileOptions, ZipWriter};

pub use sink::{DirectorySink, DownloadSink};

use crate::{
    config::DEFAULT_TITLE,
    editor::{CommentsType, DocxExportRequest},
    session::Session,
    types::{Blob, DocumentType, NamedBlob},
    Error, Result,
};

pub const ZIP_CONTENT_TYPE: &str = "application/zip";

// ═══════════════════════════════════════════════════════════════════════════
// OPTIONS
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// Requested formats; the first one names a single-file download
    pub export_type: Vec<DocumentType>,
    pub comments_type: CommentsType,
    /// Base file name; defaults to the session title
    pub exported_name: Option<String>,
    /// Extra files placed before the generated outputs
    pub additional_files: Vec<Blob>,
    /// Names paired positionally with `additional_files`
    pub additional_file_names: Vec<String>,
    pub is_final_doc: bool,
    /// Hand the artifact to the download sink instead of returning it
    pub trigger_download: bool,
    pub fields_highlight_color: Option<String>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            export_type: vec![DocumentType::Docx],
            comments_type: CommentsType::External,
            exported_name: None,
            additional_files: Vec::new(),
            additional_file_names: Vec::new(),
            is_final_doc: false,
            trigger_download: true,
            fields_highlight_color: None,
        }
    }
}

/// What [`Session::export`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// The artifact was handed to the download sink under this name
    Downloaded(String),
    /// The artifact itself
    Artifact(NamedBlob),
}

impl ExportOutcome {
    pub fn file_name(&self) -> &str {
        match self {
            Self::Downloaded(name) => name,
            Self::Artifact(artifact) => &artifact.name,
        }
    }

    pub fn into_artifact(self) -> Option<NamedBlob> {
        match self {
            Self::Artifact(artifact) => Some(artifact),
            Self::Downloaded(_) => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PIPELINE
// ═══════════════════════════════════════════════════════════════════════════

impl Session {
    /// Serialize every bound editor to DOCX, in registration order.
    ///
    /// Comments from the comments store are attached unless the request
    /// asks for clean output.
    pub async fn export_editors_to_docx(&self, mut request: DocxExportRequest) -> Result<Vec<Blob>> {
        if request.comments_type != CommentsType::Clean {
            if let Some(store) = &self.inner.collaborators.comments_store {
                request.comments.extend(store.comments_for_export());
            }
        }

        let editors = self.state().bound_editors();
        debug!(
            editors = editors.len(),
            comments = request.comments.len(),
            "Exporting editors to DOCX"
        );

        let request = &request;
        try_join_all(editors.iter().map(|editor| async move {
            editor.export_docx(request).await.map_err(|e| match e {
                Error::Export(_) => e,
                other => Error::export(format!("{}: {other}", editor.document_id())),
            })
        }))
        .await
    }

    /// Export the session to a single file or a zip bundle.
    pub async fn export(&self, options: ExportOptions) -> Result<ExportOutcome> {
        let ExportOptions {
            export_type,
            comments_type,
            exported_name,
            additional_files,
            additional_file_names,
            is_final_doc,
            trigger_download,
            fields_highlight_color,
        } = options;

        let base = clean_name(exported_name.as_deref().unwrap_or_else(|| self.title()));
        let docx = self
            .export_editors_to_docx(DocxExportRequest {
                is_final_doc,
                comments_type,
                comments: Vec::new(),
                fields_highlight_color,
            })
            .await?;

        let mut files = attachments(additional_files, additional_file_names);
        if export_type.contains(&DocumentType::Docx) {
            files.extend(
                docx.into_iter()
                    .map(|blob| NamedBlob::new(format!("{base}.docx"), blob)),
            );
        }

        let count = files.len();
        let artifact = if count == 1 {
            let primary = export_type.first().copied().unwrap_or_default();
            let only = files.swap_remove(0);
            NamedBlob::new(format!("{base}.{primary}"), only.blob)
        } else {
            NamedBlob::new(format!("{base}.zip"), bundle(&files)?)
        };
        info!(name = %artifact.name, files = count, bytes = artifact.blob.len(), "Export ready");

        match (&self.inner.collaborators.sink, trigger_download) {
            (Some(sink), true) => {
                sink.deliver(&artifact).await?;
                Ok(ExportOutcome::Downloaded(artifact.name))
            }
            (None, true) => {
                debug!("No download sink configured; returning artifact");
                Ok(ExportOutcome::Artifact(artifact))
            }
            (_, false) => Ok(ExportOutcome::Artifact(artifact)),
        }
    }
}

fn attachments(files: Vec<Blob>, names: Vec<String>) -> Vec<NamedBlob> {
    files
        .into_iter()
        .zip_longest(names)
        .enumerate()
        .filter_map(|(index, pair)| match pair {
            EitherOrBoth::Both(blob, name) => Some(NamedBlob::new(name, blob)),
            EitherOrBoth::Left(blob) => {
                Some(NamedBlob::new(format!("attachment-{}", index + 1), blob))
            }
            EitherOrBoth::Right(name) => {
                warn!(%name, "Ignoring file name without a file");
                None
            }
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════
// FILE NAMES & BUNDLES
// ═══════════════════════════════════════════════════════════════════════════

/// Turn a title into a base file name: strips characters that are invalid
/// in file names and collapses whitespace. Falls back to the default title.
pub fn clean_name(name: &str) -> String {
    static INVALID: OnceLock<Option<Regex>> = OnceLock::new();
    static SPACES: OnceLock<Option<Regex>> = OnceLock::new();

    let invalid = INVALID.get_or_init(|| Regex::new(r#"[\\/:*?"<>|\x00-\x1f]"#).ok());
    let spaces = SPACES.get_or_init(|| Regex::new(r"\s+").ok());

    let stripped = invalid
        .as_ref()
        .map_or_else(|| name.to_string(), |re| re.replace_all(name, "").into_owned());
    let collapsed = spaces
        .as_ref()
        .map_or_else(|| stripped.clone(), |re| re.replace_all(&stripped, " ").into_owned());

    let cleaned = collapsed.trim().trim_matches('.').trim();
    if cleaned.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Zip `files`; repeated names become `name (2).ext`, `name (3).ext`, ...
pub fn bundle(files: &[NamedBlob]) -> Result<Blob> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    for (name, file) in unique_names(files.iter().map(|file| file.name.as_str()))
        .into_iter()
        .zip(files)
    {
        writer.start_file(name, options)?;
        writer.write_all(&file.blob.data)?;
    }

    let cursor = writer.finish()?;
    Ok(Blob::new(cursor.into_inner(), ZIP_CONTENT_TYPE))
}

fn unique_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut used = HashSet::new();
    names
        .into_iter()
        .map(|name| {
            let mut candidate = name.to_string();
            let mut n = 2;
            while used.contains(&candidate) {
                candidate = numbered(name, n);
                n += 1;
            }
            used.insert(candidate.clone());
            candidate
        })
        .collect()
}

fn numbered(name: &str, n: usize) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem} ({n}).{ext}"),
        _ => format!("{name} ({n})"),
    }
}
