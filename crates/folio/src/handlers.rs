//! Subcommand handlers.

use std::{
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::ArgMatches;
use folio_orchestrator::{
    editor::CommentsType, mode, Blob, BufferEditor, DirectorySink, DocumentInput,
    DocumentMode, DocumentRegistry, DocumentType, Error, ExportOptions, FileHandle, Role,
    Session, SessionConfig,
};
use tracing::{debug, info};

/// Selector used for sessions created by the CLI; there is no host page.
const HEADLESS_SELECTOR: &str = "#folio";

pub fn format_error(err: &anyhow::Error) -> String {
    let msg = err.to_string();
    if let Some(source) = err.source() {
        let source_msg = source.to_string();
        if !msg.contains(&source_msg) && !source_msg.is_empty() {
            return format!("{msg}\nCause: {source_msg}");
        }
    }
    msg
}

// ═══════════════════════════════════════════════════════════════════════════
// DOCUMENTS
// ═══════════════════════════════════════════════════════════════════════════

pub fn handle_documents(sub_m: &ArgMatches) -> Result<()> {
    let path = required_path(sub_m, "config")?;
    let mut config = SessionConfig::load(path)?;

    let documents =
        DocumentRegistry::default().resolve(config.document.take(), std::mem::take(&mut config.documents));
    debug!(count = documents.len(), "Resolved documents");

    println!("{}", serde_json::to_string_pretty(&documents)?);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
// MODE
// ═══════════════════════════════════════════════════════════════════════════

pub fn handle_mode(sub_m: &ArgMatches) -> Result<()> {
    let role = parse_arg::<Role>(sub_m, "role")?;
    let requested = parse_arg::<DocumentMode>(sub_m, "request")?;

    println!("{}", mode::resolve(role, requested));
    Ok(())
}

fn parse_arg<T: FromStr>(sub_m: &ArgMatches, name: &str) -> Result<T> {
    let raw = sub_m
        .get_one::<String>(name)
        .with_context(|| format!("--{name} is required"))?;
    T::from_str(raw).map_err(|_| Error::Parse(format!("invalid --{name}: {raw}")).into())
}

// ═══════════════════════════════════════════════════════════════════════════
// BUNDLE
// ═══════════════════════════════════════════════════════════════════════════

pub async fn handle_bundle(sub_m: &ArgMatches) -> Result<()> {
    let out = required_path(sub_m, "out")?.to_path_buf();
    let files: Vec<PathBuf> = sub_m
        .get_many::<PathBuf>("files")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    let mut documents = Vec::new();
    let mut attachments = Vec::new();
    for path in &files {
        let handle = read_file(path).await?;
        if DocumentType::from_file_name(&handle.name) == Some(DocumentType::Docx) {
            documents.push(handle);
        } else {
            attachments.push(handle);
        }
    }

    let mut config = SessionConfig::with_selector(HEADLESS_SELECTOR);
    config.documents = documents.iter().cloned().map(DocumentInput::from).collect();

    let session = Session::builder(config)
        .download_sink(Arc::new(DirectorySink::new(&out)))
        .build()?;

    // Documents come back in input order, so each one pairs with its file.
    for (document, file) in session.documents().iter().zip(&documents) {
        let editor = BufferEditor::new(document.id.clone(), String::new()).with_docx(file.data.clone());
        session.editor_created(editor.into_ref());
    }

    // A lone attachment keeps its extension when its type is known.
    let primary = match (documents.is_empty(), attachments.as_slice()) {
        (true, [only]) => DocumentType::from_file_name(&only.name),
        _ => None,
    };

    let (additional_file_names, additional_files): (Vec<String>, Vec<Blob>) = attachments
        .into_iter()
        .map(|file| (file.name, Blob::new(file.data, file.content_type)))
        .unzip();

    let options = ExportOptions {
        exported_name: sub_m.get_one::<String>("name").cloned(),
        comments_type: if sub_m.get_flag("clean") {
            CommentsType::Clean
        } else {
            CommentsType::External
        },
        additional_files,
        additional_file_names,
        export_type: vec![primary.unwrap_or_default()],
        ..ExportOptions::default()
    };

    let outcome = session.export(options).await;
    session.destroy();
    let outcome = outcome?;

    info!(artifact = outcome.file_name(), "Bundle written");
    println!("{}", out.join(outcome.file_name()).display());
    Ok(())
}

async fn read_file(path: &Path) -> Result<FileHandle> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| Error::Io(format!("Failed to read {}: {e}", path.display())))?;
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .with_context(|| format!("Invalid file name: {}", path.display()))?;
    let content_type = DocumentType::from_file_name(&name)
        .map_or("application/octet-stream", DocumentType::mime_type);
    Ok(FileHandle::new(name, content_type, data))
}

fn required_path<'a>(sub_m: &'a ArgMatches, name: &str) -> Result<&'a Path> {
    sub_m
        .get_one::<PathBuf>(name)
        .map(PathBuf::as_path)
        .with_context(|| format!("{name} is required"))
}
