//! # Folio Orchestrator
//!
//! Session orchestration for multi-document, multi-user rich-text editing.
//!
//! A [`Session`] owns N Documents, optionally synchronizes them over a
//! CRDT-backed collaboration channel, counts editor readiness, enforces the
//! role-gated document mode, coordinates locking and saves, and exports the
//! bound editors to downloadable artifacts.
//!
//! ## Components
//!
//! - [`registry`]: normalizes document inputs into canonical [`Document`]s
//! - [`collaboration`]: attaches replicas and sync providers
//! - [`session`]: the orchestrator and its command bridge
//! - [`export`]: DOCX fan-out and zip bundling
//!
//! ## Laws (Compiler Enforced)
//!
//! - No `unwrap()` / `expect()` / `panic!()` - returns `Result` instead
//! - No `unsafe` - safe Rust only
//!
//! Only configuration validation fails fast. Failures from editors and the
//! collaboration layer surface as `exception` events.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![forbid(unsafe_code)]

pub mod collaboration;
pub mod config;
pub mod document;
pub mod editor;
mod error;
pub mod events;
pub mod export;
pub mod mode;
pub mod registry;
pub mod roster;
pub mod session;
pub mod types;

pub use collaboration::{CollaborationBackend, CollaborationMode, MemoryBackend};
pub use config::SessionConfig;
pub use document::{Document, DocumentSource};
pub use editor::{BufferEditor, Editor, EditorRef};
pub use error::{Error, Result};
pub use events::{EventBus, EventKind, SessionEvent};
pub use export::{DirectorySink, DownloadSink, ExportOptions, ExportOutcome};
pub use registry::{DocumentDescriptor, DocumentInput, DocumentRegistry};
pub use session::{LockStatus, Session, SessionBuilder, SessionCommand};
pub use types::{Blob, DocumentId, DocumentMode, DocumentType, FileHandle, NamedBlob, Role, User};
