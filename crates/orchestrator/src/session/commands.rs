//! Command bridge: translates commands raised by an external command
//! surface into session calls.

use std::str::FromStr;

use serde::Deserialize;
use tracing::{debug, warn};

use super::Session;
use crate::types::DocumentMode;

/// A command issued by the toolbar or another command surface.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", content = "argument", rename_all = "camelCase")]
pub enum SessionCommand {
    /// Mode name, matched case-insensitively
    SetDocumentMode(String),
    /// Zoom in percent
    SetZoom(u32),
    ToggleAutocomplete(bool),
}

impl Session {
    pub fn execute(&self, command: SessionCommand) {
        debug!(?command, "Executing command");
        match command {
            SessionCommand::SetDocumentMode(name) => match DocumentMode::from_str(name.trim()) {
                Ok(mode) => {
                    self.set_document_mode(mode);
                }
                Err(_) => warn!(mode = %name, "Ignoring unknown document mode"),
            },
            SessionCommand::SetZoom(percent) => {
                self.state().active_zoom = percent;
            }
            SessionCommand::ToggleAutocomplete(enabled) => {
                let editors = self.state().bound_editors();
                for editor in editors {
                    editor.set_autocomplete(enabled);
                }
            }
        }
    }
}
