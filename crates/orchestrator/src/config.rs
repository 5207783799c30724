//! Session construction options
//!
//! Every recognized option is enumerated here with its default. Behavioral
//! collaborators (event callbacks, image upload, collaboration backend,
//! command surface) are not serializable and are supplied through
//! [`crate::session::SessionBuilder`] instead.
//!
//! # Example Config
//!
//! ```toml
//! selector = "#editor"
//! documentMode = "editing"
//! role = "editor"
//! title = "Master services agreement"
//! colors = ["#a11134", "#2a7e34", "#b29d11"]
//!
//! [user]
//! name = "Ada"
//! email = "ada@example.com"
//!
//! [[documents]]
//! id = "msa"
//! type = "docx"
//! url = "https://files.example.com/msa.docx"
//!
//! [modules.collaboration]
//! providerType = "hocuspocus"
//! url = "wss://collab.example.com"
//! ```

use std::{collections::BTreeMap, path::Path};

use serde::Deserialize;

use crate::{
    registry::DocumentInput,
    types::{DocumentMode, Role, User},
    Error, Result,
};

/// Title used for exports when neither `title` nor an explicit name is given.
pub const DEFAULT_TITLE: &str = "Document";

// ═══════════════════════════════════════════════════════════════════════════
// CONFIGURATION STRUCTURES
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    /// Session identifier; generated when absent
    pub session_id: Option<String>,
    /// Mount target of the hosting surface (required)
    pub selector: Option<String>,
    pub document_mode: DocumentMode,
    pub role: Role,
    /// A single document; takes priority over `documents`
    pub document: Option<DocumentInput>,
    pub documents: Vec<DocumentInput>,
    /// The current user
    pub user: User,
    /// Everyone with access to the session
    pub users: Vec<User>,
    /// Awareness color palette, shuffled once at construction
    pub colors: Vec<String>,
    pub title: String,
    pub modules: ModulesConfig,
    pub pagination: bool,
    pub rulers: bool,
    /// Mount target of the toolbar
    pub toolbar: Option<String>,
    pub toolbar_groups: Vec<String>,
    pub toolbar_icons: BTreeMap<String, String>,
    pub toolbar_texts: BTreeMap<String, String>,
    pub telemetry: Option<TelemetryConfig>,
    pub is_locked: bool,
    pub locked_by: Option<User>,
    pub is_dev: bool,
    /// Disable slash and right-click context menus
    pub disable_context_menu: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModulesConfig {
    pub comments: Option<CommentsConfig>,
    pub ai: Option<AiConfig>,
    pub collaboration: Option<CollaborationConfig>,
    pub toolbar: Option<ToolbarModuleConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommentsConfig {
    /// Request a dedicated cross-document sync channel
    pub use_internal_external_comments: bool,
    /// Veto the dedicated channel even when requested
    pub suppress_internal_external_comments: bool,
    /// Mount target of the comments list
    pub element: Option<String>,
}

impl CommentsConfig {
    /// Whether a dedicated session-wide replica should be created.
    pub const fn wants_dedicated_channel(&self) -> bool {
        self.use_internal_external_comments && !self.suppress_internal_external_comments
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollaborationConfig {
    pub provider_type: String,
    pub url: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolbarModuleConfig {
    pub selector: Option<String>,
    pub groups: Option<Vec<String>>,
    pub icons: Option<BTreeMap<String, String>>,
    pub texts: Option<BTreeMap<String, String>>,
    pub fonts: Option<Vec<String>>,
    pub hide_buttons: bool,
    pub responsive_to_container: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub license_key: Option<String>,
    pub endpoint: Option<String>,
}

/// Toolbar options after merging `modules.toolbar` over the top-level keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolbarSettings {
    pub selector: Option<String>,
    pub groups: Vec<String>,
    pub icons: BTreeMap<String, String>,
    pub texts: BTreeMap<String, String>,
    pub fonts: Option<Vec<String>>,
    pub hide_buttons: bool,
    pub responsive_to_container: bool,
    pub role: Role,
    pub document_mode: DocumentMode,
    pub pagination: bool,
    pub ai_api_key: Option<String>,
    pub ai_endpoint: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════
// DEFAULT IMPLEMENTATIONS
// ═══════════════════════════════════════════════════════════════════════════

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: None,
            selector: None,
            document_mode: DocumentMode::Editing,
            role: Role::Editor,
            document: None,
            documents: Vec::new(),
            user: User::default(),
            users: Vec::new(),
            colors: Vec::new(),
            title: DEFAULT_TITLE.to_string(),
            modules: ModulesConfig::default(),
            pagination: false,
            rulers: false,
            toolbar: None,
            toolbar_groups: vec!["left".into(), "center".into(), "right".into()],
            toolbar_icons: BTreeMap::new(),
            toolbar_texts: BTreeMap::new(),
            telemetry: None,
            is_locked: false,
            locked_by: None,
            is_dev: false,
            disable_context_menu: false,
        }
    }
}

impl Default for CollaborationConfig {
    fn default() -> Self {
        Self {
            provider_type: "hocuspocus".to_string(),
            url: None,
            token: None,
        }
    }
}

impl Default for ToolbarModuleConfig {
    fn default() -> Self {
        Self {
            selector: None,
            groups: None,
            icons: None,
            texts: None,
            fonts: None,
            hide_buttons: true,
            responsive_to_container: false,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            license_key: None,
            endpoint: None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// LOADING & VALIDATION
// ═══════════════════════════════════════════════════════════════════════════

impl SessionConfig {
    /// Config with only the mount target set.
    pub fn with_selector(selector: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            ..Self::default()
        }
    }

    pub fn from_toml_str(input: &str) -> Result<Self> {
        Ok(toml::from_str(input)?)
    }

    pub fn from_json_str(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }

    /// Load from a `.toml` or `.json` file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Io(format!("Failed to read {}: {e}", path.display())))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content),
            Some("toml") => Self::from_toml_str(&content),
            other => Err(Error::Parse(format!(
                "Unsupported config extension: {}",
                other.unwrap_or("<none>")
            ))),
        }
    }

    /// Fail-fast validation; a missing mount target is fatal.
    pub fn validate(&self) -> Result<()> {
        match self.selector.as_deref().map(str::trim) {
            Some(selector) if !selector.is_empty() => Ok(()),
            _ => Err(Error::configuration("selector is required")),
        }
    }

    pub fn is_collaborative(&self) -> bool {
        self.modules.collaboration.is_some()
    }

    pub fn toolbar_settings(&self) -> ToolbarSettings {
        let module = self.modules.toolbar.clone().unwrap_or_default();
        let ai = self.modules.ai.clone().unwrap_or_default();

        ToolbarSettings {
            selector: module.selector.or_else(|| self.toolbar.clone()),
            groups: module.groups.unwrap_or_else(|| self.toolbar_groups.clone()),
            icons: module.icons.unwrap_or_else(|| self.toolbar_icons.clone()),
            texts: module.texts.unwrap_or_else(|| self.toolbar_texts.clone()),
            fonts: module.fonts,
            hide_buttons: module.hide_buttons,
            responsive_to_container: module.responsive_to_container,
            role: self.role,
            document_mode: self.document_mode,
            pagination: self.pagination,
            ai_api_key: ai.api_key,
            ai_endpoint: ai.endpoint,
        }
    }
}
