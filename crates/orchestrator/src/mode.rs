//! Role-gated document mode resolution.
//!
//! Editing requires the editor role; suggesting requires editor or
//! suggester. A request the role cannot hold is downgraded one step at a
//! time (editing, then suggesting, then viewing). Viewing is always allowed.

use crate::types::{DocumentMode, Role};

/// Whether `role` may hold `mode`.
pub const fn allows(role: Role, mode: DocumentMode) -> bool {
    match mode {
        DocumentMode::Viewing => true,
        DocumentMode::Suggesting => matches!(role, Role::Editor | Role::Suggester),
        DocumentMode::Editing => matches!(role, Role::Editor),
    }
}

/// The mode actually entered when `role` requests `requested`.
pub const fn resolve(role: Role, requested: DocumentMode) -> DocumentMode {
    let mut mode = requested;
    while !allows(role, mode) {
        mode = downgrade(mode);
    }
    mode
}

const fn downgrade(mode: DocumentMode) -> DocumentMode {
    match mode {
        DocumentMode::Editing => DocumentMode::Suggesting,
        DocumentMode::Suggesting | DocumentMode::Viewing => DocumentMode::Viewing,
    }
}
