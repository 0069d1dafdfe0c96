//! Text dump of the hole list.

use std::{fs, path::Path};

use memory_manager::view::HoleList;
use snafu::ResultExt as _;

use crate::report::GenericError;

/// Formats holes as `[offset, length] - [offset, length]`.
#[must_use]
pub fn format_memory_map(holes: &HoleList) -> String {
    holes
        .iter()
        .map(|h| format!("[{}, {}]", h.offset(), h.length()))
        .collect::<Vec<_>>()
        .join(" - ")
}

/// Writes the formatted hole list to `path`, replacing any existing file.
///
/// No trailing newline is written; an arena without holes produces an empty
/// file.
pub fn dump_memory_map(path: &Path, holes: &HoleList) -> Result<(), GenericError> {
    fs::write(path, format_memory_map(holes))
        .with_whatever_context(|_| format!("failed to write memory map to {}", path.display()))?;
    log::debug!("wrote {} holes to {}", holes.len(), path.display());
    Ok(())
}
