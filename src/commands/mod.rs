//! Command implementations shared by the `primeclaim` binary.

use std::path::Path;

/// Claim artifact construction and verification.
pub mod claim;
/// Standalone membership proofs.
pub mod proof;

/// Writes `contents` to `path`, creating missing parent directories.
pub(crate) fn write_output(path: &Path, contents: &[u8]) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("failed to create {}: {e}", parent.display()))?;
        }
    }
    std::fs::write(path, contents).map_err(|e| format!("failed to write {}: {e}", path.display()))
}
