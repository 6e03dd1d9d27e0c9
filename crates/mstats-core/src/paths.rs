use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const MSTATS_DIR: &str = ".mstats";
pub const CONFIG_FILE: &str = ".mstats/config.yaml";
pub const DEFAULT_DB_FILE: &str = ".mstats/stats.redb";

// ---------------------------------------------------------------------------
// Path builders
// ---------------------------------------------------------------------------

pub fn mstats_dir(root: &Path) -> PathBuf {
    root.join(MSTATS_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Resolve a configured database path against the project root.
///
/// Absolute paths are returned unchanged.
pub fn resolve_db_path(root: &Path, configured: &Path) -> PathBuf {
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        root.join(configured)
    }
}
