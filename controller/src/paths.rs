//! Where the controller looks for its files.
//!
//! Relative paths (`.env`, lookup tables, import files) are searched in the
//! working directory, then the workspace root, then the controller crate
//! directory. The forecast database defaults to the workspace root.

use std::path::{Path, PathBuf};

/// `controller/` crate directory (compile-time).
pub fn controller_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

/// Parent of `controller/`, or the controller dir itself at the filesystem root.
pub fn workspace_root() -> PathBuf {
    controller_dir()
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(controller_dir)
}

fn search_dirs() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = std::env::current_dir().into_iter().collect();
    dirs.push(workspace_root());
    dirs.push(controller_dir());
    dirs
}

/// First existing `<dir>/<rel>` over the search directories.
pub fn find_existing<P: AsRef<Path>>(rel: P) -> Option<PathBuf> {
    let rel = rel.as_ref();
    search_dirs().into_iter().map(|d| d.join(rel)).find(|p| p.exists())
}

/// A path typed by the user. Used as given when it exists or is absolute,
/// otherwise looked up in the search directories; unchanged when not found.
pub fn resolve_user_path<P: AsRef<Path>>(p: P) -> PathBuf {
    let p = p.as_ref();
    if p.exists() || p.is_absolute() {
        return p.to_path_buf();
    }
    find_existing(p).unwrap_or_else(|| p.to_path_buf())
}

/// Default location of the forecast database.
pub fn default_db_path() -> PathBuf {
    workspace_root().join("forecasts.db")
}

/// Load the first `.env` found, once per process.
pub fn load_dotenv() {
    static ONCE: std::sync::OnceLock<()> = std::sync::OnceLock::new();
    ONCE.get_or_init(|| match find_existing(".env") {
        Some(p) => match dotenvy::from_path(&p) {
            Ok(()) => tracing::debug!("Loaded .env from {}", p.display()),
            Err(e) => tracing::warn!("Ignoring unreadable {}: {}", p.display(), e),
        },
        None => tracing::debug!("No .env found; using the process environment"),
    });
}
