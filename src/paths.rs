use std::path::{Path, PathBuf};

/// Get the base data directory following XDG Base Directory Specification.
/// Returns `$XDG_DATA_HOME/camcast` or `~/.local/share/camcast`.
pub fn data_dir() -> PathBuf {
    if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg_data).join("camcast");
    }

    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home)
        .join(".local")
        .join("share")
        .join("camcast")
}

/// Get the logs directory path.
/// Returns `{data_dir}/logs`.
pub fn log_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
