use std::path::{Path, PathBuf};

/// Expand a leading `~/` to the given home directory.
pub fn expand_home(value: &str, home: &Path) -> String {
    match value.strip_prefix("~/") {
        Some(rest) => home.join(rest).to_string_lossy().to_string(),
        None => value.to_string(),
    }
}

/// Same as [`expand_home`] for path-typed values.
pub fn expand_home_path(value: &Path, home: &Path) -> PathBuf {
    match value.strip_prefix("~") {
        Ok(rest) if value.to_string_lossy().starts_with("~/") => home.join(rest),
        _ => value.to_path_buf(),
    }
}

/// Collapse the home directory prefix back into `~` for display.
pub fn abbreviate(path: &Path, home: &Path) -> String {
    match path.strip_prefix(home) {
        Ok(rest) if rest.as_os_str().is_empty() => "~".to_string(),
        Ok(rest) => format!("~/{}", rest.display()),
        Err(_) => path.display().to_string(),
    }
}
