//! Path helpers for resolving local media.
//!
//! Media targets and the server root are user-supplied strings, so they may
//! use `~` for the home directory. URLs served for local files use forward
//! slashes regardless of platform.

use std::path::{Component, Path, PathBuf};

/// Returns the data directory for batchlabel logs.
///
/// Uses `$XDG_DATA_HOME/batchlabel` when set, otherwise
/// `~/.local/share/batchlabel`.
#[must_use]
pub fn get_data_dir() -> PathBuf {
    std::env::var_os("XDG_DATA_HOME")
        .filter(|dir| !dir.is_empty())
        .map_or_else(|| expand_tilde("~/.local/share"), PathBuf::from)
        .join("batchlabel")
}

/// Expands a leading `~` to the user's home directory.
///
/// Paths without a tilde, or systems without `HOME`/`USERPROFILE`, are
/// returned unchanged.
///
/// # Examples
///
/// ```
/// use batchlabel::infrastructure::expand_tilde;
/// use std::path::PathBuf;
///
/// assert_eq!(expand_tilde("/absolute/path"), PathBuf::from("/absolute/path"));
/// ```
#[must_use]
pub fn expand_tilde(path: &str) -> PathBuf {
    let home = || {
        std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
    };

    if path == "~" {
        return home().unwrap_or_else(|| PathBuf::from(path));
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = home() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Returns `path` relative to `root` as a forward-slash string.
///
/// Returns `None` when `path` is not inside `root`. Both paths are
/// canonicalized when they exist so that symlinks and `..` segments cannot
/// escape the root.
///
/// # Examples
///
/// ```
/// use batchlabel::infrastructure::relative_within;
/// use std::path::Path;
///
/// let rel = relative_within(Path::new("/srv/data/img/a.jpg"), Path::new("/srv/data"));
/// assert_eq!(rel.as_deref(), Some("img/a.jpg"));
/// assert!(relative_within(Path::new("/etc/passwd"), Path::new("/srv/data")).is_none());
/// ```
#[must_use]
pub fn relative_within(path: &Path, root: &Path) -> Option<String> {
    let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());

    let relative = path.strip_prefix(&root).ok()?;
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_str()?.to_string()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tilde_alone_and_prefixed() {
        if let Some(home) = std::env::var_os("HOME") {
            assert_eq!(expand_tilde("~"), PathBuf::from(&home));
            assert_eq!(expand_tilde("~/data"), PathBuf::from(home).join("data"));
        }
        assert_eq!(expand_tilde("rel/~/x"), PathBuf::from("rel/~/x"));
    }

    #[test]
    fn parent_segments_cannot_escape_root() {
        assert!(relative_within(Path::new("/srv/data/../secret"), Path::new("/srv/data")).is_none());
    }

    #[test]
    fn data_dir_is_namespaced() {
        assert!(get_data_dir().ends_with("batchlabel"));
    }

    #[test]
    fn root_itself_is_not_a_file_path() {
        assert!(relative_within(Path::new("/srv/data"), Path::new("/srv/data")).is_none());
    }
}
