//! Lexical mount point normalization.
//!
//! Mount points are cleaned without touching the filesystem: symlinks are not
//! resolved, since the mount point may not be reachable by the caller before
//! the helper has run.

use super::error::{Error, Result};
use std::env;
use std::path::{Component, Path, PathBuf};

/// Returns the shortest path equivalent to `path` by lexical processing.
///
/// Repeated separators and `.` elements are dropped, `name/..` pairs are
/// removed, and `..` directly under the root is dropped. An empty result is
/// `.` for relative input.
pub fn clean(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                Some(Component::ParentDir) | Some(Component::CurDir) | None => {
                    parts.push(component)
                }
            },
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.iter().map(|c| c.as_os_str()).collect()
}

/// Cleans `path` and, when relative, anchors it at the current directory.
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    let cleaned = clean(path);
    if cleaned.is_absolute() {
        return Ok(cleaned);
    }
    let cwd = env::current_dir().map_err(Error::PathResolution)?;
    Ok(absolutize_in(&cwd, &cleaned))
}

/// Like [`absolutize`] with an explicit base directory.
pub fn absolutize_in(base: &Path, path: &Path) -> PathBuf {
    let cleaned = clean(path);
    if cleaned.is_absolute() {
        return cleaned;
    }
    clean(&base.join(cleaned))
}
