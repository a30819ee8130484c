//! Locating the `fusermount` helper.

use super::constants::{DEFAULT_HELPER_PATH, HELPER_NAME};
use log::debug;
use std::env;
use std::ffi::OsStr;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static GLOBAL: OnceLock<HelperResolver> = OnceLock::new();

/// The resolved absolute path of the mount helper.
///
/// Resolution happens once; the path never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperResolver {
    path: PathBuf,
}

impl HelperResolver {
    /// Process-wide resolver, built from `PATH` on first use.
    pub fn global() -> &'static HelperResolver {
        GLOBAL.get_or_init(|| {
            let resolver = match env::var_os("PATH") {
                Some(search_path) => Self::from_search_path(&search_path),
                None => Self::fixed(DEFAULT_HELPER_PATH),
            };
            debug!("Using mount helper {:?}", resolver.path);
            resolver
        })
    }

    /// Scans the `:`-separated `search_path` in order for an executable
    /// `fusermount`, falling back to `/bin/fusermount`.
    ///
    /// Relative and empty entries are skipped: they would name a different
    /// file once the helper runs from another working directory.
    pub fn from_search_path(search_path: &OsStr) -> Self {
        Self::find_in(env::split_paths(search_path), HELPER_NAME)
            .unwrap_or_else(|| Self::fixed(DEFAULT_HELPER_PATH))
    }

    /// A resolver pinned to `path`, without any lookup.
    pub fn fixed(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The helper's path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn find_in(dirs: impl IntoIterator<Item = PathBuf>, name: &str) -> Option<Self> {
        dirs.into_iter()
            .filter(|dir| dir.is_absolute())
            .map(|dir| dir.join(name))
            .find(|candidate| is_executable(candidate))
            .map(|path| Self { path })
    }
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
