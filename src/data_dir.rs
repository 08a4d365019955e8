use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Overrides the XDG location when set and non-empty.
pub const DATA_DIR_ENV: &str = "TAGDEX_DATA_DIR";

const STATE_FILE: &str = "state.redb";
const EXPORT_FILE: &str = "export.json";

/// Where tagdex keeps its redb state file and default exports.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Pick the data directory and make sure it exists.
    ///
    /// `--data-dir` wins over `TAGDEX_DATA_DIR`, which wins over
    /// `$XDG_DATA_HOME/tagdex`.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var_os(DATA_DIR_ENV).map(PathBuf::from);
        let root = match choose_root(explicit, from_env) {
            Some(root) => root,
            None => xdg::BaseDirectories::with_prefix("tagdex")
                .get_data_home()
                .ok_or_else(|| {
                    Error::Config("no XDG data home for tagdex".into())
                })?,
        };
        Self::at(root)
    }

    /// Use `root` as is, creating it when missing.
    pub fn at(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            std::fs::create_dir_all(&root)
                .map_err(|_| Error::DataDir(root.clone()))?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_db(&self) -> PathBuf {
        self.root.join(STATE_FILE)
    }

    /// Destination for `tagdex export` when no path is given.
    pub fn default_export(&self) -> PathBuf {
        self.root.join(EXPORT_FILE)
    }
}

// An empty environment value counts as unset.
fn choose_root(
    explicit: Option<&Path>,
    from_env: Option<PathBuf>,
) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| from_env.filter(|path| !path.as_os_str().is_empty()))
}
