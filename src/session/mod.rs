//! Session persistence: the index file, locating data files, and writing /
//! reconstructing a whole analysis.
//!
//! Directory layout:
//! ```text
//! <session>/index.txt
//! <session>/PolygonFilters.poly            (only with polygon filters)
//! <session>/<ordinal>_<name>/config.txt
//! <session>/<ordinal>_<name>/_filter_manual.npy
//! ```

pub mod dump;
pub mod index;
pub mod load;
pub mod path;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Result;
pub use index::{IndexEntry, SessionIndex};
pub use path::{find_data_path, MissingFilePolicy};

/// What to do when recorded and recomputed file hashes disagree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashPolicy {
    /// Log, report a [`SessionWarning::HashMismatch`] and keep loading.
    #[default]
    Warn,
    /// Fail with [`crate::Error::HashMismatch`].
    Error,
}

/// Knobs for [`load::reconstruct`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    pub missing_files: MissingFilePolicy,
    pub hash_mismatch: HashPolicy,
}

/// Non-fatal findings while reconstructing a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionWarning {
    HashMismatch { entry: String, path: PathBuf },
    ManualMaskIgnored { entry: String, path: PathBuf },
}

impl fmt::Display for SessionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionWarning::HashMismatch { entry, path } => {
                write!(f, "[{entry}] file hashes don't match for: {}", path.display())
            }
            SessionWarning::ManualMaskIgnored { entry, path } => {
                write!(f, "[{entry}] manual exclusion mask ignored: {}", path.display())
            }
        }
    }
}

/// An index entry whose data file could not be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingFile {
    pub key: String,
    pub path: PathBuf,
}

/// List the measurements of a session whose data file cannot be located
/// (hierarchy children have none and are skipped).
pub fn index_check(index_file: &Path, search_path: &Path) -> Result<Vec<MissingFile>> {
    let index = index::load(index_file)?;
    let mut missing = Vec::new();
    for (_, key, entry) in index.ordered()? {
        if entry.is_hierarchy_child() {
            continue;
        }
        let path = find_data_path(entry, search_path, MissingFilePolicy::Warn)?;
        if !path.exists() {
            missing.push(MissingFile {
                key: key.to_string(),
                path,
            });
        }
    }
    Ok(missing)
}
