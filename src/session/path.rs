//! Locating measurement data files recorded in an index entry.

use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

use super::index::IndexEntry;
use crate::error::{Error, Result};

/// What to do when a recorded data file cannot be found anywhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingFilePolicy {
    /// Log a warning and hand back the recorded path.
    #[default]
    Warn,
    /// Fail with [`Error::FileNotFound`].
    Error,
}

/// Find the data file of a (non-child) index entry.
///
/// Tries the recorded `fdir/name` first. Failing that, both `search_path`
/// and the recorded relative directory `rdir` (default `"."`) are used as
/// roots for `<root>/<rdir>/<name>` and `<root>/<rdir>/<basename(fdir)>/<name>`,
/// which covers sessions moved together with, or independently of, their
/// data folder.
pub fn find_data_path(
    entry: &IndexEntry,
    search_path: &Path,
    policy: MissingFilePolicy,
) -> Result<PathBuf> {
    let name = required(entry, "name")?;
    let fdir = required(entry, "fdir")?;
    let recorded = Path::new(fdir).join(name);
    if recorded.exists() {
        return Ok(recorded);
    }

    let rdir = entry.get("rdir").unwrap_or(".");
    let fbase = fdir_basename(fdir);
    for root in [search_path, Path::new(rdir)] {
        let dira = absolute(&absolute(root).join(rdir));
        let candidate = dira.join(name);
        if candidate.exists() {
            return Ok(candidate);
        }
        if let Some(fbase) = fbase {
            let candidate = dira.join(fbase).join(name);
            if candidate.exists() {
                return Ok(candidate);
            }
        }
    }

    match policy {
        MissingFilePolicy::Warn => {
            log::warn!("Could not find file: {}", recorded.display());
            Ok(recorded)
        }
        MissingFilePolicy::Error => Err(Error::FileNotFound(recorded)),
    }
}

fn required<'a>(entry: &'a IndexEntry, key: &str) -> Result<&'a str> {
    entry
        .get(key)
        .ok_or_else(|| Error::CorruptSession(format!("index entry lacks '{key}'")))
}

/// Last component of a recorded directory, also for Windows paths read on
/// other platforms.
fn fdir_basename(fdir: &str) -> Option<&str> {
    if fdir.contains('\\') {
        fdir.rsplit('\\').find(|s| !s.is_empty())
    } else {
        Path::new(fdir).file_name().and_then(|s| s.to_str())
    }
}

/// Lexically normalised absolute path (like Python's `abspath`).
pub fn absolute(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };
    let mut out = PathBuf::new();
    for comp in joined.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// `path` expressed relative to `base`, or `None` when the two share no
/// root (different drives on Windows).
pub fn relative_to(path: &Path, base: &Path) -> Option<PathBuf> {
    let path = absolute(path);
    let base = absolute(base);
    let pc: Vec<Component> = path.components().collect();
    let bc: Vec<Component> = base.components().collect();
    if pc.first() != bc.first() {
        return None;
    }
    let common = pc.iter().zip(&bc).take_while(|(a, b)| a == b).count();
    let mut rel = PathBuf::new();
    for _ in common..bc.len() {
        rel.push("..");
    }
    for comp in &pc[common..] {
        rel.push(comp.as_os_str());
    }
    if rel.as_os_str().is_empty() {
        rel.push(".");
    }
    Some(rel)
}
