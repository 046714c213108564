//! Plain-text session index (`index.txt`).
//!
//! ```text
//! # ShapeOut measurement index
//! # Software version 0.7.6
//! [1_M1_data]
//! config = 1_M1_data/config.txt
//! fdir = /data/2016-03-01
//! name = M1_data.csv
//! ...
//! ```
//!
//! The section grammar (comments, `[section]`, `key = value`) is shared with
//! measurement configuration files and the polygon filter file, which is why
//! [`parse_sections`] and [`render_sections`] are public to the crate.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// File name of the index inside a session directory.
pub const INDEX_FILE: &str = "index.txt";

/// Version reported for sessions written before the version line existed.
pub const UNVERSIONED: &str = "0.0.1";

const HEADER_TITLE: &str = "# ShapeOut measurement index";

/// Raw section → key → value mapping produced by the section grammar.
pub type Sections = BTreeMap<String, BTreeMap<String, String>>;

// ---------------------------------------------------------------------------
// IndexEntry / SessionIndex
// ---------------------------------------------------------------------------

/// Value of `special type` that marks a hierarchy child entry.
pub const HIERARCHY_CHILD: &str = "hierarchy child";

/// One `[<ordinal>_<name>]` section of the index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexEntry {
    values: BTreeMap<String, String>,
}

impl IndexEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether this entry describes a measurement derived from a parent.
    pub fn is_hierarchy_child(&self) -> bool {
        self.get("special type") == Some(HIERARCHY_CHILD)
    }

    fn merge(&mut self, other: &IndexEntry) {
        for (k, v) in &other.values {
            self.values.insert(k.clone(), v.clone());
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for IndexEntry {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        IndexEntry {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// The full index: one entry per measurement, keyed `"<ordinal>_<name>"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionIndex {
    entries: BTreeMap<String, IndexEntry>,
}

impl SessionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&IndexEntry> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, entry: IndexEntry) {
        self.entries.insert(key.into(), entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &IndexEntry)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), e))
    }

    /// Entries paired with the ordinal encoded in their key, sorted by
    /// ordinal.
    ///
    /// Fails with [`Error::CorruptSession`] unless the ordinals form the
    /// permutation `1..=len()`.
    pub fn ordered(&self) -> Result<Vec<(usize, &str, &IndexEntry)>> {
        let n = self.entries.len();
        let mut slots: Vec<Option<(usize, &str, &IndexEntry)>> = vec![None; n];
        for (key, entry) in &self.entries {
            let ord = ordinal(key).ok_or_else(|| {
                Error::CorruptSession(format!("index key '{key}' has no numeric ordinal"))
            })?;
            if ord == 0 || ord > n {
                return Err(Error::CorruptSession(format!(
                    "ordinal {ord} of '{key}' is outside 1..={n}"
                )));
            }
            if let Some((_, other, _)) = slots[ord - 1] {
                return Err(Error::CorruptSession(format!(
                    "ordinal {ord} used by both '{other}' and '{key}'"
                )));
            }
            slots[ord - 1] = Some((ord, key.as_str(), entry));
        }
        // n distinct ordinals in 1..=n leave no gaps
        Ok(slots.into_iter().flatten().collect())
    }

    fn from_sections(sections: Sections) -> Self {
        SessionIndex {
            entries: sections
                .into_iter()
                .map(|(name, values)| (name, IndexEntry { values }))
                .collect(),
        }
    }

    fn to_sections(&self) -> Sections {
        self.entries
            .iter()
            .map(|(name, e)| (name.clone(), e.values.clone()))
            .collect()
    }
}

/// Numeric prefix of an index key (`"12_M3_data"` → `12`).
pub fn ordinal(key: &str) -> Option<usize> {
    key.split('_').next()?.parse().ok()
}

/// Index key for a measurement.
pub fn entry_key(ordinal: usize, name: &str) -> String {
    format!("{ordinal}_{name}")
}

// ---------------------------------------------------------------------------
// Section grammar
// ---------------------------------------------------------------------------

/// Parse the section grammar. `origin` is only used in error messages.
///
/// Text after `#` is a comment. `[name]` opens (or re-opens) a section.
/// Lines without `=` and lines with an empty key or value are skipped.
pub(crate) fn parse_sections(text: &str, origin: &Path) -> Result<Sections> {
    let mut sections = Sections::new();
    let mut current: Option<String> = None;

    for (line_no, raw) in text.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            let name = line[1..line.len() - 1].to_string();
            sections.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || value.is_empty() {
            continue;
        }
        let Some(section) = current.as_ref() else {
            return Err(Error::format(
                origin,
                format!("line {}: '{key}' appears before any [section]", line_no + 1),
            ));
        };
        sections
            .entry(section.clone())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    Ok(sections)
}

/// Render sections (sorted, keys sorted) with CRLF line endings.
pub(crate) fn render_sections(header: &[String], sections: &Sections) -> String {
    let mut out = String::new();
    for line in header {
        out.push_str(line);
        out.push_str("\r\n");
    }
    for (name, values) in sections {
        out.push_str(&format!("[{name}]\r\n"));
        for (key, value) in values {
            out.push_str(&format!("{key} = {value}\r\n"));
        }
        out.push_str("\r\n");
    }
    out
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::format(path, e.to_string()))
}

// ---------------------------------------------------------------------------
// Public codec
// ---------------------------------------------------------------------------

/// Accept either the index file itself or the session directory holding it.
pub fn index_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(INDEX_FILE)
    } else {
        path.to_path_buf()
    }
}

/// Load an index file.
pub fn load(path: &Path) -> Result<SessionIndex> {
    let path = index_path(path);
    let text = read_text(&path)?;
    Ok(SessionIndex::from_sections(parse_sections(&text, &path)?))
}

/// Write an index file with the versioned header.
pub fn save(path: &Path, index: &SessionIndex) -> Result<()> {
    let path = index_path(path);
    let header = vec![
        HEADER_TITLE.to_string(),
        format!("# Software version {}", env!("CARGO_PKG_VERSION")),
    ];
    fs::write(&path, render_sections(&header, &index.to_sections()))?;
    Ok(())
}

/// Overwrite the keys given in `partial`, leaving all other keys untouched.
pub fn update(path: &Path, partial: &SessionIndex) -> Result<()> {
    let mut index = load(path)?;
    for (key, entry) in &partial.entries {
        index.entries.entry(key.clone()).or_default().merge(entry);
    }
    save(path, &index)
}

/// Software version that wrote the index, taken from the second line.
pub fn version(path: &Path) -> Result<String> {
    let path = index_path(path);
    let text = read_text(&path)?;
    let line = text.lines().nth(1).unwrap_or("").trim().to_lowercase();
    if line.contains("software version") {
        if let Some(v) = line.split_whitespace().last() {
            return Ok(v.to_string());
        }
    }
    Ok(UNVERSIONED.to_string())
}
