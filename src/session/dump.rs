//! Writing an analysis to a session directory.

use std::fs;
use std::path::{Path, PathBuf};

use super::index::{self, entry_key, IndexEntry, SessionIndex, HIERARCHY_CHILD, INDEX_FILE};
use super::path::{absolute, relative_to};
use crate::data::polygon::{PolygonRegistry, POLYGON_FILE};
use crate::error::{Error, Result};
use crate::measurement::{Measurement, Source, MANUAL_MASK_FILE};

const CONFIG_FILE: &str = "config.txt";

/// Write `measurements` to `directory` and return the path of the index
/// file.
///
/// Every measurement gets a `<ordinal>_<name>` directory holding its
/// configuration and manual mask. `rel_path` is the location the recorded
/// `rdir` of each data directory is relative to, normally the directory the
/// session archive will be opened from.
///
/// Copying the data files into the session (`full_output`) is not
/// supported and fails before anything is written. So does a measurement
/// whose title, file name or directory contains `#` or a line break.
pub fn dump(
    directory: &Path,
    measurements: &[Measurement],
    polygons: &PolygonRegistry,
    rel_path: &Path,
    full_output: bool,
) -> Result<PathBuf> {
    if full_output {
        return Err(Error::Unsupported("copying data files into the session"));
    }
    validate(measurements)?;
    fs::create_dir_all(directory)?;

    let mut index = SessionIndex::new();
    for (i, mm) in measurements.iter().enumerate() {
        let (key, mm_dir) = unique_dir(directory, &entry_key(i + 1, mm.name()));
        fs::create_dir(&mm_dir)?;

        let mut entry = IndexEntry::new();
        match mm.source() {
            Source::File { path, hashes } => {
                let (fdir, name) = file_location(path);
                // different drives on Windows have no relative path
                let rdir = relative_to(&fdir, rel_path).unwrap_or_else(|| PathBuf::from("."));
                entry.insert("tdms hash", hashes.data.as_str());
                entry.insert("camera.ini hash", hashes.camera.as_str());
                entry.insert("para.ini hash", hashes.para.as_str());
                entry.insert("name", name);
                entry.insert("fdir", fdir.to_string_lossy());
                entry.insert("rdir", rdir.to_string_lossy());
            }
            Source::HierarchyChild { .. } => {
                entry.insert("special type", HIERARCHY_CHILD);
            }
            Source::Memory => return Err(Error::InvalidMeasurement(mm.title().to_string())),
        }
        entry.insert("title", mm.title());
        entry.insert("identifier", mm.identifier());
        entry.insert("config", format!("{key}/{CONFIG_FILE}"));

        mm.config().save(&mm_dir.join(CONFIG_FILE))?;
        mm.save_manual_mask(&mm_dir.join(MANUAL_MASK_FILE))?;
        log::debug!("wrote [{key}] to {}", mm_dir.display());
        index.insert(key, entry);
    }

    let index_file = directory.join(INDEX_FILE);
    index::save(&index_file, &index)?;

    if !polygons.is_empty() {
        polygons.export(&directory.join(POLYGON_FILE))?;
    }
    Ok(index_file)
}

/// Every measurement must be reloadable: file-backed, or a child whose
/// parent is part of the same session, and described by text that survives
/// the index grammar.
fn validate(measurements: &[Measurement]) -> Result<()> {
    for (i, mm) in measurements.iter().enumerate() {
        match mm.source() {
            Source::File { path, .. } => {
                let (fdir, name) = file_location(path);
                check_text(mm, "file name", &name)?;
                check_text(mm, "directory", &fdir.to_string_lossy())?;
            }
            Source::HierarchyChild { parent } => {
                if !measurements.iter().any(|m| m.identifier() == parent) {
                    return Err(Error::CorruptSession(format!(
                        "parent '{parent}' of '{}' is not part of the session",
                        mm.title()
                    )));
                }
            }
            Source::Memory => return Err(Error::InvalidMeasurement(mm.title().to_string())),
        }
        check_text(mm, "title", mm.title())?;
        check_text(mm, "section name", &entry_key(i + 1, mm.name()))?;
    }
    Ok(())
}

fn check_text(mm: &Measurement, what: &'static str, value: &str) -> Result<()> {
    if value.contains(['#', '\r', '\n']) {
        return Err(Error::Unrepresentable {
            title: mm.title().to_string(),
            what,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Absolute directory and file name of a data file.
fn file_location(path: &Path) -> (PathBuf, String) {
    let fdir = absolute(path.parent().unwrap_or_else(|| Path::new(".")));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    (fdir, name)
}

/// `<directory>/<key>`, with a numeric suffix appended while that exists.
fn unique_dir(directory: &Path, key: &str) -> (String, PathBuf) {
    let mut candidate = key.to_string();
    let mut n = 0;
    while directory.join(&candidate).exists() {
        candidate = format!("{key}{n}");
        n += 1;
    }
    let path = directory.join(&candidate);
    (candidate, path)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::config::Configuration;
    use crate::data::{Axis, EventData};
    use crate::measurement::tests::write_measurement;

    #[test]
    fn writes_entries_configs_and_masks() {
        let data_dir = tempfile::tempdir().unwrap();
        let session = tempfile::tempdir().unwrap();
        let path = write_measurement(data_dir.path(), "M1", &[1.0, 2.0]);
        let parent = Measurement::from_file(&path).unwrap();
        let child = Measurement::hierarchy_child(&parent);
        let measurements = vec![parent, child];

        let index_file = dump(
            session.path(),
            &measurements,
            &PolygonRegistry::new(),
            session.path(),
            false,
        )
        .unwrap();
        assert_eq!(index_file, session.path().join(INDEX_FILE));

        let index = index::load(&index_file).unwrap();
        assert_eq!(index.len(), 2);
        let first = index.get("1_M1_data").unwrap();
        assert_eq!(first.get("name"), Some("M1_data.csv"));
        assert_eq!(
            first.get("tdms hash"),
            Some(measurements[0].hashes().unwrap().data.as_str())
        );
        assert_eq!(first.get("config"), Some("1_M1_data/config.txt"));
        let second = index.get("2_M1_data_child").unwrap();
        assert!(second.is_hierarchy_child());
        assert!(!second.contains("fdir"));
        assert!(session.path().join("2_M1_data_child").join(MANUAL_MASK_FILE).exists());
        // no polygons registered
        assert!(!session.path().join(POLYGON_FILE).exists());
    }

    #[test]
    fn existing_directories_get_a_suffix() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("1_a")).unwrap();
        fs::create_dir(dir.path().join("1_a0")).unwrap();
        let (key, path) = unique_dir(dir.path(), "1_a");
        assert_eq!(key, "1_a1");
        assert_eq!(path, dir.path().join("1_a1"));
    }

    #[test]
    fn rejects_unsaveable_measurements() {
        let dir = tempfile::tempdir().unwrap();
        let data = EventData::from_columns(BTreeMap::from([(Axis::Area, vec![1.0])])).unwrap();
        let mm = Measurement::from_events("mem", data, Configuration::baseline());
        let polygons = PolygonRegistry::new();

        let err = dump(dir.path(), &[mm.clone()], &polygons, dir.path(), false).unwrap_err();
        assert!(matches!(err, Error::InvalidMeasurement(_)));

        let child = Measurement::hierarchy_child(&mm);
        let err = dump(dir.path(), &[child], &polygons, dir.path(), false).unwrap_err();
        assert!(matches!(err, Error::CorruptSession(_)));

        let err = dump(dir.path(), &[], &polygons, dir.path(), true).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
        assert!(!dir.path().join(INDEX_FILE).exists());
    }

    #[test]
    fn rejects_text_the_index_cannot_hold() {
        let data_dir = tempfile::tempdir().unwrap();
        let session = tempfile::tempdir().unwrap();
        let polygons = PolygonRegistry::new();

        let path = write_measurement(data_dir.path(), "run#2", &[1.0, 2.0]);
        let hashed = Measurement::from_file(&path).unwrap();
        let err = dump(session.path(), &[hashed], &polygons, session.path(), false).unwrap_err();
        assert!(matches!(err, Error::Unrepresentable { what: "file name", .. }));

        let path = write_measurement(data_dir.path(), "M1", &[1.0, 2.0]);
        let mut titled = Measurement::from_file(&path).unwrap();
        titled.set_title("Sample #3 control");
        let err = dump(session.path(), &[titled.clone()], &polygons, session.path(), false)
            .unwrap_err();
        assert!(matches!(err, Error::Unrepresentable { what: "title", .. }));

        titled.set_title("two\nlines");
        assert!(dump(session.path(), &[titled], &polygons, session.path(), false).is_err());
        // nothing was written
        assert_eq!(fs::read_dir(session.path()).unwrap().count(), 0);
    }
}
