//! Rebuilding the measurements of a saved session.

use std::path::Path;

use super::index::{self, IndexEntry};
use super::path::find_data_path;
use super::{HashPolicy, LoadOptions, SessionWarning};
use crate::config::Configuration;
use crate::data::polygon::{PolygonRegistry, POLYGON_FILE};
use crate::error::{Error, Result};
use crate::measurement::{FileHashes, Measurement, MANUAL_MASK_FILE};

/// Measurements of a session in ordinal order, plus what went wrong along
/// the way without being fatal.
#[derive(Debug)]
pub struct Reconstructed {
    pub measurements: Vec<Measurement>,
    pub warnings: Vec<SessionWarning>,
}

/// Reconstruct all measurements recorded in `index_file`.
///
/// `polygons` is cleared and refilled from the session's polygon file
/// before any measurement is built, since filters refer to polygons by id.
///
/// Entries are resolved in passes: a hierarchy child waits until its parent
/// has been built, wherever the two appear in the file. A pass that resolves
/// nothing while entries remain is a [`Error::CorruptSession`].
pub fn reconstruct(
    index_file: &Path,
    search_path: &Path,
    polygons: &mut PolygonRegistry,
    options: LoadOptions,
) -> Result<Reconstructed> {
    let index_file = index::index_path(index_file);
    let session_dir = index_file.parent().unwrap_or_else(|| Path::new(""));

    polygons.clear();
    let polygon_file = session_dir.join(POLYGON_FILE);
    if polygon_file.exists() {
        polygons.import(&polygon_file)?;
    }

    let index = index::load(&index_file)?;
    let ordered = index.ordered()?;
    let mut slots: Vec<Option<Measurement>> = vec![None; ordered.len()];
    let mut warnings = Vec::new();

    loop {
        let mut progress = false;
        for &(ordinal, key, entry) in &ordered {
            if slots[ordinal - 1].is_some() {
                continue;
            }
            let config_file = session_dir.join(required(entry, key, "config")?);
            let recorded = Configuration::load(&config_file)?;

            let mut mm = if entry.is_hierarchy_child() {
                let parent_id = recorded.hierarchy_parent().ok_or_else(|| {
                    Error::CorruptSession(format!("[{key}] hierarchy child without a parent"))
                })?;
                let parent = slots
                    .iter()
                    .flatten()
                    .find(|mm| mm.identifier() == parent_id);
                match parent {
                    Some(parent) => Measurement::hierarchy_child(parent),
                    // parent not built yet
                    None => continue,
                }
            } else {
                let data_path = find_data_path(entry, search_path, options.missing_files)?;
                let mm = Measurement::from_file(&data_path)?;
                check_hashes(key, entry, &mm, &data_path, options.hash_mismatch, &mut warnings)?;
                mm
            };

            if let Some(id) = entry.get("identifier") {
                mm.set_identifier(id);
            }
            if let Some(title) = entry.get("title") {
                mm.set_title(title);
            }
            mm.config_mut().overwrite(&recorded);

            let mask_file = config_file
                .parent()
                .unwrap_or(session_dir)
                .join(MANUAL_MASK_FILE);
            if mask_file.exists() && !mm.load_manual_mask(&mask_file)? {
                warnings.push(SessionWarning::ManualMaskIgnored {
                    entry: key.to_string(),
                    path: mask_file,
                });
            }
            // children of this measurement are built from its filtered events
            mm.apply_filter(polygons);

            log::debug!("[{key}] resolved as '{}'", mm.identifier());
            slots[ordinal - 1] = Some(mm);
            progress = true;
        }

        if slots.iter().all(Option::is_some) {
            break;
        }
        if !progress {
            let unresolved: Vec<&str> = ordered
                .iter()
                .filter(|(ordinal, _, _)| slots[ordinal - 1].is_none())
                .map(|(_, key, _)| *key)
                .collect();
            return Err(Error::CorruptSession(format!(
                "cannot resolve hierarchy parents of: {}",
                unresolved.join(", ")
            )));
        }
    }

    Ok(Reconstructed {
        measurements: slots.into_iter().flatten().collect(),
        warnings,
    })
}

fn required<'a>(entry: &'a IndexEntry, section: &str, key: &str) -> Result<&'a str> {
    entry
        .get(key)
        .ok_or_else(|| Error::CorruptSession(format!("[{section}] lacks '{key}'")))
}

fn check_hashes(
    key: &str,
    entry: &IndexEntry,
    mm: &Measurement,
    data_path: &Path,
    policy: HashPolicy,
    warnings: &mut Vec<SessionWarning>,
) -> Result<()> {
    let recorded = FileHashes {
        data: entry.get("tdms hash").unwrap_or_default().to_string(),
        camera: entry.get("camera.ini hash").unwrap_or_default().to_string(),
        para: entry.get("para.ini hash").unwrap_or_default().to_string(),
    };
    if mm.hashes() == Some(&recorded) {
        return Ok(());
    }
    match policy {
        HashPolicy::Warn => {
            log::warn!("File hashes don't match for: {}", data_path.display());
            warnings.push(SessionWarning::HashMismatch {
                entry: key.to_string(),
                path: data_path.to_path_buf(),
            });
            Ok(())
        }
        HashPolicy::Error => Err(Error::HashMismatch(data_path.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::config::Setting;
    use crate::data::{Axis, PolygonFilter};
    use crate::measurement::tests::write_measurement;
    use crate::session::dump::dump;
    use crate::session::index::INDEX_FILE;

    fn session_with_child(data_dir: &Path, session: &Path) -> Vec<Measurement> {
        let path = write_measurement(data_dir, "M1", &[10.0, 20.0, 30.0, 40.0]);
        let mut parent = Measurement::from_file(&path).unwrap();
        parent.config_mut().set(Setting::FilterMin(Axis::Area), 15.0);
        parent.config_mut().set(Setting::FilterMax(Axis::Area), 45.0);
        parent.apply_filter(&PolygonRegistry::new());
        let child = Measurement::hierarchy_child(&parent);
        let measurements = vec![parent, child];
        dump(session, &measurements, &PolygonRegistry::new(), session, false).unwrap();
        measurements
    }

    #[test]
    fn restores_measurements_in_ordinal_order() {
        let data_dir = tempfile::tempdir().unwrap();
        let session = tempfile::tempdir().unwrap();
        let saved = session_with_child(data_dir.path(), session.path());

        let mut polygons = PolygonRegistry::new();
        let loaded = reconstruct(
            session.path(),
            session.path(),
            &mut polygons,
            LoadOptions::default(),
        )
        .unwrap();
        assert!(loaded.warnings.is_empty());
        assert_eq!(loaded.measurements.len(), 2);
        let (parent, child) = (&loaded.measurements[0], &loaded.measurements[1]);
        assert_eq!(parent.identifier(), saved[0].identifier());
        assert_eq!(parent.event_count(), 3);
        assert_eq!(child.parent_id(), Some(parent.identifier()));
        assert_eq!(child.data().len(), 3);
        assert_eq!(child.identifier(), saved[1].identifier());
    }

    #[test]
    fn child_listed_before_parent_still_resolves() {
        let data_dir = tempfile::tempdir().unwrap();
        let session = tempfile::tempdir().unwrap();
        let saved = session_with_child(data_dir.path(), session.path());

        // swap ordinals so the child sorts (and resolves) first
        let index_file = session.path().join(INDEX_FILE);
        let text = fs::read_to_string(&index_file).unwrap();
        let text = text
            .replace("[1_M1_data]", "[2_M1_data]")
            .replace("[2_M1_data_child]", "[1_M1_data_child]");
        fs::write(&index_file, text).unwrap();

        let loaded = reconstruct(
            &index_file,
            session.path(),
            &mut PolygonRegistry::new(),
            LoadOptions::default(),
        )
        .unwrap();
        assert_eq!(loaded.measurements[0].identifier(), saved[1].identifier());
        assert_eq!(loaded.measurements[1].identifier(), saved[0].identifier());
        assert!(loaded.measurements[0].is_hierarchy_child());
    }

    #[test]
    fn unknown_parent_is_corrupt() {
        let data_dir = tempfile::tempdir().unwrap();
        let session = tempfile::tempdir().unwrap();
        session_with_child(data_dir.path(), session.path());

        let config = session.path().join("2_M1_data_child").join("config.txt");
        let text = fs::read_to_string(&config).unwrap();
        let text = text
            .lines()
            .map(|l| {
                if l.starts_with("hierarchy parent") {
                    "hierarchy parent = mm-doesnotexist".to_string()
                } else {
                    l.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\r\n");
        fs::write(&config, text).unwrap();

        let err = reconstruct(
            session.path(),
            session.path(),
            &mut PolygonRegistry::new(),
            LoadOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::CorruptSession(_)));
    }

    #[test]
    fn changed_data_warns_or_fails_by_policy() {
        let data_dir = tempfile::tempdir().unwrap();
        let session = tempfile::tempdir().unwrap();
        session_with_child(data_dir.path(), session.path());
        fs::write(
            data_dir.path().join("M1_camera.ini"),
            "[Image]\nFrame Rate = 4000\n",
        )
        .unwrap();

        let loaded = reconstruct(
            session.path(),
            session.path(),
            &mut PolygonRegistry::new(),
            LoadOptions::default(),
        )
        .unwrap();
        assert!(matches!(
            loaded.warnings.as_slice(),
            [SessionWarning::HashMismatch { .. }]
        ));

        let strict = LoadOptions {
            hash_mismatch: HashPolicy::Error,
            ..LoadOptions::default()
        };
        let err = reconstruct(session.path(), session.path(), &mut PolygonRegistry::new(), strict)
            .unwrap_err();
        assert!(matches!(err, Error::HashMismatch(_)));
    }

    #[test]
    fn registry_is_replaced_by_session_polygons() {
        let data_dir = tempfile::tempdir().unwrap();
        let session = tempfile::tempdir().unwrap();
        let path = write_measurement(data_dir.path(), "M1", &[1.0]);
        let mm = Measurement::from_file(&path).unwrap();
        let mut saved = PolygonRegistry::new();
        saved.add(PolygonFilter::new(
            "gate",
            Axis::Area,
            Axis::Defo,
            vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)],
        ));
        dump(session.path(), &[mm], &saved, session.path(), false).unwrap();

        let mut polygons = PolygonRegistry::new();
        polygons.add(PolygonFilter::new("stale", Axis::Area, Axis::Defo, Vec::new()));
        polygons.add(PolygonFilter::new("stale", Axis::Area, Axis::Defo, Vec::new()));
        reconstruct(session.path(), session.path(), &mut polygons, LoadOptions::default())
            .unwrap();
        assert_eq!(polygons.len(), 1);
        assert_eq!(polygons.iter().next().map(|p| p.name.as_str()), Some("gate"));
    }
}
