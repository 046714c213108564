//! A single measurement: its events, its file identity, its configuration
//! and its current filter state.

use std::fs::File;
use std::path::{Path, PathBuf};

use ndarray::Array1;
use sha2::{Digest, Sha256};

use crate::config::{Configuration, Section, Setting};
use crate::data::filter::compute_mask;
use crate::data::loader;
use crate::data::{EventData, PolygonRegistry};
use crate::error::{Error, Result};

/// File name of the persisted manual exclusion mask.
pub const MANUAL_MASK_FILE: &str = "_filter_manual.npy";

/// Content hashes of the three files backing a measurement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHashes {
    pub data: String,
    pub camera: String,
    pub para: String,
}

impl FileHashes {
    /// Hash the data file and its `_camera.ini` / `_para.ini` companions.
    pub fn compute(data_path: &Path) -> Result<Self> {
        let (camera, para) = companion_paths(data_path);
        Ok(FileHashes {
            data: hash_file(data_path)?,
            camera: hash_file(&camera)?,
            para: hash_file(&para)?,
        })
    }
}

/// Where a measurement's events come from.
#[derive(Debug, Clone)]
pub enum Source {
    /// Loaded from a data file.
    File { path: PathBuf, hashes: FileHashes },
    /// The filtered events of the measurement with this identifier.
    HierarchyChild { parent: String },
    /// Handed over in memory; cannot be written to a session.
    Memory,
}

#[derive(Debug, Clone)]
pub struct Measurement {
    identifier: String,
    name: String,
    title: String,
    source: Source,
    config: Configuration,
    data: EventData,
    /// `true` for events the user did not exclude.
    manual: Vec<bool>,
    /// Result of the last filter recomputation.
    filter: Vec<bool>,
    /// Parent filter the events of a hierarchy child were taken from.
    parent_filter: Vec<bool>,
}

impl Measurement {
    /// Load a measurement from its data file. The `<stem>_camera.ini` and
    /// `<stem>_para.ini` companions must exist next to it.
    pub fn from_file(path: &Path) -> Result<Self> {
        let (camera, para) = companion_paths(path);
        for p in [path, camera.as_path(), para.as_path()] {
            if !p.exists() {
                return Err(Error::FileNotFound(p.to_path_buf()));
            }
        }

        let data = loader::load_file(path).map_err(|e| Error::Data {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        let hashes = FileHashes::compute(path)?;

        let mut config = Configuration::load_ini(&para, Section::General)?;
        config.overwrite(&Configuration::load_ini(&camera, Section::Image)?);

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        log::debug!("loaded {} events from {}", data.len(), path.display());

        let mut mm = Measurement::new(identifier_from_hashes(&hashes), &name, data, config);
        mm.source = Source::File {
            path: path.to_path_buf(),
            hashes,
        };
        Ok(mm)
    }

    /// Wrap events that do not come from a file.
    pub fn from_events(name: &str, data: EventData, config: Configuration) -> Self {
        Measurement::new(new_identifier("mm"), name, data, config)
    }

    /// A measurement made of the events currently passing `parent`'s
    /// filters. Plotting settings are inherited.
    pub fn hierarchy_child(parent: &Measurement) -> Self {
        let mut config = Configuration::new();
        if let Some(plotting) = parent.config.section(Section::Plotting) {
            for (key, value) in plotting {
                config.set_key(Section::Plotting, key, value.clone());
            }
        }
        config.remove_key(Section::Plotting, &Setting::ContourColor.key());
        config.set(Setting::HierarchyParent, parent.identifier.as_str());

        let mut mm = Measurement::new(
            new_identifier("child"),
            &format!("{}_child", parent.name),
            parent.filtered_events(),
            config,
        );
        mm.title = format!("{}_child", parent.title);
        mm.parent_filter = parent.filter.clone();
        mm.source = Source::HierarchyChild {
            parent: parent.identifier.clone(),
        };
        mm
    }

    fn new(identifier: String, name: &str, data: EventData, config: Configuration) -> Self {
        let n = data.len();
        Measurement {
            identifier,
            name: name.to_string(),
            title: name.to_string(),
            source: Source::Memory,
            config,
            data,
            manual: vec![true; n],
            filter: vec![true; n],
            parent_filter: Vec::new(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub(crate) fn set_identifier(&mut self, identifier: &str) {
        self.identifier = identifier.to_string();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn data_path(&self) -> Option<&Path> {
        match &self.source {
            Source::File { path, .. } => Some(path),
            _ => None,
        }
    }

    pub fn hashes(&self) -> Option<&FileHashes> {
        match &self.source {
            Source::File { hashes, .. } => Some(hashes),
            _ => None,
        }
    }

    /// Identifier of the parent, for hierarchy children.
    pub fn parent_id(&self) -> Option<&str> {
        match &self.source {
            Source::HierarchyChild { parent } => Some(parent),
            _ => None,
        }
    }

    pub fn is_hierarchy_child(&self) -> bool {
        matches!(self.source, Source::HierarchyChild { .. })
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Configuration changes go through the analysis so that all
    /// measurements stay consistent.
    pub(crate) fn config_mut(&mut self) -> &mut Configuration {
        &mut self.config
    }

    /// All events, regardless of filters.
    pub fn data(&self) -> &EventData {
        &self.data
    }

    /// Inclusion mask from the last filter recomputation.
    pub fn filter(&self) -> &[bool] {
        &self.filter
    }

    /// Number of events passing the filters.
    pub fn event_count(&self) -> usize {
        self.filter.iter().filter(|f| **f).count()
    }

    pub fn filtered_events(&self) -> EventData {
        self.data.select(&self.filter)
    }

    pub fn manual_mask(&self) -> &[bool] {
        &self.manual
    }

    /// Exclude (or re-include) a single event by hand.
    pub fn set_manually_excluded(&mut self, event: usize, excluded: bool) {
        if let Some(m) = self.manual.get_mut(event) {
            *m = !excluded;
        }
    }

    /// Replace the manual mask; rejected (returning `false`) when its length
    /// does not match the number of events.
    pub fn set_manual_mask(&mut self, mask: Vec<bool>) -> bool {
        if mask.len() != self.data.len() {
            return false;
        }
        self.manual = mask;
        true
    }

    /// Recompute the inclusion mask from the configuration.
    pub fn apply_filter(&mut self, polygons: &PolygonRegistry) {
        self.filter = compute_mask(&self.data, &self.config, &self.manual, polygons);
    }

    /// Take over the currently filtered events of the parent. The manual
    /// mask only survives when the parent's filter selects the same events
    /// as before; otherwise it would exclude different events.
    pub(crate) fn replace_events(&mut self, data: EventData, parent_filter: &[bool]) {
        let n = data.len();
        if self.parent_filter != parent_filter || self.manual.len() != n {
            self.manual = vec![true; n];
            self.filter = vec![true; n];
            self.parent_filter = parent_filter.to_vec();
        }
        self.data = data;
    }

    /// Read a persisted manual mask. A mask of the wrong length is ignored
    /// with a warning and `Ok(false)`.
    pub fn load_manual_mask(&mut self, path: &Path) -> Result<bool> {
        let arr: Array1<bool> = ndarray_npy::read_npy(path).map_err(|source| Error::ReadMask {
            path: path.to_path_buf(),
            source,
        })?;
        let mask: Vec<bool> = arr.iter().copied().collect();
        let len = mask.len();
        if !self.set_manual_mask(mask) {
            log::warn!(
                "{}: manual mask has {len} entries, '{}' has {} events; ignoring it",
                path.display(),
                self.title,
                self.data.len()
            );
            return Ok(false);
        }
        Ok(true)
    }

    pub fn save_manual_mask(&self, path: &Path) -> Result<()> {
        let arr = Array1::from(self.manual.clone());
        ndarray_npy::write_npy(path, &arr).map_err(|source| Error::WriteMask {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// `<dir>/M1_data.csv` → (`<dir>/M1_camera.ini`, `<dir>/M1_para.ini`).
pub fn companion_paths(data_path: &Path) -> (PathBuf, PathBuf) {
    let dir = data_path.parent().unwrap_or_else(|| Path::new(""));
    let file_name = data_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = file_name.split('_').next().unwrap_or(&file_name);
    (
        dir.join(format!("{stem}_camera.ini")),
        dir.join(format!("{stem}_para.ini")),
    )
}

/// SHA-256 of a file's contents as lowercase hex.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn identifier_from_hashes(hashes: &FileHashes) -> String {
    let mut hasher = Sha256::new();
    for h in [&hashes.data, &hashes.camera, &hashes.para] {
        hasher.update(h.as_bytes());
    }
    let digest = format!("{:x}", hasher.finalize());
    format!("mm-{}", &digest[..16])
}

fn new_identifier(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &id[..16])
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::BTreeMap;
    use std::fs;

    use super::*;
    use crate::data::Axis;

    /// Write `<dir>/<stem>_data.csv` plus ini companions; returns the data path.
    pub(crate) fn write_measurement(dir: &Path, stem: &str, areas: &[f64]) -> PathBuf {
        let mut csv = String::from("area,defo,brightness\n");
        for (i, a) in areas.iter().enumerate() {
            csv.push_str(&format!("{a},{},0\n", 0.01 * (i + 1) as f64));
        }
        let path = dir.join(format!("{stem}_data.csv"));
        fs::write(&path, csv).unwrap();
        fs::write(dir.join(format!("{stem}_camera.ini")), "[Image]\nFrame Rate = 2000\n").unwrap();
        fs::write(
            dir.join(format!("{stem}_para.ini")),
            "[General]\nFlow Rate [ul/s] = 0.04\nRegion = Channel\n",
        )
        .unwrap();
        path
    }

    #[test]
    fn from_file_reads_data_ini_and_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_measurement(dir.path(), "M1", &[100.0, 200.0, 300.0]);
        let mm = Measurement::from_file(&path).unwrap();

        assert_eq!(mm.name(), "M1_data");
        assert_eq!(mm.data().len(), 3);
        assert_eq!(mm.event_count(), 3);
        assert!(mm.identifier().starts_with("mm-"));
        assert_eq!(
            mm.config().get_key(Section::Image, "frame rate").and_then(|v| v.as_f64()),
            Some(2000.0)
        );
        let hashes = mm.hashes().unwrap();
        assert_eq!(hashes.data.len(), 64);
        assert_eq!(hashes, &FileHashes::compute(&path).unwrap());

        // identity follows content
        let again = Measurement::from_file(&path).unwrap();
        assert_eq!(again.identifier(), mm.identifier());
    }

    #[test]
    fn missing_companion_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_measurement(dir.path(), "M1", &[1.0]);
        fs::remove_file(dir.path().join("M1_para.ini")).unwrap();
        assert!(matches!(
            Measurement::from_file(&path),
            Err(Error::FileNotFound(_))
        ));
    }

    #[test]
    fn child_sees_filtered_parent_events() {
        let data = EventData::from_columns(BTreeMap::from([(
            Axis::Area,
            vec![10.0, 20.0, 30.0, 40.0],
        )]))
        .unwrap();
        let mut cfg = Configuration::baseline();
        cfg.set(Setting::FilterMin(Axis::Area), 15.0);
        cfg.set(Setting::FilterMax(Axis::Area), 35.0);
        let mut parent = Measurement::from_events("M1", data, cfg);
        let polygons = PolygonRegistry::new();
        parent.apply_filter(&polygons);
        assert_eq!(parent.event_count(), 2);

        let mut child = Measurement::hierarchy_child(&parent);
        assert_eq!(child.parent_id(), Some(parent.identifier()));
        assert_eq!(child.config().hierarchy_parent(), Some(parent.identifier()));
        assert_eq!(child.data().column(Axis::Area), Some(&[20.0, 30.0][..]));

        parent.config_mut().set(Setting::FilterMax(Axis::Area), 45.0);
        parent.apply_filter(&polygons);
        child.replace_events(parent.filtered_events(), parent.filter());
        assert_eq!(child.data().len(), 3);
        assert_eq!(child.manual_mask().len(), 3);
    }

    #[test]
    fn child_mask_resets_when_parent_selects_other_events() {
        let data = EventData::from_columns(BTreeMap::from([(
            Axis::Area,
            vec![10.0, 20.0, 30.0, 40.0],
        )]))
        .unwrap();
        let mut cfg = Configuration::baseline();
        cfg.set(Setting::FilterMin(Axis::Area), 15.0);
        cfg.set(Setting::FilterMax(Axis::Area), 35.0);
        let mut parent = Measurement::from_events("M1", data, cfg);
        let polygons = PolygonRegistry::new();
        parent.apply_filter(&polygons);

        let mut child = Measurement::hierarchy_child(&parent);
        child.set_manually_excluded(0, true);

        // same selection: the exclusion stays
        parent.apply_filter(&polygons);
        child.replace_events(parent.filtered_events(), parent.filter());
        assert_eq!(child.manual_mask(), &[false, true]);

        // [20, 30] -> [30, 40]: same count, other events
        parent.config_mut().set(Setting::FilterMin(Axis::Area), 25.0);
        parent.config_mut().set(Setting::FilterMax(Axis::Area), 45.0);
        parent.apply_filter(&polygons);
        assert_eq!(parent.event_count(), 2);
        child.replace_events(parent.filtered_events(), parent.filter());
        assert_eq!(child.data().column(Axis::Area), Some(&[30.0, 40.0][..]));
        assert_eq!(child.manual_mask(), &[true, true]);
        child.apply_filter(&polygons);
        assert_eq!(child.event_count(), 2);
    }

    #[test]
    fn manual_mask_persists_as_npy() {
        let dir = tempfile::tempdir().unwrap();
        let data =
            EventData::from_columns(BTreeMap::from([(Axis::Area, vec![1.0, 2.0, 3.0])])).unwrap();
        let mut mm = Measurement::from_events("M1", data.clone(), Configuration::baseline());
        mm.set_manually_excluded(1, true);
        let path = dir.path().join(MANUAL_MASK_FILE);
        mm.save_manual_mask(&path).unwrap();

        let mut other = Measurement::from_events("M1", data, Configuration::baseline());
        assert!(other.load_manual_mask(&path).unwrap());
        assert_eq!(other.manual_mask(), &[true, false, true]);
        other.apply_filter(&PolygonRegistry::new());
        assert_eq!(other.event_count(), 2);

        let short = EventData::from_columns(BTreeMap::from([(Axis::Area, vec![1.0])])).unwrap();
        let mut wrong = Measurement::from_events("M2", short, Configuration::baseline());
        assert!(!wrong.load_manual_mask(&path).unwrap());
    }
}
