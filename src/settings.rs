//! Application settings (`shapeout.toml`).
//!
//! ```toml
//! [session]
//! missing_files = "warn"      # or "error"
//! hash_mismatch = "warn"      # or "error"
//! search_path = "."
//!
//! [analysis]
//! per_measurement_keys = ["contour color", "hierarchy parent"]
//! contour_accuracy_points = 70
//! defaults_file = "defaults.cfg"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::session::{HashPolicy, LoadOptions, MissingFilePolicy};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub session: SessionSettings,
    pub analysis: AnalysisSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub missing_files: MissingFilePolicy,
    pub hash_mismatch: HashPolicy,
    /// Where to look for data files of sessions that were moved.
    pub search_path: PathBuf,
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            missing_files: MissingFilePolicy::default(),
            hash_mismatch: HashPolicy::default(),
            search_path: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Plotting/filtering keys that bulk updates never touch.
    pub per_measurement_keys: Vec<String>,
    /// Number of segments each axis is split into for contour accuracies.
    pub contour_accuracy_points: usize,
    /// Configuration file overriding the built-in defaults.
    pub defaults_file: Option<PathBuf>,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        AnalysisSettings {
            per_measurement_keys: vec!["contour color".into(), "hierarchy parent".into()],
            contour_accuracy_points: 70,
            defaults_file: None,
        }
    }
}

impl Settings {
    /// Read `path`; a file that does not exist yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("{} not found, using default settings", path.display());
            return Ok(Settings::default());
        }
        let text = fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|source| Error::Settings {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            missing_files: self.session.missing_files,
            hash_mismatch: self.session.hash_mismatch,
        }
    }
}

impl AnalysisSettings {
    /// The defaults every measurement is completed with.
    pub fn baseline(&self) -> Result<Configuration> {
        match &self.defaults_file {
            Some(path) => Configuration::baseline_with(path),
            None => Ok(Configuration::baseline()),
        }
    }
}
