//! Measurement configuration.
//!
//! A [`Configuration`] maps [`Section`]s to key → [`ConfigValue`] tables.
//! Known keys are described by [`Setting`] (section, key text, declared type);
//! everything else is kept verbatim with a guessed type.
//!
//! Two merge rules exist:
//! * [`Configuration::fill_missing`] – defaults never override what is there.
//! * [`Configuration::overwrite`] – a patch always wins.

pub mod setting;
pub mod value;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub use setting::{Section, Setting};
pub use value::{ConfigValue, ValueKind};

use crate::data::model::Axis;
use crate::error::{Error, Result};
use crate::session::index::{parse_sections, render_sections, Sections};

/// Key → value table of one section.
pub type SectionMap = BTreeMap<String, ConfigValue>;

/// Sentinel stored in `hierarchy parent` for measurements without a parent.
pub const NO_PARENT: &str = "none";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    sections: BTreeMap<Section, SectionMap>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, setting: Setting) -> Option<&ConfigValue> {
        self.get_key(setting.section(), &setting.key())
    }

    pub fn set(&mut self, setting: Setting, value: impl Into<ConfigValue>) {
        self.set_key(setting.section(), &setting.key(), value);
    }

    pub fn contains(&self, setting: Setting) -> bool {
        self.get(setting).is_some()
    }

    pub fn get_key(&self, section: Section, key: &str) -> Option<&ConfigValue> {
        self.sections.get(&section)?.get(key)
    }

    /// Keys are stored lower-case and trimmed.
    pub fn set_key(&mut self, section: Section, key: &str, value: impl Into<ConfigValue>) {
        self.sections
            .entry(section)
            .or_default()
            .insert(normalize_key(key), value.into());
    }

    pub fn remove_key(&mut self, section: Section, key: &str) -> Option<ConfigValue> {
        self.sections.get_mut(&section)?.remove(key)
    }

    pub fn section(&self, section: Section) -> Option<&SectionMap> {
        self.sections.get(&section)
    }

    pub fn sections(&self) -> impl Iterator<Item = (Section, &SectionMap)> {
        self.sections.iter().map(|(s, m)| (*s, m))
    }

    /// Copy every key of `defaults` that is not already present.
    pub fn fill_missing(&mut self, defaults: &Configuration) {
        for (section, values) in &defaults.sections {
            let ours = self.sections.entry(*section).or_default();
            for (key, value) in values {
                ours.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
    }

    /// Copy every key of `patch`, replacing existing values.
    pub fn overwrite(&mut self, patch: &Configuration) {
        for (section, values) in &patch.sections {
            let ours = self.sections.entry(*section).or_default();
            for (key, value) in values {
                ours.insert(key.clone(), value.clone());
            }
        }
    }

    // -- typed accessors --

    fn bool_or(&self, setting: Setting, default: bool) -> bool {
        self.get(setting)
            .and_then(ConfigValue::as_bool)
            .unwrap_or(default)
    }

    fn f64_or(&self, setting: Setting, default: f64) -> f64 {
        self.get(setting)
            .and_then(ConfigValue::as_f64)
            .unwrap_or(default)
    }

    pub fn enable_filters(&self) -> bool {
        self.bool_or(Setting::EnableFilters, true)
    }

    pub fn remove_invalid_events(&self) -> bool {
        self.bool_or(Setting::RemoveInvalidEvents, false)
    }

    /// `limit events`; zero or negative means "no limit".
    pub fn limit_events(&self) -> usize {
        self.get(Setting::LimitEvents)
            .and_then(ConfigValue::as_i64)
            .map_or(0, |n| usize::try_from(n).unwrap_or(0))
    }

    /// Identifier of the parent measurement, if this is a hierarchy child.
    pub fn hierarchy_parent(&self) -> Option<&str> {
        self.get(Setting::HierarchyParent)
            .and_then(ConfigValue::as_str)
            .filter(|p| !p.is_empty() && !p.eq_ignore_ascii_case(NO_PARENT))
    }

    /// Ids of the polygon filters applied to this measurement.
    pub fn polygon_filters(&self) -> Vec<u32> {
        self.get(Setting::PolygonFilters)
            .and_then(ConfigValue::as_list)
            .unwrap_or_default()
            .iter()
            .filter_map(ConfigValue::as_i64)
            .filter_map(|id| u32::try_from(id).ok())
            .collect()
    }

    /// Box filter bounds for `axis`; equal bounds mean "not filtered".
    pub fn filter_range(&self, axis: Axis) -> (f64, f64) {
        (
            self.f64_or(Setting::FilterMin(axis), 0.0),
            self.f64_or(Setting::FilterMax(axis), 0.0),
        )
    }

    pub fn plot_axis(&self, setting: Setting) -> Option<Axis> {
        self.get(setting)?.as_str()?.parse().ok()
    }

    pub fn contour_color(&self) -> Option<Vec<f64>> {
        self.get(Setting::ContourColor)?
            .as_list()?
            .iter()
            .map(ConfigValue::as_f64)
            .collect()
    }

    // -- persistence --

    /// Build from raw sections. Unknown section names go to `fallback`, or
    /// are dropped when there is none.
    pub(crate) fn from_sections(sections: Sections, fallback: Option<Section>) -> Self {
        let mut cfg = Configuration::new();
        for (name, values) in sections {
            let Some(section) = Section::from_name(&name).or(fallback) else {
                log::debug!("ignoring configuration section [{name}]");
                continue;
            };
            for (key, text) in values {
                let key = normalize_key(&key);
                let value = match Setting::kind_of(section, &key) {
                    Some(kind) => ConfigValue::parse(&text, kind),
                    None => ConfigValue::guess(&text),
                };
                cfg.set_key(section, &key, value);
            }
        }
        cfg
    }

    /// Load a configuration file (`config.txt`).
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::format(path, e.to_string()))?;
        Ok(Self::from_sections(parse_sections(&text, path)?, None))
    }

    /// Load an acquisition `.ini` file; sections that are not part of the
    /// schema are folded into `fallback`.
    pub fn load_ini(path: &Path, fallback: Section) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::format(path, e.to_string()))?;
        Ok(Self::from_sections(
            parse_sections(&text, path)?,
            Some(fallback),
        ))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let sections: Sections = self
            .sections
            .iter()
            .map(|(section, values)| {
                let values = values
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_string()))
                    .collect();
                (section.name().to_string(), values)
            })
            .collect();
        fs::write(path, render_sections(&[], &sections))?;
        Ok(())
    }

    /// Built-in defaults every measurement is completed with.
    pub fn baseline() -> Self {
        use Setting::*;
        let mut cfg = Configuration::new();

        cfg.set(EnableFilters, true);
        cfg.set(LimitEvents, 0_i64);
        cfg.set(HierarchyParent, NO_PARENT);
        cfg.set(PolygonFilters, ConfigValue::List(Vec::new()));
        cfg.set(RemoveInvalidEvents, false);
        for axis in Axis::ALL {
            cfg.set(FilterMin(axis), 0.0);
            cfg.set(FilterMax(axis), 0.0);
        }

        cfg.set(AxisX, Axis::Area.name());
        cfg.set(AxisY, Axis::Defo.name());
        cfg.set(ScaleX, "linear");
        cfg.set(ScaleY, "linear");
        cfg.set(ContourPlot, true);
        cfg.set(ScatterPlot, true);
        cfg.set(LegendPlot, true);
        cfg.set(ContourFixScale, false);
        cfg.set(Downsampling, true);
        cfg.set(DownsampleEvents, 5000_i64);
        cfg.set(Rows, 1_i64);
        cfg.set(Columns, 2_i64);
        cfg.set(Kde, "multivariate");
        cfg
    }

    /// [`Configuration::baseline`] overridden by a defaults file in the
    /// configuration format.
    pub fn baseline_with(path: &Path) -> Result<Self> {
        let mut cfg = Self::baseline();
        cfg.overwrite(&Self::load(path)?);
        Ok(cfg)
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}
