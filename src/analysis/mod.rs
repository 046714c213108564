//! The analysis: an ordered set of measurements kept in a consistent
//! configuration.
//!
//! Measurement configurations are only changed through [`Analysis`], so
//! that bulk updates, filter recomputation and hierarchy children stay in
//! step with each other.

pub mod aggregate;
pub mod events;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use palette::Srgba;

use crate::color;
use crate::config::{ConfigValue, Configuration, Section, SectionMap, Setting};
use crate::data::{Axis, PolygonFilter, PolygonRegistry};
use crate::error::Result;
use crate::measurement::Measurement;
use crate::session::{self, LoadOptions, SessionWarning};
use crate::settings::AnalysisSettings;

use events::Observers;
pub use events::{MeasurementRemoved, SubscriptionId};

// ---------------------------------------------------------------------------
// Helper types
// ---------------------------------------------------------------------------

/// A bulk change to the `filtering` and `plotting` sections of every
/// measurement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    config: Configuration,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, setting: Setting, value: impl Into<ConfigValue>) -> Self {
        self.config.set(setting, value);
        self
    }

    /// Set a raw key. Only `filtering` and `plotting` can be patched; other
    /// sections are ignored.
    pub fn set_key(mut self, section: Section, key: &str, value: impl Into<ConfigValue>) -> Self {
        match section {
            Section::Filtering | Section::Plotting => self.config.set_key(section, key, value),
            _ => log::warn!("[{section}] cannot be changed for all measurements, ignoring '{key}'"),
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.config.sections().all(|(_, values)| values.is_empty())
    }
}

/// Plot grid layout of a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlotGeometry {
    pub rows: usize,
    pub columns: usize,
    pub contour_plot: bool,
    pub legend_plot: bool,
}

/// Output of [`Analysis::statistics_basic`]: one row per measurement,
/// starting with its title.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsTable {
    pub header: Vec<String>,
    pub rows: Vec<(String, Vec<f64>)>,
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Analysis {
    measurements: Vec<Measurement>,
    polygons: PolygonRegistry,
    /// Defaults every measurement is completed with.
    baseline: Configuration,
    /// Keys that [`Analysis::set_parameters`] never broadcasts.
    per_measurement_keys: Vec<String>,
    contour_accuracy_points: usize,
    observers: Observers,
}

impl Default for Analysis {
    fn default() -> Self {
        Self::from_parts(&AnalysisSettings::default(), Configuration::baseline())
    }
}

impl Analysis {
    /// An empty analysis with the built-in defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty analysis configured by application settings.
    pub fn with_settings(settings: &AnalysisSettings) -> Result<Self> {
        Ok(Self::from_parts(settings, settings.baseline()?))
    }

    fn from_parts(settings: &AnalysisSettings, baseline: Configuration) -> Self {
        Analysis {
            measurements: Vec::new(),
            polygons: PolygonRegistry::new(),
            baseline,
            per_measurement_keys: settings
                .per_measurement_keys
                .iter()
                .map(|k| k.trim().to_lowercase())
                .collect(),
            contour_accuracy_points: settings.contour_accuracy_points,
            observers: Observers::default(),
        }
    }

    /// A new analysis of the given data files.
    pub fn from_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut analysis = Self::new();
        analysis.load_files(paths)?;
        Ok(analysis)
    }

    /// Append measurements loaded from data files.
    pub fn load_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<()> {
        let loaded = paths
            .iter()
            .map(|p| Measurement::from_file(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        for mut mm in loaded {
            self.claim_identifier(&mut mm);
            self.measurements.push(mm);
        }
        self.complete_config();
        self.apply_filters();
        Ok(())
    }

    /// Reconstruct a saved session with the built-in defaults.
    pub fn open_session(
        index_file: &Path,
        search_path: &Path,
        options: LoadOptions,
    ) -> Result<(Self, Vec<SessionWarning>)> {
        let mut analysis = Self::new();
        let warnings = analysis.load_session(index_file, search_path, options)?;
        Ok((analysis, warnings))
    }

    /// Replace all measurements and polygon filters with those of a saved
    /// session. On error the analysis is left unchanged.
    pub fn load_session(
        &mut self,
        index_file: &Path,
        search_path: &Path,
        options: LoadOptions,
    ) -> Result<Vec<SessionWarning>> {
        let mut polygons = PolygonRegistry::new();
        let restored = session::load::reconstruct(index_file, search_path, &mut polygons, options)?;
        for warning in &restored.warnings {
            log::warn!("{warning}");
        }

        self.clear();
        self.polygons = polygons;
        self.measurements = restored.measurements;
        self.complete_config();
        self.apply_filters();
        Ok(restored.warnings)
    }

    /// Write the analysis to a session directory. See
    /// [`session::dump::dump`].
    pub fn dump(&self, directory: &Path, rel_path: &Path, full_output: bool) -> Result<PathBuf> {
        session::dump::dump(
            directory,
            &self.measurements,
            &self.polygons,
            rel_path,
            full_output,
        )
    }

    // -- accessors --

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    pub fn measurement(&self, index: usize) -> Option<&Measurement> {
        self.measurements.get(index)
    }

    /// Index of the measurement with this identifier.
    pub fn position(&self, identifier: &str) -> Option<usize> {
        self.measurements
            .iter()
            .position(|mm| mm.identifier() == identifier)
    }

    pub fn polygons(&self) -> &PolygonRegistry {
        &self.polygons
    }

    pub fn baseline(&self) -> &Configuration {
        &self.baseline
    }

    pub fn contour_accuracy_points(&self) -> usize {
        self.contour_accuracy_points
    }

    pub fn names(&self) -> Vec<&str> {
        self.measurements.iter().map(Measurement::name).collect()
    }

    pub fn titles(&self) -> Vec<&str> {
        self.measurements.iter().map(Measurement::title).collect()
    }

    /// Data file of every measurement (`None` for hierarchy children).
    pub fn data_paths(&self) -> Vec<Option<&Path>> {
        self.measurements.iter().map(Measurement::data_path).collect()
    }

    fn configs(&self) -> Vec<&Configuration> {
        self.measurements.iter().map(Measurement::config).collect()
    }

    // -- configuration --

    /// Fill in defaults without overriding anything a measurement already
    /// has: the baseline, contour/KDE accuracies of a tenth of the range of
    /// every recorded axis, and zero plot bounds.
    pub fn complete_config(&mut self) {
        for mm in &mut self.measurements {
            let accuracies: Vec<(Axis, f64)> = Axis::ALL
                .into_iter()
                .filter(|axis| mm.data().has_values(*axis))
                .filter_map(|axis| {
                    let (lo, hi) = mm.data().min_max(axis)?;
                    Some((axis, (hi - lo) / 10.0))
                })
                .collect();

            let cfg = mm.config_mut();
            cfg.fill_missing(&self.baseline);
            for (axis, accuracy) in accuracies {
                for setting in [Setting::ContourAccuracy(axis), Setting::KdeMultivariate(axis)] {
                    if !cfg.contains(setting) {
                        cfg.set(setting, accuracy);
                    }
                }
            }
            for axis in Axis::ALL {
                for setting in [Setting::PlotMin(axis), Setting::PlotMax(axis)] {
                    if !cfg.contains(setting) {
                        cfg.set(setting, 0.0);
                    }
                }
            }
        }
    }

    /// Apply `patch` to every measurement (the patch wins) and recompute
    /// all filters.
    ///
    /// Per-measurement keys are dropped from the patch. A logarithmic x or y
    /// scale switches contour plots off.
    pub fn set_parameters(&mut self, patch: &Patch) {
        let mut update = Configuration::new();
        for section in [Section::Filtering, Section::Plotting] {
            let Some(values) = patch.config.section(section) else {
                continue;
            };
            for (key, value) in values {
                if self.per_measurement_keys.contains(key) {
                    log::debug!("'{key}' is set per measurement, not applying it to all");
                    continue;
                }
                update.set_key(section, key, value.clone());
            }
        }

        let log_scale = [Setting::ScaleX, Setting::ScaleY].into_iter().any(|s| {
            update
                .get(s)
                .and_then(ConfigValue::as_str)
                .is_some_and(|v| v.eq_ignore_ascii_case("log"))
        });
        if log_scale {
            log::warn!("Disabling contour plot, contours cannot be computed on a log scale");
            update.set(Setting::ContourPlot, false);
        }

        for mm in &mut self.measurements {
            mm.config_mut().overwrite(&update);
        }
        self.apply_filters();
    }

    /// Recompute the filters of every measurement. Parents go first so that
    /// hierarchy children pick up their parent's new filtered events.
    pub fn apply_filters(&mut self) {
        for i in self.dependency_order() {
            let parent = self.measurements[i]
                .parent_id()
                .and_then(|id| self.position(id));
            if let Some(parent) = parent {
                let parent = &self.measurements[parent];
                let (events, filter) = (parent.filtered_events(), parent.filter().to_vec());
                self.measurements[i].replace_events(events, &filter);
            }
            self.measurements[i].apply_filter(&self.polygons);
        }
    }

    fn dependency_order(&self) -> Vec<usize> {
        let n = self.measurements.len();
        let mut done = vec![false; n];
        let mut order = Vec::with_capacity(n);
        while order.len() < n {
            let before = order.len();
            for i in 0..n {
                if done[i] {
                    continue;
                }
                let ready = match self.measurements[i].parent_id() {
                    None => true,
                    Some(id) => self.position(id).map_or(true, |p| done[p]),
                };
                if ready {
                    done[i] = true;
                    order.push(i);
                }
            }
            if order.len() == before {
                log::warn!("circular hierarchy parents, filtering the rest in list order");
                order.extend((0..n).filter(|i| !done[*i]));
            }
        }
        order
    }

    pub fn common_parameters(&self, section: Section) -> SectionMap {
        aggregate::common_parameters(&self.configs(), section)
    }

    pub fn uncommon_parameters(&self, section: Section) -> BTreeMap<String, Vec<Option<ConfigValue>>> {
        aggregate::uncommon_parameters(&self.configs(), section)
    }

    pub fn usable_axes(&self) -> Vec<Axis> {
        aggregate::usable_axes(&self.measurements)
    }

    pub fn unusable_axes(&self) -> Vec<Axis> {
        aggregate::unusable_axes(&self.measurements)
    }

    /// One section of measurement `mid` as shown to users: ignored axes and
    /// the bounds of unusable axes are left out.
    pub fn get_parameters(&self, section: Section, mid: usize) -> Option<SectionMap> {
        let mut conf = self
            .measurements
            .get(mid)?
            .config()
            .section(section)
            .cloned()
            .unwrap_or_default();

        let ignored: Vec<&str> = Axis::ALL
            .into_iter()
            .filter(|a| a.is_ignored())
            .map(Axis::name)
            .collect();
        conf.retain(|key, _| !ignored.iter().any(|ax| key.starts_with(ax) || key.ends_with(ax)));

        let unusable = self.unusable_axes();
        conf.retain(|key, _| {
            let axis = key
                .strip_suffix(" min")
                .or_else(|| key.strip_suffix(" max"))
                .and_then(|a| a.parse::<Axis>().ok());
            !axis.is_some_and(|a| unusable.contains(&a))
        });
        Some(conf)
    }

    pub fn plot_axes(&self, mid: usize) -> Option<(Axis, Axis)> {
        let cfg = self.measurements.get(mid)?.config();
        Some((cfg.plot_axis(Setting::AxisX)?, cfg.plot_axis(Setting::AxisY)?))
    }

    pub fn plot_geometry(&self, mid: usize) -> Option<PlotGeometry> {
        let cfg = self.measurements.get(mid)?.config();
        let count = |s| {
            cfg.get(s)
                .and_then(ConfigValue::as_i64)
                .and_then(|n| usize::try_from(n).ok())
        };
        let flag = |s| cfg.get(s).and_then(ConfigValue::as_bool);
        Some(PlotGeometry {
            rows: count(Setting::Rows)?,
            columns: count(Setting::Columns)?,
            contour_plot: flag(Setting::ContourPlot)?,
            legend_plot: flag(Setting::LegendPlot)?,
        })
    }

    // -- contour colours and accuracies --

    /// Give every measurement its own contour colour and return the colours
    /// in measurement order.
    ///
    /// `explicit` is used when it has a colour for every measurement,
    /// otherwise colours are spread over the dark-jet ramp. Nothing is
    /// assigned (and nothing returned) for fewer than two measurements.
    pub fn assign_contour_colors(&mut self, explicit: Option<&[Srgba<f64>]>) -> Vec<Srgba<f64>> {
        let n = self.measurements.len();
        if n < 2 {
            return Vec::new();
        }
        let colors = match explicit {
            Some(colors) if colors.len() >= n => colors[..n].to_vec(),
            _ => color::generate_palette(n),
        };
        for (mm, c) in self.measurements.iter_mut().zip(&colors) {
            mm.config_mut().set(Setting::ContourColor, color::to_config(*c));
        }
        colors
    }

    pub fn contour_colors(&self) -> Vec<Option<Srgba<f64>>> {
        self.measurements
            .iter()
            .map(|mm| {
                mm.config()
                    .contour_color()
                    .and_then(|c| color::from_components(&c))
            })
            .collect()
    }

    /// Divide every axis into `points` segments, using the range averaged
    /// over all measurements, and store the segment length (two significant
    /// digits) as contour accuracy and twice that as KDE bandwidth.
    ///
    /// Does nothing with fewer than two measurements or when the first one
    /// has `contour fix scale` set.
    pub fn set_contour_accuracies(&mut self, points: usize) {
        let Some(first) = self.measurements.first() else {
            return;
        };
        let fixed = first
            .config()
            .get(Setting::ContourFixScale)
            .and_then(ConfigValue::as_bool)
            .unwrap_or(false);
        if fixed || self.measurements.len() < 2 || points == 0 {
            return;
        }

        let n = self.measurements.len() as f64;
        for axis in Axis::ALL {
            let (lo, hi) = self
                .measurements
                .iter()
                .map(|mm| mm.data().min_max(axis).unwrap_or((0.0, 0.0)))
                .fold((0.0, 0.0), |(lo, hi), (l, h)| (lo + l, hi + h));
            let accuracy = (hi - lo) / n / points as f64;
            let contour = two_significant_digits(accuracy);
            let kde = two_significant_digits(2.0 * accuracy);
            for mm in &mut self.measurements {
                let cfg = mm.config_mut();
                cfg.set(Setting::ContourAccuracy(axis), contour);
                cfg.set(Setting::KdeMultivariate(axis), kde);
            }
        }
    }

    /// Limit every measurement to the smallest filtered event count and
    /// return that count.
    pub fn force_same_data_size(&mut self) -> usize {
        self.set_parameters(&Patch::new().set(Setting::LimitEvents, 0_i64));
        let size = self
            .measurements
            .iter()
            .map(Measurement::event_count)
            .min()
            .unwrap_or(0);
        self.set_parameters(&Patch::new().set(Setting::LimitEvents, size));
        size
    }

    // -- statistics --

    /// Basic statistics of every measurement along its plot axes.
    ///
    /// # Panics
    /// When measurements end up with different columns, which means their
    /// plot axes were not kept in sync.
    pub fn statistics_basic(&self) -> StatisticsTable {
        let mut header: Option<Vec<String>> = None;
        let mut rows = Vec::with_capacity(self.measurements.len());
        for mm in &self.measurements {
            let axes: Vec<Axis> = [Setting::AxisX, Setting::AxisY]
                .into_iter()
                .filter_map(|s| mm.config().plot_axis(s))
                .collect();
            let (h, values) = aggregate::basic_statistics(mm, &axes);
            match &header {
                Some(head) => assert_eq!(head, &h, "'{}' has wrong columns!", mm.title()),
                None => header = Some(h),
            }
            rows.push((mm.title().to_string(), values));
        }

        let mut full = vec!["Data set".to_string()];
        full.extend(header.unwrap_or_default());
        StatisticsTable { header: full, rows }
    }

    // -- measurements --

    /// Append a measurement, complete its configuration and filter it.
    /// Returns its index.
    pub fn add_measurement(&mut self, mut mm: Measurement) -> usize {
        self.claim_identifier(&mut mm);
        self.measurements.push(mm);
        self.complete_config();
        self.apply_filters();
        self.measurements.len() - 1
    }

    /// Identifiers are derived from file contents, so the same file loaded
    /// twice would share one. Later copies get a numeric suffix.
    fn claim_identifier(&self, mm: &mut Measurement) {
        if self.position(mm.identifier()).is_none() {
            return;
        }
        let base = mm.identifier().to_string();
        let unique = (2..)
            .map(|n| format!("{base}-{n}"))
            .find(|id| self.position(id).is_none())
            .unwrap_or(base);
        log::debug!("'{}' is already loaded, identifying it as '{unique}'", mm.title());
        mm.set_identifier(&unique);
    }

    /// Append a hierarchy child of the measurement at `parent`.
    pub fn add_hierarchy_child(&mut self, parent: usize) -> Option<usize> {
        let child = Measurement::hierarchy_child(self.measurements.get(parent)?);
        Some(self.add_measurement(child))
    }

    pub fn set_title(&mut self, index: usize, title: &str) -> bool {
        match self.measurements.get_mut(index) {
            Some(mm) => {
                mm.set_title(title);
                true
            }
            None => false,
        }
    }

    /// Exclude (or re-include) one event of one measurement by hand.
    pub fn set_manually_excluded(&mut self, index: usize, event: usize, excluded: bool) -> bool {
        let Some(mm) = self.measurements.get_mut(index) else {
            return false;
        };
        mm.set_manually_excluded(event, excluded);
        self.apply_filters();
        true
    }

    /// Remove the measurement at `index` together with its hierarchy
    /// descendants, notifying subscribers about each.
    pub fn remove(&mut self, index: usize) -> Vec<Measurement> {
        if index >= self.measurements.len() {
            return Vec::new();
        }
        let mut doomed = BTreeSet::from([index]);
        loop {
            let more: Vec<usize> = (0..self.measurements.len())
                .filter(|i| !doomed.contains(i))
                .filter(|&i| {
                    self.measurements[i].parent_id().is_some_and(|p| {
                        doomed
                            .iter()
                            .any(|&d| self.measurements[d].identifier() == p)
                    })
                })
                .collect();
            if more.is_empty() {
                break;
            }
            doomed.extend(more);
        }

        let mut removed: Vec<Measurement> = doomed
            .into_iter()
            .rev()
            .map(|i| self.measurements.remove(i))
            .collect();
        removed.reverse();
        for mm in &removed {
            self.notify_removed(mm);
        }
        removed
    }

    /// Remove all measurements, notifying subscribers about each.
    pub fn clear(&mut self) {
        let removed = std::mem::take(&mut self.measurements);
        for mm in &removed {
            self.notify_removed(mm);
        }
    }

    fn notify_removed(&mut self, mm: &Measurement) {
        log::debug!("removing '{}'", mm.title());
        self.observers.publish(&MeasurementRemoved {
            identifier: mm.identifier().to_string(),
            title: mm.title().to_string(),
        });
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&MeasurementRemoved) + 'static) -> SubscriptionId {
        self.observers.subscribe(Box::new(observer))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.observers.len()
    }

    // -- polygon filters --

    /// Register a polygon filter; measurements use it once its id is in
    /// their `polygon filters` list.
    pub fn add_polygon_filter(&mut self, filter: PolygonFilter) -> u32 {
        self.polygons.add(filter)
    }

    /// Unregister a polygon filter and drop it from every measurement.
    pub fn polygon_filter_remove(&mut self, id: u32) -> Option<PolygonFilter> {
        let removed = self.polygons.remove(id);
        for mm in &mut self.measurements {
            let ids = mm.config().polygon_filters();
            if !ids.contains(&id) {
                continue;
            }
            let kept = ids
                .into_iter()
                .filter(|i| *i != id)
                .map(|i| ConfigValue::Integer(i64::from(i)))
                .collect();
            mm.config_mut()
                .set(Setting::PolygonFilters, ConfigValue::List(kept));
        }
        self.apply_filters();
        removed
    }
}

fn two_significant_digits(x: f64) -> f64 {
    format!("{x:.1e}").parse().unwrap_or(x)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::data::EventData;
    use crate::measurement::tests::write_measurement;

    fn mm(name: &str, areas: &[f64]) -> Measurement {
        let defo: Vec<f64> = (0..areas.len()).map(|i| 0.01 * (i + 1) as f64).collect();
        let data = EventData::from_columns(BTreeMap::from([
            (Axis::Area, areas.to_vec()),
            (Axis::Defo, defo),
        ]))
        .unwrap();
        Measurement::from_events(name, data, Configuration::new())
    }

    fn analysis(measurements: Vec<Measurement>) -> Analysis {
        let mut analysis = Analysis::new();
        for m in measurements {
            analysis.add_measurement(m);
        }
        analysis
    }

    #[test]
    fn complete_config_is_idempotent() {
        let mut a = analysis(vec![mm("a", &[10.0, 20.0, 30.0]), mm("b", &[5.0])]);
        let once: Vec<Configuration> = a.measurements().iter().map(|m| m.config().clone()).collect();
        a.complete_config();
        let twice: Vec<Configuration> = a.measurements().iter().map(|m| m.config().clone()).collect();
        assert_eq!(once, twice);

        let cfg = a.measurement(0).unwrap().config();
        assert_eq!(
            cfg.get(Setting::ContourAccuracy(Axis::Area)).and_then(ConfigValue::as_f64),
            Some(2.0)
        );
        assert_eq!(cfg.get(Setting::PlotMax(Axis::Brightness)), Some(&ConfigValue::Float(0.0)));
        // axes without values get no heuristic accuracy
        assert!(!cfg.contains(Setting::ContourAccuracy(Axis::Brightness)));
    }

    #[test]
    fn complete_config_keeps_existing_values() {
        let mut m = mm("a", &[1.0]);
        m.config_mut().set(Setting::Rows, 4_i64);
        let a = analysis(vec![m]);
        let cfg = a.measurement(0).unwrap().config();
        assert_eq!(cfg.get(Setting::Rows), Some(&ConfigValue::Integer(4)));
        assert_eq!(cfg.get(Setting::Columns), Some(&ConfigValue::Integer(2)));
    }

    #[test]
    fn log_scale_disables_contour_plot() {
        let mut a = analysis(vec![mm("a", &[1.0]), mm("b", &[2.0])]);
        a.set_parameters(&Patch::new().set(Setting::ContourPlot, true));
        a.set_parameters(&Patch::new().set(Setting::ScaleX, "log"));
        for m in a.measurements() {
            assert_eq!(m.config().get(Setting::ContourPlot), Some(&ConfigValue::Bool(false)));
            assert_eq!(m.config().get(Setting::ScaleX), Some(&ConfigValue::from("log")));
        }
        // explicitly asking for contours together with a log scale loses
        let mut a = analysis(vec![mm("a", &[1.0])]);
        a.set_parameters(
            &Patch::new()
                .set(Setting::ScaleY, "LOG")
                .set(Setting::ContourPlot, true),
        );
        assert_eq!(
            a.measurement(0).unwrap().config().get(Setting::ContourPlot),
            Some(&ConfigValue::Bool(false))
        );
    }

    #[test]
    fn per_measurement_keys_are_not_broadcast() {
        let mut a = analysis(vec![mm("a", &[1.0]), mm("b", &[2.0])]);
        let colors = a.assign_contour_colors(None);
        a.set_parameters(
            &Patch::new()
                .set(Setting::ContourColor, vec![1.0, 0.0, 0.0, 1.0])
                .set(Setting::Rows, 3_i64),
        );
        let kept: Vec<Srgba<f64>> = a.contour_colors().into_iter().flatten().collect();
        assert_eq!(kept, colors);
        assert_eq!(a.plot_geometry(1).map(|g| g.rows), Some(3));
    }

    #[test]
    fn configured_key_list_is_honoured() {
        let settings = AnalysisSettings {
            per_measurement_keys: vec!["Rows".into()],
            ..AnalysisSettings::default()
        };
        let mut a = Analysis::with_settings(&settings).unwrap();
        a.add_measurement(mm("a", &[1.0]));
        a.set_parameters(&Patch::new().set(Setting::Rows, 3_i64));
        assert_eq!(a.plot_geometry(0).map(|g| g.rows), Some(1));
    }

    #[test]
    fn three_measurements_get_distinct_ramp_colors() {
        let mut a = analysis(vec![mm("a", &[1.0]), mm("b", &[2.0]), mm("c", &[3.0])]);
        let colors = a.assign_contour_colors(None);
        assert_eq!(colors, color::generate_palette(3));
        assert_ne!(colors[0], colors[1]);
        assert_ne!(colors[1], colors[2]);
        assert_ne!(colors[0], colors[2]);
        let stored: Vec<Option<Srgba<f64>>> = colors.iter().copied().map(Some).collect();
        assert_eq!(a.contour_colors(), stored);

        // too short an explicit list falls back to the ramp
        let red = Srgba::new(1.0, 0.0, 0.0, 1.0);
        assert_eq!(a.assign_contour_colors(Some(&[red])), colors);

        let mut single = analysis(vec![mm("a", &[1.0])]);
        assert!(single.assign_contour_colors(None).is_empty());
        assert_eq!(single.contour_colors(), vec![None]);
    }

    #[test]
    fn contour_accuracies_use_average_range() {
        let mut a = analysis(vec![mm("a", &[0.0, 10.0]), mm("b", &[10.0, 20.0])]);
        a.set_contour_accuracies(70);
        for m in a.measurements() {
            let cfg = m.config();
            assert_eq!(cfg.get(Setting::ContourAccuracy(Axis::Area)), Some(&ConfigValue::Float(0.14)));
            assert_eq!(cfg.get(Setting::KdeMultivariate(Axis::Area)), Some(&ConfigValue::Float(0.29)));
        }

        let mut fixed = analysis(vec![mm("a", &[0.0, 10.0]), mm("b", &[10.0, 20.0])]);
        fixed.set_parameters(&Patch::new().set(Setting::ContourFixScale, true));
        fixed.set_contour_accuracies(70);
        assert_eq!(
            fixed.measurement(0).unwrap().config().get(Setting::ContourAccuracy(Axis::Area)),
            Some(&ConfigValue::Float(1.0))
        );
    }

    #[test]
    fn force_same_data_size_limits_to_smallest() {
        let mut a = analysis(vec![mm("a", &[1.0, 2.0, 3.0, 4.0, 5.0]), mm("b", &[1.0, 2.0])]);
        assert_eq!(a.force_same_data_size(), 2);
        assert!(a.measurements().iter().all(|m| m.event_count() == 2));
        assert_eq!(a.common_parameters(Section::Filtering)["limit events"], ConfigValue::Integer(2));
    }

    #[test]
    fn children_follow_parent_filters() {
        let mut a = analysis(vec![mm("a", &[10.0, 20.0, 30.0, 40.0])]);
        let child = a.add_hierarchy_child(0).unwrap();
        assert_eq!(a.measurement(child).unwrap().data().len(), 4);

        a.set_parameters(
            &Patch::new()
                .set(Setting::FilterMin(Axis::Area), 15.0)
                .set(Setting::FilterMax(Axis::Area), 35.0),
        );
        assert_eq!(a.measurement(0).unwrap().event_count(), 2);
        assert_eq!(a.measurement(child).unwrap().data().len(), 2);
        assert_eq!(a.names(), vec!["a", "a_child"]);
    }

    #[test]
    fn remove_cascades_and_notifies() {
        let mut a = analysis(vec![mm("a", &[1.0]), mm("b", &[2.0])]);
        let child = a.add_hierarchy_child(0).unwrap();
        a.add_hierarchy_child(child).unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let id = a.subscribe(move |ev| sink.borrow_mut().push(ev.title.clone()));

        let removed = a.remove(0);
        assert_eq!(removed.len(), 3);
        assert_eq!(a.titles(), vec!["b"]);
        assert_eq!(*seen.borrow(), vec!["a", "a_child", "a_child_child"]);

        assert!(a.unsubscribe(id));
        assert!(!a.unsubscribe(id));
        a.clear();
        assert!(a.is_empty());
        assert_eq!(seen.borrow().len(), 3);
    }

    #[test]
    fn same_file_twice_gets_distinct_identities() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_measurement(dir.path(), "M1", &[10.0, 20.0, 30.0, 40.0]);
        let mut a = Analysis::from_files(&[path.clone(), path]).unwrap();
        let first = a.measurement(0).unwrap().identifier().to_string();
        let second = a.measurement(1).unwrap().identifier().to_string();
        assert_ne!(first, second);
        assert_eq!(a.position(&second), Some(1));

        a.set_manually_excluded(1, 0, true);
        a.set_manually_excluded(1, 1, true);
        let child = a.add_hierarchy_child(1).unwrap();
        assert_eq!(a.measurement(1).unwrap().event_count(), 2);
        assert_eq!(a.measurement(child).unwrap().parent_id(), Some(second.as_str()));
        assert_eq!(a.measurement(child).unwrap().data().len(), 2);
        a.apply_filters();
        assert_eq!(a.measurement(child).unwrap().data().len(), 2);

        // only the first copy goes, the child belongs to the second
        assert_eq!(a.remove(0).len(), 1);
        assert_eq!(a.len(), 2);
        assert_eq!(a.measurement(1).unwrap().parent_id(), Some(second.as_str()));
    }

    #[test]
    fn child_exclusions_follow_parent_selection() {
        let mut a = analysis(vec![mm("a", &[10.0, 20.0, 30.0, 40.0])]);
        a.set_parameters(
            &Patch::new()
                .set(Setting::FilterMin(Axis::Area), 15.0)
                .set(Setting::FilterMax(Axis::Area), 35.0),
        );
        let child = a.add_hierarchy_child(0).unwrap();
        a.set_manually_excluded(child, 1, true);
        assert_eq!(a.measurement(child).unwrap().event_count(), 1);

        // the parent now passes [30, 40]: two events again, but other ones
        a.set_parameters(
            &Patch::new()
                .set(Setting::FilterMin(Axis::Area), 25.0)
                .set(Setting::FilterMax(Axis::Area), 45.0),
        );
        let c = a.measurement(child).unwrap();
        assert_eq!(c.data().column(Axis::Area), Some(&[30.0, 40.0][..]));
        assert_eq!(c.event_count(), 2);
    }

    #[test]
    fn removing_a_polygon_filter_updates_measurements() {
        let mut a = analysis(vec![mm("a", &[1.0, 5.0])]);
        let id = a.add_polygon_filter(PolygonFilter::new(
            "small",
            Axis::Area,
            Axis::Defo,
            vec![(0.0, 0.0), (2.0, 0.0), (2.0, 1.0), (0.0, 1.0)],
        ));
        a.set_parameters(&Patch::new().set(
            Setting::PolygonFilters,
            ConfigValue::List(vec![ConfigValue::Integer(i64::from(id))]),
        ));
        assert_eq!(a.measurement(0).unwrap().event_count(), 1);

        assert!(a.polygon_filter_remove(id).is_some());
        assert!(a.polygons().is_empty());
        assert!(a.measurement(0).unwrap().config().polygon_filters().is_empty());
        assert_eq!(a.measurement(0).unwrap().event_count(), 2);
    }

    #[test]
    fn parameters_hide_ignored_and_unusable_axes() {
        let a = analysis(vec![mm("a", &[1.0])]);
        let filtering = a.get_parameters(Section::Filtering, 0).unwrap();
        assert!(filtering.contains_key("area min"));
        assert!(!filtering.contains_key("brightness min"));
        assert!(!filtering.contains_key("areapix min"));
        assert!(!filtering.contains_key("frame max"));
        assert!(filtering.contains_key("limit events"));
        assert!(a.get_parameters(Section::Filtering, 3).is_none());

        assert_eq!(a.plot_axes(0), Some((Axis::Area, Axis::Defo)));
        assert_eq!(
            a.plot_geometry(0),
            Some(PlotGeometry {
                rows: 1,
                columns: 2,
                contour_plot: true,
                legend_plot: true,
            })
        );
    }

    #[test]
    fn statistics_rows_per_measurement() {
        let a = analysis(vec![mm("a", &[1.0, 3.0]), mm("b", &[2.0])]);
        let table = a.statistics_basic();
        assert_eq!(table.header[0], "Data set");
        assert_eq!(table.header[3], "Mean area");
        assert_eq!(table.header.len(), 1 + 2 + 6);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].0, "a");
        assert_eq!(table.rows[0].1[2], 2.0);
    }
}
