//! Read-only views across several measurements.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::{ConfigValue, Configuration, Section, SectionMap};
use crate::data::{Axis, EventData};
use crate::measurement::Measurement;

/// Key → value pairs that are identical in every configuration.
///
/// Empty when the first configuration lacks `section`.
pub fn common_parameters(configs: &[&Configuration], section: Section) -> SectionMap {
    let Some((first, rest)) = configs.split_first() else {
        return SectionMap::new();
    };
    let Some(first) = first.section(section) else {
        return SectionMap::new();
    };
    first
        .iter()
        .filter(|(key, value)| {
            rest.iter()
                .all(|cfg| cfg.get_key(section, key) == Some(*value))
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// For every key whose value is not shared by all configurations, the value
/// of each configuration in order (`None` where the key is missing).
pub fn uncommon_parameters(
    configs: &[&Configuration],
    section: Section,
) -> BTreeMap<String, Vec<Option<ConfigValue>>> {
    let common = common_parameters(configs, section);
    let keys: BTreeSet<&String> = configs
        .iter()
        .filter_map(|cfg| cfg.section(section))
        .flat_map(|values| values.keys())
        .filter(|key| !common.contains_key(*key))
        .collect();

    let mut warned = BTreeSet::new();
    keys.into_iter()
        .map(|key| {
            let values = configs
                .iter()
                .enumerate()
                .map(|(i, cfg)| {
                    let value = cfg.get_key(section, key).cloned();
                    if value.is_none() && warned.insert(i) {
                        log::warn!("measurement {} might be corrupt: no '{key}' in [{section}]", i + 1);
                    }
                    value
                })
                .collect();
            (key.clone(), values)
        })
        .collect()
}

/// Axes along which at least one measurement has no nonzero value.
pub fn unusable_axes(measurements: &[Measurement]) -> Vec<Axis> {
    Axis::ALL
        .into_iter()
        .filter(|axis| measurements.iter().any(|mm| !mm.data().has_values(*axis)))
        .collect()
}

/// Axes recorded (with nonzero values) by every measurement.
pub fn usable_axes(measurements: &[Measurement]) -> Vec<Axis> {
    let unusable = unusable_axes(measurements);
    Axis::ALL
        .into_iter()
        .filter(|axis| !unusable.contains(axis))
        .collect()
}

// ---------------------------------------------------------------------------
// Basic statistics
// ---------------------------------------------------------------------------

/// Column headers of [`basic_statistics`] for the given axes.
pub fn statistics_header(axes: &[Axis]) -> Vec<String> {
    let mut header = vec!["Events".to_string(), "%-gated".to_string()];
    for axis in axes {
        header.push(format!("Mean {axis}"));
        header.push(format!("SD {axis}"));
        header.push(format!("Median {axis}"));
    }
    header
}

/// Event count, percentage passing the filters, and mean / standard
/// deviation / median of the filtered events along each axis.
pub fn basic_statistics(mm: &Measurement, axes: &[Axis]) -> (Vec<String>, Vec<f64>) {
    let filtered = mm.filtered_events();
    let total = mm.data().len();
    let gated = if total == 0 {
        0.0
    } else {
        100.0 * filtered.len() as f64 / total as f64
    };

    let mut values = vec![filtered.len() as f64, gated];
    for axis in axes {
        let col = finite_values(&filtered, *axis);
        values.push(mean(&col));
        values.push(std_dev(&col));
        values.push(median(col));
    }
    (statistics_header(axes), values)
}

fn finite_values(data: &EventData, axis: Axis) -> Vec<f64> {
    (0..data.len())
        .map(|i| data.value(axis, i))
        .filter(|v| v.is_finite())
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
fn std_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
