use super::model::EventData;
use super::polygon::PolygonRegistry;
use crate::config::Configuration;

// ---------------------------------------------------------------------------
// Filter recomputation: configuration → per-event inclusion mask
// ---------------------------------------------------------------------------

/// Compute which events of `data` pass the filters configured in `config`.
///
/// With `enable filters` set, an event passes when:
/// * all its recorded values are finite (only with `remove invalid events`)
/// * it lies within `[min, max]` for every axis whose bounds differ
/// * it lies inside every polygon filter listed in `polygon filters`
/// * it is not manually excluded (`manual[i]` is `true` for kept events)
///
/// Independently, a positive `limit events` thins the passing events down to
/// an evenly spaced subset of that size.
pub fn compute_mask(
    data: &EventData,
    config: &Configuration,
    manual: &[bool],
    polygons: &PolygonRegistry,
) -> Vec<bool> {
    let mut mask = vec![true; data.len()];

    if config.enable_filters() {
        if config.remove_invalid_events() {
            for axis in data.axes() {
                if let Some(col) = data.column(axis) {
                    and_with(&mut mask, col.iter().map(|v| v.is_finite()));
                }
            }
        }

        for axis in data.axes() {
            let (lo, hi) = config.filter_range(axis);
            if lo == hi {
                continue;
            }
            if let Some(col) = data.column(axis) {
                and_with(&mut mask, col.iter().map(|v| *v >= lo && *v <= hi));
            }
        }

        for id in config.polygon_filters() {
            match polygons.get(id) {
                Some(poly) => and_with(&mut mask, poly.mask(data)),
                None => log::warn!("polygon filter {id} is not registered, ignoring it"),
            }
        }

        if manual.len() == mask.len() {
            and_with(&mut mask, manual.iter().copied());
        } else {
            log::warn!(
                "manual exclusion mask has {} entries for {} events, ignoring it",
                manual.len(),
                mask.len()
            );
        }
    }

    let limit = config.limit_events();
    if limit > 0 {
        limit_to(&mut mask, limit);
    }
    mask
}

fn and_with(mask: &mut [bool], other: impl IntoIterator<Item = bool>) {
    for (m, o) in mask.iter_mut().zip(other) {
        *m &= o;
    }
}

/// Keep `limit` evenly spaced events out of the passing ones.
fn limit_to(mask: &mut [bool], limit: usize) {
    let passing: Vec<usize> = mask
        .iter()
        .enumerate()
        .filter(|(_, m)| **m)
        .map(|(i, _)| i)
        .collect();
    let n = passing.len();
    if n <= limit {
        return;
    }
    mask.iter_mut().for_each(|m| *m = false);
    for k in 0..limit {
        mask[passing[k * n / limit]] = true;
    }
}
