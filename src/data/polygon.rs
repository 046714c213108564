//! Polygon filters and the registry that owns them.
//!
//! The registry is an ordinary value: whoever reconstructs a session owns
//! one, clears it before importing `PolygonFilters.poly`, and passes it to
//! filter recomputation.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::model::{Axis, EventData};
use crate::error::{Error, Result};
use crate::session::index::{parse_sections, render_sections, Sections};

/// File name of the polygon filter definitions inside a session directory.
pub const POLYGON_FILE: &str = "PolygonFilters.poly";

/// A closed polygon in the plane spanned by two axes.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonFilter {
    pub id: u32,
    pub name: String,
    pub x_axis: Axis,
    pub y_axis: Axis,
    pub points: Vec<(f64, f64)>,
    /// Keep events outside instead of inside.
    pub inverted: bool,
}

impl PolygonFilter {
    pub fn new(name: &str, x_axis: Axis, y_axis: Axis, points: Vec<(f64, f64)>) -> Self {
        PolygonFilter {
            id: 0,
            name: name.to_string(),
            x_axis,
            y_axis,
            points,
            inverted: false,
        }
    }

    /// Whether `(x, y)` passes the filter (even-odd rule).
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let mut inside = false;
        let n = self.points.len();
        if n >= 3 {
            let mut j = n - 1;
            for i in 0..n {
                let (xi, yi) = self.points[i];
                let (xj, yj) = self.points[j];
                if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                    inside = !inside;
                }
                j = i;
            }
        }
        inside != self.inverted
    }

    /// Per-event pass mask for `data`.
    pub fn mask(&self, data: &EventData) -> Vec<bool> {
        (0..data.len())
            .map(|i| self.contains(data.value(self.x_axis, i), data.value(self.y_axis, i)))
            .collect()
    }
}

/// All polygon filters of an analysis, by id.
#[derive(Debug, Clone, Default)]
pub struct PolygonRegistry {
    filters: BTreeMap<u32, PolygonFilter>,
}

impl PolygonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&PolygonFilter> {
        self.filters.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PolygonFilter> {
        self.filters.values()
    }

    fn next_id(&self) -> u32 {
        self.filters.keys().next_back().map_or(0, |id| id + 1)
    }

    /// Register `filter` under a fresh id and return it.
    pub fn add(&mut self, mut filter: PolygonFilter) -> u32 {
        let id = self.next_id();
        filter.id = id;
        self.filters.insert(id, filter);
        id
    }

    pub fn remove(&mut self, id: u32) -> Option<PolygonFilter> {
        self.filters.remove(&id)
    }

    pub fn clear(&mut self) {
        self.filters.clear();
    }

    /// Add all filters defined in `path`, keeping their recorded ids unless
    /// an id is already taken. Returns the ids that were registered.
    pub fn import(&mut self, path: &Path) -> Result<Vec<u32>> {
        let text = fs::read_to_string(path).map_err(|e| Error::format(path, e.to_string()))?;
        let sections = parse_sections(&text, path)?;

        let mut ids = Vec::new();
        for (name, values) in &sections {
            let mut filter = parse_filter(name, values).map_err(|reason| {
                Error::format(path, format!("[{name}]: {reason}"))
            })?;
            if self.filters.contains_key(&filter.id) {
                let id = self.next_id();
                log::warn!("polygon filter id {} already in use, renumbered to {id}", filter.id);
                filter.id = id;
            }
            ids.push(filter.id);
            self.filters.insert(filter.id, filter);
        }
        Ok(ids)
    }

    /// Write all filters to `path`.
    pub fn export(&self, path: &Path) -> Result<()> {
        let sections: Sections = self
            .filters
            .values()
            .map(|f| {
                let mut values = BTreeMap::new();
                values.insert("name".to_string(), f.name.clone());
                values.insert("x axis".to_string(), f.x_axis.name().to_string());
                values.insert("y axis".to_string(), f.y_axis.name().to_string());
                values.insert("inverted".to_string(), f.inverted.to_string());
                for (i, (x, y)) in f.points.iter().enumerate() {
                    values.insert(format!("point{i:08}"), format!("{x:?} {y:?}"));
                }
                (format!("Polygon {}", f.id), values)
            })
            .collect();
        fs::write(path, render_sections(&[], &sections))?;
        Ok(())
    }
}

fn parse_filter(
    section: &str,
    values: &BTreeMap<String, String>,
) -> std::result::Result<PolygonFilter, String> {
    let id = section
        .strip_prefix("Polygon ")
        .and_then(|s| s.trim().parse::<u32>().ok())
        .ok_or("section name is not 'Polygon <id>'")?;
    let axis = |key: &str| -> std::result::Result<Axis, String> {
        values
            .get(key)
            .ok_or_else(|| format!("missing '{key}'"))?
            .parse()
    };
    let x_axis = axis("x axis")?;
    let y_axis = axis("y axis")?;

    // point keys are zero-padded, so map order is point order
    let mut points = Vec::new();
    for (key, value) in values.range("point".to_string()..) {
        if !key.starts_with("point") {
            break;
        }
        let mut coords = value.split_whitespace().map(str::parse::<f64>);
        match (coords.next(), coords.next()) {
            (Some(Ok(x)), Some(Ok(y))) => points.push((x, y)),
            _ => return Err(format!("'{key}' is not a pair of numbers")),
        }
    }

    Ok(PolygonFilter {
        id,
        name: values.get("name").cloned().unwrap_or_else(|| section.to_string()),
        x_axis,
        y_axis,
        points,
        inverted: values
            .get("inverted")
            .is_some_and(|v| v.eq_ignore_ascii_case("true")),
    })
}
