use std::fmt;

use super::value::ValueKind;
use crate::data::model::Axis;

/// Top-level configuration sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    /// Acquisition metadata (from `*_para.ini`).
    General,
    /// Camera metadata (from `*_camera.ini`).
    Image,
    Filtering,
    Plotting,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::General,
        Section::Image,
        Section::Filtering,
        Section::Plotting,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Section::General => "general",
            Section::Image => "image",
            Section::Filtering => "filtering",
            Section::Plotting => "plotting",
        }
    }

    /// Case-insensitive lookup (`[Filtering]` and `[filtering]` are the same).
    pub fn from_name(name: &str) -> Option<Section> {
        let name = name.trim().to_ascii_lowercase();
        Section::ALL.into_iter().find(|s| s.name() == name)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The known configuration keys, each living in one section with a
/// declared value type.
///
/// Keys not listed here are still stored (as text-guessed values), they just
/// have no typed accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Setting {
    // [filtering]
    EnableFilters,
    LimitEvents,
    HierarchyParent,
    PolygonFilters,
    RemoveInvalidEvents,
    FilterMin(Axis),
    FilterMax(Axis),

    // [plotting]
    AxisX,
    AxisY,
    ScaleX,
    ScaleY,
    ContourPlot,
    ScatterPlot,
    LegendPlot,
    ContourColor,
    ContourFixScale,
    Downsampling,
    DownsampleEvents,
    Rows,
    Columns,
    Kde,
    PlotMin(Axis),
    PlotMax(Axis),
    ContourAccuracy(Axis),
    KdeMultivariate(Axis),
}

impl Setting {
    pub fn section(self) -> Section {
        use Setting::*;
        match self {
            EnableFilters | LimitEvents | HierarchyParent | PolygonFilters
            | RemoveInvalidEvents | FilterMin(_) | FilterMax(_) => Section::Filtering,
            _ => Section::Plotting,
        }
    }

    /// Key as written in configuration files.
    pub fn key(self) -> String {
        use Setting::*;
        match self {
            EnableFilters => "enable filters".into(),
            LimitEvents => "limit events".into(),
            HierarchyParent => "hierarchy parent".into(),
            PolygonFilters => "polygon filters".into(),
            RemoveInvalidEvents => "remove invalid events".into(),
            AxisX => "axis x".into(),
            AxisY => "axis y".into(),
            ScaleX => "scale x".into(),
            ScaleY => "scale y".into(),
            ContourPlot => "contour plot".into(),
            ScatterPlot => "scatter plot".into(),
            LegendPlot => "legend plot".into(),
            ContourColor => "contour color".into(),
            ContourFixScale => "contour fix scale".into(),
            Downsampling => "downsampling".into(),
            DownsampleEvents => "downsample events".into(),
            Rows => "rows".into(),
            Columns => "columns".into(),
            Kde => "kde".into(),
            FilterMin(a) | PlotMin(a) => format!("{a} min"),
            FilterMax(a) | PlotMax(a) => format!("{a} max"),
            ContourAccuracy(a) => format!("contour accuracy {a}"),
            KdeMultivariate(a) => format!("kde multivariate {a}"),
        }
    }

    pub fn kind(self) -> ValueKind {
        use Setting::*;
        match self {
            EnableFilters | RemoveInvalidEvents | ContourPlot | ScatterPlot | LegendPlot
            | ContourFixScale | Downsampling => ValueKind::Bool,
            LimitEvents | DownsampleEvents | Rows | Columns => ValueKind::Integer,
            HierarchyParent | AxisX | AxisY | ScaleX | ScaleY | Kde => ValueKind::String,
            PolygonFilters | ContourColor => ValueKind::List,
            FilterMin(_) | FilterMax(_) | PlotMin(_) | PlotMax(_) | ContourAccuracy(_)
            | KdeMultivariate(_) => ValueKind::Float,
        }
    }

    /// Reverse of [`Setting::section`] + [`Setting::key`].
    pub fn from_key(section: Section, key: &str) -> Option<Setting> {
        use Setting::*;
        let fixed: &[Setting] = match section {
            Section::Filtering => &[
                EnableFilters,
                LimitEvents,
                HierarchyParent,
                PolygonFilters,
                RemoveInvalidEvents,
            ],
            Section::Plotting => &[
                AxisX,
                AxisY,
                ScaleX,
                ScaleY,
                ContourPlot,
                ScatterPlot,
                LegendPlot,
                ContourColor,
                ContourFixScale,
                Downsampling,
                DownsampleEvents,
                Rows,
                Columns,
                Kde,
            ],
            Section::General | Section::Image => return None,
        };
        if let Some(s) = fixed.iter().find(|s| s.key() == key) {
            return Some(*s);
        }

        let per_axis: &[fn(Axis) -> Setting] = match section {
            Section::Filtering => &[FilterMin, FilterMax],
            _ => &[PlotMin, PlotMax, ContourAccuracy, KdeMultivariate],
        };
        Axis::ALL.into_iter().find_map(|axis| {
            per_axis
                .iter()
                .map(|make| make(axis))
                .find(|s| s.key() == key)
        })
    }

    /// Declared kind of an arbitrary key, if it is a known setting.
    pub fn kind_of(section: Section, key: &str) -> Option<ValueKind> {
        Setting::from_key(section, key).map(Setting::kind)
    }
}
