use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Axis – a quantitative per-event feature
// ---------------------------------------------------------------------------

/// A quantitative event feature that can be filtered on and plotted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Axis {
    Area,
    AreaPix,
    Aspect,
    Brightness,
    Circ,
    Defo,
    Fl1Max,
    Fl2Max,
    Fl3Max,
    Frame,
    PosLat,
    PosX,
    SizeX,
    SizeY,
    Time,
}

impl Axis {
    pub const ALL: [Axis; 15] = [
        Axis::Area,
        Axis::AreaPix,
        Axis::Aspect,
        Axis::Brightness,
        Axis::Circ,
        Axis::Defo,
        Axis::Fl1Max,
        Axis::Fl2Max,
        Axis::Fl3Max,
        Axis::Frame,
        Axis::PosLat,
        Axis::PosX,
        Axis::SizeX,
        Axis::SizeY,
        Axis::Time,
    ];

    /// Name used in configuration keys and data file columns.
    pub fn name(self) -> &'static str {
        match self {
            Axis::Area => "area",
            Axis::AreaPix => "areapix",
            Axis::Aspect => "aspect",
            Axis::Brightness => "brightness",
            Axis::Circ => "circ",
            Axis::Defo => "defo",
            Axis::Fl1Max => "fl1max",
            Axis::Fl2Max => "fl2max",
            Axis::Fl3Max => "fl3max",
            Axis::Frame => "frame",
            Axis::PosLat => "poslat",
            Axis::PosX => "posx",
            Axis::SizeX => "sizex",
            Axis::SizeY => "sizey",
            Axis::Time => "time",
        }
    }

    /// Axes that exist in the data but are never offered for plotting.
    pub fn is_ignored(self) -> bool {
        matches!(self, Axis::AreaPix | Axis::Frame)
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Axis {
    type Err = String;

    /// Case-insensitive; spaces, `_` and `-` are ignored so that column
    /// headers like `Pos x` or `area_pix` map onto the same axis.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();
        Axis::ALL
            .into_iter()
            .find(|a| a.name() == key)
            .ok_or_else(|| format!("unknown axis '{s}'"))
    }
}

// ---------------------------------------------------------------------------
// EventData – the per-event columns of one measurement
// ---------------------------------------------------------------------------

/// Column store of per-event values. Every column has [`EventData::len`]
/// entries; axes without a column read as all zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventData {
    columns: BTreeMap<Axis, Vec<f64>>,
    len: usize,
}

impl EventData {
    /// Build from columns, which must all have the same length.
    pub fn from_columns(columns: BTreeMap<Axis, Vec<f64>>) -> Result<Self, String> {
        let mut lens = columns.values().map(Vec::len);
        let len = lens.next().unwrap_or(0);
        if let Some(other) = lens.find(|l| *l != len) {
            return Err(format!("columns differ in length ({len} vs {other})"));
        }
        Ok(EventData { columns, len })
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Axes that have a column.
    pub fn axes(&self) -> impl Iterator<Item = Axis> + '_ {
        self.columns.keys().copied()
    }

    pub fn column(&self, axis: Axis) -> Option<&[f64]> {
        self.columns.get(&axis).map(Vec::as_slice)
    }

    /// Value of `axis` for event `i` (0 if the axis was not recorded).
    pub fn value(&self, axis: Axis, i: usize) -> f64 {
        self.columns.get(&axis).map_or(0.0, |c| c[i])
    }

    /// Whether any event has a nonzero value along `axis`.
    pub fn has_values(&self, axis: Axis) -> bool {
        self.column(axis)
            .is_some_and(|c| c.iter().any(|v| *v != 0.0 && !v.is_nan()))
    }

    /// NaN-ignoring minimum and maximum of a column.
    pub fn min_max(&self, axis: Axis) -> Option<(f64, f64)> {
        let col = self.column(axis)?;
        col.iter()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Subset of events where `mask` is true.
    pub fn select(&self, mask: &[bool]) -> EventData {
        debug_assert_eq!(mask.len(), self.len);
        let columns = self
            .columns
            .iter()
            .map(|(axis, col)| {
                let kept = col
                    .iter()
                    .zip(mask)
                    .filter(|(_, m)| **m)
                    .map(|(v, _)| *v)
                    .collect();
                (*axis, kept)
            })
            .collect();
        EventData {
            columns,
            len: mask.iter().filter(|m| **m).count(),
        }
    }
}
