use std::cmp::Ordering;
use std::fmt;

// ---------------------------------------------------------------------------
// ConfigValue – a single configuration value
// ---------------------------------------------------------------------------

/// Declared type of a known configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Integer,
    Float,
    String,
    List,
}

/// A configuration value. Values take part in set operations across
/// measurements, so `ConfigValue` is `Ord` and `Hash`.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<ConfigValue>),
}

// -- Manual Eq/Ord so we can put ConfigValue in BTreeSet --

impl Eq for ConfigValue {}

impl PartialOrd for ConfigValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ConfigValue {
    fn cmp(&self, other: &Self) -> Ordering {
        use ConfigValue::*;
        fn discriminant(v: &ConfigValue) -> u8 {
            match v {
                Bool(_) => 0,
                Integer(_) => 1,
                Float(_) => 2,
                String(_) => 3,
                List(_) => 4,
            }
        }
        match (self, other) {
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            (List(a), List(b)) => a.cmp(b),
            _ => discriminant(self).cmp(&discriminant(other)),
        }
    }
}

impl std::hash::Hash for ConfigValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            ConfigValue::Bool(b) => b.hash(state),
            ConfigValue::Integer(i) => i.hash(state),
            ConfigValue::Float(f) => f.to_bits().hash(state),
            ConfigValue::String(s) => s.hash(state),
            ConfigValue::List(l) => l.hash(state),
        }
    }
}

/// Written form, read back by [`ConfigValue::parse`]. Floats keep a decimal
/// point so that untyped keys do not turn into integers on reload.
impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(b) => write!(f, "{b}"),
            ConfigValue::Integer(i) => write!(f, "{i}"),
            ConfigValue::Float(v) => write!(f, "{v:?}"),
            ConfigValue::String(s) => write!(f, "{s}"),
            ConfigValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl ConfigValue {
    /// Parse text as the declared `kind`, falling back to
    /// [`ConfigValue::guess`] when the text does not fit.
    pub fn parse(text: &str, kind: ValueKind) -> ConfigValue {
        let text = text.trim();
        let parsed = match kind {
            ValueKind::Bool => parse_bool(text).map(ConfigValue::Bool),
            ValueKind::Integer => text
                .parse::<i64>()
                .ok()
                // "100.0" written by older versions
                .or_else(|| text.parse::<f64>().ok().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(ConfigValue::Integer),
            ValueKind::Float => text.parse::<f64>().ok().map(ConfigValue::Float),
            ValueKind::String => Some(ConfigValue::String(text.to_string())),
            ValueKind::List => parse_list(text),
        };
        parsed.unwrap_or_else(|| {
            log::debug!("'{text}' is not a {kind:?}, guessing its type");
            ConfigValue::guess(text)
        })
    }

    /// Best-effort typing of untyped text.
    pub fn guess(s: &str) -> ConfigValue {
        let s = s.trim();
        if let Ok(i) = s.parse::<i64>() {
            return ConfigValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return ConfigValue::Float(f);
        }
        if let Some(b) = parse_bool(s) {
            return ConfigValue::Bool(b);
        }
        if let Some(list) = parse_list(s) {
            return list;
        }
        ConfigValue::String(s.to_string())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            ConfigValue::Integer(i) => Some(*i != 0),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Integer(i) => Some(*i),
            ConfigValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    /// Try to interpret the value as an `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(v) => Some(*v),
            ConfigValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ConfigValue]> {
        match self {
            ConfigValue::List(l) => Some(l),
            _ => None,
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn parse_list(s: &str) -> Option<ConfigValue> {
    let inner = s.strip_prefix('[')?.strip_suffix(']')?.trim();
    if inner.is_empty() {
        return Some(ConfigValue::List(Vec::new()));
    }
    Some(ConfigValue::List(
        inner.split(',').map(ConfigValue::guess).collect(),
    ))
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Bool(b)
    }
}

impl From<i64> for ConfigValue {
    fn from(i: i64) -> Self {
        ConfigValue::Integer(i)
    }
}

impl From<usize> for ConfigValue {
    fn from(i: usize) -> Self {
        ConfigValue::Integer(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<f64> for ConfigValue {
    fn from(f: f64) -> Self {
        ConfigValue::Float(f)
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::String(s.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::String(s)
    }
}

impl From<Vec<f64>> for ConfigValue {
    fn from(v: Vec<f64>) -> Self {
        ConfigValue::List(v.into_iter().map(ConfigValue::Float).collect())
    }
}
