use palette::{Srgb, Srgba};

use crate::config::ConfigValue;

// ---------------------------------------------------------------------------
// "darkjet" colour ramp
// ---------------------------------------------------------------------------

/// Anchor points `(position, value)` of one colour channel.
type Segments = &'static [(f64, f64)];

const RED: Segments = &[(0.0, 0.0), (0.35, 0.0), (0.66, 0.3), (0.89, 0.4), (1.0, 0.5)];
const GREEN: Segments = &[
    (0.0, 0.0),
    (0.125, 0.1),
    (0.375, 0.4),
    (0.64, 0.3),
    (0.91, 0.2),
    (1.0, 0.0),
];
const BLUE: Segments = &[(0.0, 0.7), (0.11, 0.5), (0.34, 0.4), (0.65, 0.0), (1.0, 0.0)];

fn channel(segments: Segments, t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    for pair in segments.windows(2) {
        let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
        if t <= x1 {
            if x1 == x0 {
                return y1;
            }
            return y0 + (y1 - y0) * (t - x0) / (x1 - x0);
        }
    }
    segments.last().map_or(0.0, |(_, y)| *y)
}

/// Colour of the dark-jet ramp at `t` in `[0, 1]`.
pub fn darkjet(t: f64) -> Srgba<f64> {
    Srgba::new(channel(RED, t), channel(GREEN, t), channel(BLUE, t), 1.0)
}

/// Generates `n` colours evenly spaced along the dark-jet ramp, from its
/// blue end to its red end.
pub fn generate_palette(n: usize) -> Vec<Srgba<f64>> {
    match n {
        0 => Vec::new(),
        1 => vec![darkjet(0.0)],
        _ => (0..n)
            .map(|i| darkjet(i as f64 / (n - 1) as f64))
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// `[r, g, b, a]` as stored under `contour color`.
pub fn to_config(color: Srgba<f64>) -> ConfigValue {
    let (r, g, b, a) = color.into_components();
    ConfigValue::from(vec![r, g, b, a])
}

/// Read a stored `[r, g, b]` or `[r, g, b, a]` list.
pub fn from_components(components: &[f64]) -> Option<Srgba<f64>> {
    match *components {
        [r, g, b] => Some(Srgba::new(r, g, b, 1.0)),
        [r, g, b, a] => Some(Srgba::new(r, g, b, a)),
        _ => None,
    }
}

/// `#rrggbb`, for display.
pub fn to_hex(color: Srgba<f64>) -> String {
    let rgb: Srgb<u8> = Srgb::new(color.red, color.green, color.blue).into_format();
    format!("#{:02x}{:02x}{:02x}", rgb.red, rgb.green, rgb.blue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_hits_anchor_points() {
        let start = darkjet(0.0);
        assert_eq!((start.red, start.green, start.blue), (0.0, 0.0, 0.7));
        let end = darkjet(1.0);
        assert_eq!((end.red, end.green, end.blue), (0.5, 0.0, 0.0));
        assert!((channel(GREEN, 0.375) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn palette_colors_are_distinct() {
        let colors = generate_palette(3);
        assert_eq!(colors.len(), 3);
        assert_ne!(colors[0], colors[1]);
        assert_ne!(colors[1], colors[2]);
        assert_ne!(colors[0], colors[2]);
        assert_eq!(colors[0], darkjet(0.0));
        assert_eq!(colors[2], darkjet(1.0));
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn conversions() {
        let c = darkjet(0.5);
        let stored = to_config(c);
        let comps: Vec<f64> = stored.as_list().unwrap().iter().filter_map(|v| v.as_f64()).collect();
        assert_eq!(from_components(&comps), Some(c));
        assert_eq!(to_hex(Srgba::new(1.0, 0.0, 0.0, 1.0)), "#ff0000");
        assert_eq!(from_components(&[0.1]), None);
    }
}
