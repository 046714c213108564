/// Data layer: event columns, loading, and filtering.
///
/// Architecture:
/// ```text
///  .parquet / .csv / .json
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → EventData
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ EventData  │  one column per Axis
///   └───────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  configuration + polygons + manual mask → inclusion mask
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod polygon;

pub use model::{Axis, EventData};
pub use polygon::{PolygonFilter, PolygonRegistry};
