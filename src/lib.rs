//! Session and analysis model for real-time deformability cytometry
//! measurements.
//!
//! ```text
//!  data files ──► measurement ──► analysis ──► session (index.txt + configs)
//!                    ▲                │
//!                 config          aggregate views, colours, statistics
//! ```

pub mod analysis;
pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod measurement;
pub mod session;
pub mod settings;

pub use analysis::{Analysis, Patch};
pub use error::{Error, Result};
pub use measurement::Measurement;
pub use settings::Settings;
