//! Data layer: core types, loading, cleaning, and derived values.
//!
//! Architecture:
//! ```text
//!  .csv / .json / .parquet
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  schema check, parse rows → Dataset
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  filter   │  drop incomplete rows, IQR outlier passes   (offline only)
//!   └──────────┘
//!        │
//!        ├──────────► stats / thermocline                      (offline only)
//!        ▼
//!   ┌─────────────┐
//!   │ interpolate  │  depth-banded TALK estimate per row
//!   └─────────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │ sanitize  │  non-finite → absent
//!   └──────────┘
//! ```

pub mod filter;
pub mod interpolate;
pub mod loader;
pub mod model;
pub mod sanitize;
pub mod stats;
pub mod thermocline;
