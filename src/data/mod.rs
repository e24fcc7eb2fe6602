//! Data layer: core types, file selection, and loading.
//!
//! Architecture:
//! ```text
//!   directory listing
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  filter   │  keyword / suffix rules → selected filenames
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  gunzip + TSV parse, DonorID from filename (donor)
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  Table    │  column-union concat → unified table
//!   └──────────┘
//! ```
//!
//! `expression` reads the gene-by-cell matrices that sit next to the
//! annotation files.

pub mod donor;
pub mod error;
pub mod expression;
pub mod filter;
pub mod loader;
pub mod model;
