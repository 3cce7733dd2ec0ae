//! Shared test utilities for the qlrgen workspace.
//!
//! This crate provides common testing infrastructure including:
//! - A GeoTIFF writer for synthetic rasters with arbitrary GeoKeys
//! - A local HTTP server that honours, ignores or misaligns range requests
//! - XML well-formedness helpers
//! - Reference fixtures with known reprojection results
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! qlrgen-test-utils = { path = "../qlrgen-test-utils" }
//! ```

pub mod fixtures;
pub mod geotiff;
pub mod server;
pub mod xml;

pub use geotiff::{ByteOrder, GeoKey, GeoTiffBuilder};
pub use server::RangeServer;
