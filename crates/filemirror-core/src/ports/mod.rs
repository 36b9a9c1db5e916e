//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the engine depends on but whose implementations
//! live in adapter code.
//!
//! ## Ports Overview
//!
//! - [`IFileCopier`] - Byte transfer from a source file into its mirror

pub mod copier;

pub use copier::{CopyMode, CopyStats, IFileCopier};
