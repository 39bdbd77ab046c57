//! Version normalization layer
//!
//! Turns heterogeneous vendor version text into comparable tokens and defines
//! the ordering used by the rest of the crate.
//!
//! # Modules
//!
//! - [`token`]: `VersionToken` extraction (dotted-numeric and build-number forms)
//! - [`compare`]: `VersionScheme` strategies and comparison helpers
//! - [`error`]: `MalformedVersion`

pub mod compare;
pub mod error;
pub mod token;

pub use compare::{Comparison, Confidence, VersionScheme, compare, compare_lenient};
pub use error::VersionError;
pub use token::{NumericVersion, VersionToken};
