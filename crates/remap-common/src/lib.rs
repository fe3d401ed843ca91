//! Remap Common — types and helpers shared by every remap crate.
//!
//! Holds the ISD-AS identity type, installation-root path layout,
//! encoding helpers and the error-kind table the binary maps to exit codes.

pub mod encoding;
pub mod error;
pub mod paths;
pub mod types;

pub use types::{Ia, IaError};
