//! # gp-core
//!
//! Shared error taxonomy and result types for gofpower.
//!
//! Every other crate in the workspace reports failures through
//! [`Error`] so that configuration mistakes, numerical breakdowns and
//! corrupt dataset caches stay distinguishable all the way up to the CLI.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{TestOutput, TrialRecord};
