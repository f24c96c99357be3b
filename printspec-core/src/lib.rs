#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

/// The in-memory map model the compiler reads from.
pub mod model;

/// Read-only collaborators injected into the compiler.
pub mod registry;

pub mod geometry;
pub mod rules;
pub mod style;

pub mod layers;
pub mod legend;
pub mod scale;

mod job;
pub use job::{GatherOutcome, PendingJob, PrintReport, gather_metadata, run_print_job};

pub mod spec;

mod error;
pub use error::{PrintError, PrintResult};
