#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

pub mod args;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod snapshot;
pub mod transport;

mod error;
pub use error::{PrintCliError, PrintCliResult};

mod run;
pub use run::print;
