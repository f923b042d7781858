//! Library surface of the `ehr-compactor` binary: argument definitions,
//! subcommand drivers, logging setup, and the summary printer.

pub mod cli;
pub mod commands;
pub mod logging;
pub mod summary;
