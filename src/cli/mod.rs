//! CLI module for the access layer
//!
//! Provides command-line interface for:
//! - translate: Reserialize a filter under another operator prefix
//! - combine: Intersect or unite two access values
//! - resolve: Resolve a caller's grant from permission records

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, CombineOp, Command};
pub use commands::{
    combine, combine_access, resolve, resolve_access, run, run_command, translate,
    translate_filter,
};
pub use errors::{CliError, CliResult};
pub use io::{read_request, write_error, write_response};
