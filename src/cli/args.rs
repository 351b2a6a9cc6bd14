//! CLI argument definitions using clap
//!
//! Commands:
//! - aerodb-access translate --config <path> [--from P] [--to P]
//! - aerodb-access combine --config <path> --op intersect|unite
//! - aerodb-access resolve --config <path>

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// AeroDB access layer tools: filter translation and grant algebra
#[derive(Parser, Debug)]
#[command(name = "aerodb-access")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Reserialize a filter literal under another operator prefix
    Translate {
        /// Path to configuration file
        #[arg(long, default_value = "./aerodb-access.json")]
        config: PathBuf,

        /// Prefix of the input filter (default: operator_prefix)
        #[arg(long)]
        from: Option<String>,

        /// Prefix of the output filter (default: storage_prefix)
        #[arg(long)]
        to: Option<String>,
    },

    /// Combine two access values read as {"left": .., "right": ..}
    Combine {
        /// Path to configuration file
        #[arg(long, default_value = "./aerodb-access.json")]
        config: PathBuf,

        #[arg(long, value_enum)]
        op: CombineOp,
    },

    /// Resolve the grant of a caller from a permission list
    Resolve {
        /// Path to configuration file
        #[arg(long, default_value = "./aerodb-access.json")]
        config: PathBuf,
    },
}

/// Access value combinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CombineOp {
    Intersect,
    Unite,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
