// CLI module
// Command-line interface and argument parsing

mod args;

pub use args::{CliArgs, Command, ImportArgs, PollArgs, StrategyType};

use clap::Parser;

/// Parse command-line arguments using clap
///
/// On invalid arguments or `--help` clap prints the message and exits the
/// process.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}
