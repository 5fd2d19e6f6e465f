use crate::config::Config;
use crate::strategy::WorkerConfig;
use crate::types::ArtifactKind;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Import legacy HLZ files into the deposit system
#[derive(Parser, Debug)]
#[command(name = "hlz-importer")]
#[command(about = "Import legacy HLZ files into the deposit system", long_about = None)]
pub struct CliArgs {
    /// Configuration file
    #[arg(
        long = "config",
        value_name = "PATH",
        global = true,
        help = "TOML configuration file (default: $HLZ_IMPORTER_CONFIG or hlz-importer.toml)"
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import every file waiting in the `from` directory
    Poll(PollArgs),
    /// Import a single announced file, retrying the integrity check
    Import(ImportArgs),
    /// Move accepted files to `in-queue` and request their export
    Export {
        #[arg(long, value_name = "KIND")]
        kind: ArtifactKind,
    },
    /// Record the export result of a file in `in-queue`
    Confirm {
        #[arg(long, value_name = "KIND")]
        kind: ArtifactKind,
        /// File name inside `in-queue`
        #[arg(value_name = "FILE")]
        file_name: String,
        /// The export target already held the file
        #[arg(long)]
        already_exists: bool,
    },
    /// Purge dedup entries older than the retention window
    Purge,
}

#[derive(Args, Debug)]
pub struct PollArgs {
    #[arg(long, value_name = "COMPANY")]
    pub company: String,

    #[arg(long, value_name = "KIND")]
    pub kind: ArtifactKind,

    /// Polling strategy
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Polling strategy: 'sync' for one file at a time or 'async' for concurrent workers"
    )]
    pub strategy: StrategyType,

    /// Maximum number of files imported concurrently (async mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Maximum number of files imported concurrently (default: CPU cores)"
    )]
    pub max_concurrent: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    #[arg(long, value_name = "COMPANY")]
    pub company: String,

    #[arg(long, value_name = "KIND")]
    pub kind: ArtifactKind,

    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

/// Available polling strategies
#[derive(Clone, Debug, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl PollArgs {
    /// Worker configuration from the command line, then the config file
    pub fn to_worker_config(&self, config: &Config) -> WorkerConfig {
        match self.max_concurrent.or(config.workers.max_concurrent) {
            Some(max) => WorkerConfig::new(max),
            None => WorkerConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn poll_args(args: &[&str]) -> PollArgs {
        match CliArgs::try_parse_from(args).unwrap().command {
            Command::Poll(poll) => poll,
            other => panic!("Expected poll, got {:?}", other),
        }
    }

    #[rstest]
    #[case::default_strategy(&["program", "poll", "--company", "ACME", "--kind", "bags"], StrategyType::Async)]
    #[case::explicit_sync(&["program", "poll", "--company", "ACME", "--kind", "bags", "--strategy", "sync"], StrategyType::Sync)]
    #[case::explicit_async(&["program", "poll", "--strategy", "async", "--company", "ACME", "--kind", "bags"], StrategyType::Async)]
    fn test_strategy_parsing(#[case] args: &[&str], #[case] expected: StrategyType) {
        let parsed = poll_args(args);
        match (&parsed.strategy, &expected) {
            (StrategyType::Sync, StrategyType::Sync) => (),
            (StrategyType::Async, StrategyType::Async) => (),
            _ => panic!("Expected {:?}, got {:?}", expected, parsed.strategy),
        }
    }

    #[rstest]
    #[case::transactions("transactions", ArtifactKind::Transactions)]
    #[case::label_orders("label-orders", ArtifactKind::LabelOrders)]
    #[case::upper_case("BAGS", ArtifactKind::Bags)]
    fn test_kind_parsing(#[case] kind: &str, #[case] expected: ArtifactKind) {
        let parsed = poll_args(&["program", "poll", "--company", "ACME", "--kind", kind]);
        assert_eq!(parsed.kind, expected);
    }

    #[rstest]
    #[case::defaults(&["program", "poll", "--company", "A", "--kind", "bags"], None, num_cpus::get())]
    #[case::from_config(&["program", "poll", "--company", "A", "--kind", "bags"], Some(6), 6)]
    #[case::cli_wins(&["program", "poll", "--company", "A", "--kind", "bags", "--max-concurrent", "8"], Some(6), 8)]
    #[case::zero_falls_back(&["program", "poll", "--company", "A", "--kind", "bags", "--max-concurrent", "0"], None, num_cpus::get())]
    fn test_worker_config_conversion(
        #[case] args: &[&str],
        #[case] configured: Option<usize>,
        #[case] expected: usize,
    ) {
        let mut config = Config::default();
        config.workers.max_concurrent = configured;

        assert_eq!(poll_args(args).to_worker_config(&config).max_concurrent, expected);
    }

    #[test]
    fn test_import_and_global_config() {
        let parsed = CliArgs::try_parse_from([
            "program",
            "import",
            "--company",
            "ACME",
            "--kind",
            "transactions",
            "in/b1.hlz",
            "--config",
            "etc/hlz.toml",
        ])
        .unwrap();

        assert_eq!(parsed.config, Some(PathBuf::from("etc/hlz.toml")));
        match parsed.command {
            Command::Import(import) => {
                assert_eq!(import.company, "ACME");
                assert_eq!(import.kind, ArtifactKind::Transactions);
                assert_eq!(import.file, PathBuf::from("in/b1.hlz"));
            }
            other => panic!("Expected import, got {:?}", other),
        }
    }

    #[test]
    fn test_confirm_flags() {
        let parsed = CliArgs::try_parse_from([
            "program",
            "confirm",
            "--kind",
            "bags",
            "b1.hlz",
            "--already-exists",
        ])
        .unwrap();

        match parsed.command {
            Command::Confirm {
                kind,
                file_name,
                already_exists,
            } => {
                assert_eq!(kind, ArtifactKind::Bags);
                assert_eq!(file_name, "b1.hlz");
                assert!(already_exists);
            }
            other => panic!("Expected confirm, got {:?}", other),
        }
    }

    #[rstest]
    #[case::missing_command(&["program"])]
    #[case::missing_company(&["program", "poll", "--kind", "bags"])]
    #[case::unknown_kind(&["program", "poll", "--company", "A", "--kind", "crates"])]
    #[case::invalid_strategy(&["program", "poll", "--company", "A", "--kind", "bags", "--strategy", "invalid"])]
    #[case::import_without_file(&["program", "import", "--company", "A", "--kind", "bags"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        assert!(CliArgs::try_parse_from(args).is_err());
    }
}
