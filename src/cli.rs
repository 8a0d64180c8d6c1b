/// CLI Module
///
/// Command-line interface configuration using clap.
use clap::{Args, Parser, Subcommand};

/// Ethereum Block Data Collector - ETL Pipeline
///
/// Extract, transform, and load Ethereum blockchain data into PostgreSQL
/// and MongoDB
#[derive(Parser, Debug)]
#[command(name = "eth-data-collector")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Collect blockchain data from the Ethereum network
    Collect(CollectArgs),
    /// Show record counts and the latest stored block per backend
    Status(BackendArgs),
    /// Test chain connectivity and store round-trips end to end
    Test(BackendArgs),
}

/// Which record stores a command operates on. With no flag given, both
/// backends are active.
#[derive(Args, Debug, Clone, Default)]
pub struct BackendArgs {
    /// Use the PostgreSQL store
    #[arg(long)]
    pub postgres: bool,

    /// Use the MongoDB store
    #[arg(long)]
    pub mongodb: bool,
}

impl BackendArgs {
    pub fn use_postgres(&self) -> bool {
        self.postgres || !self.mongodb
    }

    pub fn use_mongodb(&self) -> bool {
        self.mongodb || !self.postgres
    }
}

#[derive(Args, Debug)]
pub struct CollectArgs {
    /// Number of latest blocks to collect (e.g., --latest 10)
    #[arg(long, value_name = "N", conflicts_with_all = ["historical", "scheduled"])]
    pub latest: Option<u64>,

    /// Collect historical blocks (use with --start and --end)
    #[arg(long, conflicts_with = "scheduled")]
    pub historical: bool,

    /// Starting block number for historical collection
    #[arg(long, value_name = "BLOCK")]
    pub start: Option<u64>,

    /// Ending block number for historical collection (0 means chain tip)
    #[arg(long, value_name = "BLOCK")]
    pub end: Option<u64>,

    /// Run continuous scheduled collection
    #[arg(long)]
    pub scheduled: bool,

    /// Collection interval in minutes for scheduled collection
    #[arg(long, value_name = "MINUTES", default_value = "5")]
    pub interval: u64,

    /// Blocks per batch for historical backfills (overrides BATCH_SIZE)
    #[arg(long, value_name = "SIZE")]
    pub batch_size: Option<u64>,

    /// JSON-RPC endpoint URL (overrides ETH_RPC_URL env var)
    #[arg(long, value_name = "URL")]
    pub rpc_url: Option<String>,

    #[command(flatten)]
    pub backends: BackendArgs,
}

impl CollectArgs {
    /// Validate flag combinations clap cannot express.
    pub fn validate(&self) -> anyhow::Result<()> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if end != 0 && start > end {
                anyhow::bail!("start block ({}) must be less than or equal to end block ({})", start, end);
            }
        }

        if self.scheduled && self.interval == 0 {
            anyhow::bail!("collection interval must be greater than 0 minutes");
        }

        if self.batch_size == Some(0) {
            anyhow::bail!("batch size must be greater than 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn defaults_to_both_backends() {
        let backends = BackendArgs::default();
        assert!(backends.use_postgres());
        assert!(backends.use_mongodb());
    }

    #[test]
    fn single_backend_flag_disables_the_other() {
        let cli = Cli::try_parse_from(["eth-data-collector", "collect", "--latest", "10", "--postgres"]).unwrap();
        let Command::Collect(args) = cli.command else { panic!("expected collect") };
        assert!(args.backends.use_postgres());
        assert!(!args.backends.use_mongodb());
    }

    #[test]
    fn latest_conflicts_with_historical() {
        let result =
            Cli::try_parse_from(["eth-data-collector", "collect", "--latest", "10", "--historical"]);
        assert!(result.is_err());
    }

    #[test]
    fn historical_range_is_validated() {
        let cli = Cli::try_parse_from([
            "eth-data-collector",
            "collect",
            "--historical",
            "--start",
            "1100",
            "--end",
            "1000",
        ])
        .unwrap();
        let Command::Collect(args) = cli.command else { panic!("expected collect") };
        assert!(args.validate().is_err());
    }

    #[test]
    fn end_zero_means_chain_tip_and_passes_validation() {
        let cli = Cli::try_parse_from([
            "eth-data-collector",
            "collect",
            "--historical",
            "--start",
            "1000",
            "--end",
            "0",
        ])
        .unwrap();
        let Command::Collect(args) = cli.command else { panic!("expected collect") };
        assert!(args.validate().is_ok());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let cli = Cli::try_parse_from([
            "eth-data-collector",
            "collect",
            "--latest",
            "10",
            "--batch-size",
            "0",
        ])
        .unwrap();
        let Command::Collect(args) = cli.command else { panic!("expected collect") };
        assert!(args.validate().is_err());
    }
}
