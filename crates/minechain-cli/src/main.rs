use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use minechain_core::{
    constants::DEFAULT_WORKERS, default_payloads, Block, ConfigError, Coordinator,
    CoordinatorError, Difficulty, MiningConfig, RunReport, SearchMode,
};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "minechain")]
#[command(about = "Race concurrent proof-of-work miners to build an in-memory chain")]
struct Args {
    /// Number of miners (ignored when --payload is given)
    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Leading zero hex digits each block hash needs (1-64)
    #[arg(short, long, default_value_t = Difficulty::default())]
    difficulty: Difficulty,

    /// Payload for one miner; repeat for more miners
    #[arg(short, long = "payload")]
    payloads: Vec<String>,

    /// Split every miner's nonce search across the rayon pool
    #[arg(long)]
    parallel_search: bool,

    /// Cancel the run after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Output format for the final chain
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

impl Args {
    fn config(&self) -> MiningConfig {
        let search_mode = if self.parallel_search {
            SearchMode::Parallel
        } else {
            SearchMode::Sequential
        };
        let mut config = MiningConfig::default()
            .with_workers(self.workers)
            .with_difficulty(self.difficulty)
            .with_search_mode(search_mode);
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        config
    }

    fn payloads(&self) -> Vec<String> {
        if self.payloads.is_empty() {
            default_payloads(self.workers)
        } else {
            self.payloads.clone()
        }
    }

    /// Payloads and the config that will mine them. The worker count is the
    /// number of payloads, so `--workers` only matters without `--payload`.
    fn plan(&self) -> Result<(MiningConfig, Vec<String>), ConfigError> {
        let payloads = self.payloads();
        let config = self.config().with_workers(payloads.len());
        config.validate()?;
        Ok((config, payloads))
    }
}

fn print_chain(chain: &[Block], format: Format) -> Result<()> {
    match format {
        Format::Text => {
            for block in chain {
                println!("{block:#?}");
            }
        }
        Format::Json => {
            let json = serde_json::to_string_pretty(chain).context("serializing chain")?;
            println!("{json}");
        }
    }
    Ok(())
}

fn print_summary(report: &RunReport) {
    eprintln!(
        "{} blocks mined in {:.2?}",
        report.chain.len() - 1,
        report.elapsed
    );
    for r in &report.reports {
        eprintln!(
            "  miner {:>3} -> index {:>3}  attempts {:>2}  hashes {}",
            r.worker_id, r.block.index, r.attempts, r.hashes
        );
    }
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let (config, payloads) = args.plan()?;
    info!(miners = payloads.len(), difficulty = %args.difficulty, "minechain starting");

    match Coordinator::new(config).run(payloads) {
        Ok(report) => {
            print_chain(&report.chain, args.format)?;
            print_summary(&report);
            Ok(())
        }
        Err(CoordinatorError::TimedOut {
            completed,
            workers,
            chain,
        }) => {
            print_chain(&chain, args.format)?;
            bail!("timed out: {completed} of {workers} miners landed a block");
        }
        Err(e) => Err(e).context("mining run failed"),
    }
}
