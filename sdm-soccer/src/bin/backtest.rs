use std::env;
use std::error::Error;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{anyhow, bail};
use clap::Parser;
use stanza::renderer::console::Console;
use stanza::renderer::Renderer;
use tracing::{debug, info};

use sdm::file::{write_json, ReadJsonFile};
use sdm::stake::Strategy;
use sdm_soccer::backtest::{Backtest, BacktestConfig};
use sdm_soccer::impact::KeyPlayerImpact;
use sdm_soccer::print::{tabulate_buckets, tabulate_calibrators, tabulate_markets, tabulate_summary};
use sdm_soccer::rating::RatingArchive;
use sdm_soccer::strength::ModelConfig;
use sdm_soccer::synthetic::{generate, SeasonConfig};
use sdm_soccer::validation::Dataset;

#[derive(Debug, clap::Parser, Clone)]
struct Args {
    /// file or directory to source the contest records from
    dataset: Option<PathBuf>,

    /// replay a synthetic season generated from this seed instead
    #[clap(long)]
    synthetic: Option<u64>,

    /// number of teams in the synthetic season
    #[clap(long, default_value = "10")]
    teams: usize,

    /// rating archive
    #[clap(short = 'r', long)]
    ratings: Option<PathBuf>,

    /// model parameters, as written by the optimiser or as a bare object
    #[clap(short = 'p', long)]
    params: Option<PathBuf>,

    /// staking strategy
    #[clap(short = 's', long, value_parser = parse_strategy)]
    strategy: Option<Strategy>,

    /// replay only the earliest N contests
    #[clap(long)]
    sample: Option<usize>,

    /// write the report to this file
    #[clap(short = 'd', long)]
    dump: Option<PathBuf>,

    /// include per-contest traces in the report
    #[clap(short = 'c', long)]
    collect: bool,
}
impl Args {
    fn validate(&self) -> anyhow::Result<()> {
        if self.dataset.is_none() == self.synthetic.is_none() {
            bail!("either a dataset or the --synthetic flag must be specified");
        }
        if self.collect && self.dump.is_none() {
            bail!("--collect requires --dump");
        }
        if self.sample == Some(0) {
            bail!("the sample size must be positive");
        }
        Ok(())
    }
}
fn parse_strategy(s: &str) -> anyhow::Result<Strategy> {
    match s.to_lowercase().as_str() {
        "f" | "flat" => Ok(Strategy::Flat),
        "k" | "kelly" => Ok(Strategy::Kelly),
        _ => Err(anyhow!("unsupported staking strategy {s}")),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    if env::var("RUST_BACKTRACE").is_err() {
        env::set_var("RUST_BACKTRACE", "full")
    }
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info")
    }
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    args.validate()?;
    debug!("args: {args:?}");

    let mut config = BacktestConfig {
        sample_size: args.sample,
        collect_traces: args.collect,
        ..BacktestConfig::default()
    };
    if let Some(params) = &args.params {
        config.model = ModelConfig::read_params_file(params)?;
        info!("loaded parameters from {}", params.display());
    }
    if let Some(strategy) = args.strategy {
        config.staking.strategy = strategy;
    }
    config.validate()?;
    debug!("config: {config:?}");

    let (dataset, mut ratings) = load_dataset(&args)?;
    if let Some(path) = &args.ratings {
        ratings = RatingArchive::read_json_file(path)?;
    }
    if ratings.is_empty() {
        info!("no rating archive, every team is rated at {}", config.fallbacks.rating);
    }

    let start_time = Instant::now();
    let report = Backtest::new(config, &ratings, KeyPlayerImpact::default()).run(&dataset);
    let elapsed = start_time.elapsed();

    info!("summary:\n{}", Console::default().render(&tabulate_summary(&report)));
    info!("markets:\n{}", Console::default().render(&tabulate_markets(&report)));
    info!("confidence:\n{}", Console::default().render(&tabulate_buckets(&report)));
    info!("calibrators:\n{}", Console::default().render(&tabulate_calibrators(&report)));
    info!("replayed {} contest(s) in {:.3}s", dataset.len(), elapsed.as_millis() as f64 / 1_000.);

    if let Some(path) = &args.dump {
        write_json(path, &report)?;
        info!("report written to {}", path.display());
    }
    Ok(())
}

fn load_dataset(args: &Args) -> anyhow::Result<(Dataset, RatingArchive)> {
    if let Some(seed) = args.synthetic {
        let season = generate(&SeasonConfig {
            seed,
            teams: args.teams,
            ..SeasonConfig::default()
        })?;
        info!("generated a synthetic season of {} contest(s)", season.contests.len());
        let dataset = Dataset {
            contests: season.contests,
            rejections: vec![],
        };
        return Ok((dataset, season.ratings));
    }

    let path = args.dataset.as_ref().ok_or(anyhow!("dataset must be specified"))?;
    let dataset = if path.is_dir() {
        Dataset::read_json_dir(path)?
    } else {
        Dataset::read_json_file(path)?
    };
    info!(
        "loaded {} contest(s) from {}, rejected {}",
        dataset.len(),
        path.display(),
        dataset.rejections.len()
    );
    Ok((dataset, RatingArchive::default()))
}
