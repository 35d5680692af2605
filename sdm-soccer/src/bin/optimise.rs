use std::env;
use std::error::Error;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{anyhow, bail};
use clap::Parser;
use tracing::{debug, info};

use sdm::file::ReadJsonFile;
use sdm_soccer::backtest::BacktestConfig;
use sdm_soccer::impact::KeyPlayerImpact;
use sdm_soccer::optimise::{optimise, Dimension, OptimiserConfig, ParamsFile, SearchDimension};
use sdm_soccer::rating::RatingArchive;
use sdm_soccer::strength::ModelConfig;
use sdm_soccer::validation::Dataset;

#[derive(Debug, clap::Parser, Clone)]
struct Args {
    /// file or directory to source the contest records from
    dataset: Option<PathBuf>,

    /// rating archive
    #[clap(short = 'r', long)]
    ratings: Option<PathBuf>,

    /// starting parameters
    #[clap(short = 'p', long)]
    params: Option<PathBuf>,

    /// where to write the optimised parameters
    #[clap(short = 'o', long, default_value = "best_params.json")]
    output: PathBuf,

    /// parameters to search over; all of them if omitted
    #[clap(long, value_parser = parse_dimension, value_delimiter = ',')]
    dimensions: Vec<Dimension>,

    /// search steps
    #[clap(long, default_value = "4")]
    steps: u64,

    /// grid points per dimension and step
    #[clap(long, default_value = "3")]
    resolution: usize,
}
impl Args {
    fn validate(&self) -> anyhow::Result<()> {
        self.dataset
            .as_ref()
            .ok_or(anyhow!("dataset must be specified"))?;
        if self.steps == 0 {
            bail!("at least one search step is required");
        }
        Ok(())
    }
}
fn parse_dimension(s: &str) -> anyhow::Result<Dimension> {
    match s.to_lowercase().as_str() {
        "w_xg" => Ok(Dimension::WXg),
        "w_elo" => Ok(Dimension::WElo),
        "rho" => Ok(Dimension::Rho),
        "hfa" => Ok(Dimension::Hfa),
        "confidence_shrinkage" | "shrinkage" => Ok(Dimension::ConfidenceShrinkage),
        _ => Err(anyhow!("unsupported dimension {s}")),
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

    let mut config = BacktestConfig::default();
    if let Some(params) = &args.params {
        config.model = ModelConfig::read_params_file(params)?;
    }
    let ratings: RatingArchive = match &args.ratings {
        Some(path) => RatingArchive::read_json_file(path)?,
        None => RatingArchive::default(),
    };

    let path = args.dataset.as_ref().ok_or(anyhow!("dataset must be specified"))?;
    let dataset = if path.is_dir() {
        Dataset::read_json_dir(path)?
    } else {
        Dataset::read_json_file(path)?
    };
    info!("loaded {} contest(s), rejected {}", dataset.len(), dataset.rejections.len());

    let mut optimiser = OptimiserConfig {
        max_steps: args.steps,
        resolution: args.resolution,
        ..OptimiserConfig::default()
    };
    if !args.dimensions.is_empty() {
        optimiser.dimensions = args
            .dimensions
            .iter()
            .map(|&dimension| SearchDimension {
                dimension,
                bounds: dimension.default_bounds(),
            })
            .collect();
    }

    let start_time = Instant::now();
    let outcome = optimise(&config, &ratings, &KeyPlayerImpact::default(), &dataset.contests, &optimiser)?;
    let elapsed = start_time.elapsed();
    info!(
        "loss {:.6} -> {:.6} over {} contest(s), {} evaluation(s) in {:.3}s",
        outcome.initial_loss,
        outcome.replay.loss,
        outcome.replay.evaluated,
        outcome.evaluations,
        elapsed.as_millis() as f64 / 1_000.
    );
    info!("optimal parameters: {:?}", outcome.config);

    ParamsFile::new(&outcome, &optimiser.weights).write(&args.output)?;
    info!("parameters written to {}", args.output.display());
    Ok(())
}
