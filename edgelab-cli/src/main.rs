//! EdgeLab CLI: backtest, sweep, and forecast ensemble commands.
//!
//! Commands:
//! - `run`: execute a backtest from a TOML config on CSV or synthetic bars
//! - `sweep`: run a crossover parameter grid in parallel and rank the results
//! - `ensemble`: combine forecast columns from a CSV under a policy

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use edgelab_core::domain::BarSeries;
use edgelab_core::ensemble::{CombinePolicy, Ensemble};
use edgelab_core::metrics::BacktestStats;
use edgelab_core::strategy::ModelLoader;
use edgelab_runner::{
    load_bars_csv, load_forecasts_csv, run_and_persist, run_backtest, ArtifactCache,
    BacktestConfig, CrossoverGrid, DirFetcher, JsonFileSink, JsonModelLoader, ParamSweep,
    RankBy, RunOutcome, SyntheticBars, SyntheticConfig, Y_TRUE_COLUMN,
};

#[derive(Parser)]
#[command(
    name = "edgelab",
    about = "EdgeLab CLI: strategy backtesting and forecast ensembles"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a TOML config file.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        #[command(flatten)]
        data: DataArgs,

        /// Directory holding model artifacts. Enables the local artifact cache.
        #[arg(long)]
        model_dir: Option<PathBuf>,

        /// Artifact cache directory (with --model-dir).
        #[arg(long, default_value = "model_cache")]
        cache_dir: PathBuf,

        /// Write the result record as JSON into this directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Sweep moving-average crossover periods.
    Sweep {
        /// Base TOML config; its strategy section is replaced per run.
        #[arg(long)]
        config: PathBuf,

        #[command(flatten)]
        data: DataArgs,

        /// Fast periods, comma separated.
        #[arg(long, value_delimiter = ',', default_values_t = [5usize, 10, 20])]
        fast: Vec<usize>,

        /// Slow periods, comma separated.
        #[arg(long, value_delimiter = ',', default_values_t = [20usize, 50, 100])]
        slow: Vec<usize>,

        /// Ranking metric: sharpe, sortino, calmar, total_return.
        #[arg(long, default_value = "sharpe")]
        rank_by: String,

        /// Number of ranked entries to print.
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Run sequentially instead of on the rayon pool.
        #[arg(long, default_value_t = false)]
        sequential: bool,
    },
    /// Combine parallel forecasts from a CSV (one column per model).
    Ensemble {
        /// Forecast CSV. A `y_true` column, if present, is used for fitting.
        #[arg(long)]
        forecasts: PathBuf,

        /// Combination policy: mean, geometric_mean, weighted_avg.
        #[arg(long, default_value = "mean")]
        method: String,

        /// Explicit weights for weighted_avg, comma separated.
        #[arg(long, value_delimiter = ',')]
        weights: Option<Vec<f64>>,

        /// Name of the realised-values column.
        #[arg(long, default_value = Y_TRUE_COLUMN)]
        y_true_column: String,

        /// Write the combined series to this CSV instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

/// Where bars come from. Exactly one of --bars or --synthetic.
#[derive(Args)]
struct DataArgs {
    /// CSV with timestamp,open,high,low,close,volume columns.
    #[arg(long, conflicts_with = "synthetic")]
    bars: Option<PathBuf>,

    /// Generate this many synthetic bars instead of reading a CSV.
    #[arg(long)]
    synthetic: Option<usize>,

    /// Seed for --synthetic.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

impl DataArgs {
    fn load(&self, config: &BacktestConfig) -> Result<BarSeries> {
        match (&self.bars, self.synthetic) {
            (Some(path), _) => load_bars_csv(path)
                .with_context(|| format!("failed to load bars from {}", path.display())),
            (None, Some(n_bars)) => {
                info!(n_bars, seed = self.seed, "generating synthetic bars");
                let source = SyntheticBars::new(SyntheticConfig {
                    seed: self.seed,
                    n_bars,
                    frequency: config.frequency()?,
                    ..SyntheticConfig::default()
                });
                Ok(source.generate(&config.backtest.symbol)?)
            }
            (None, None) => bail!("one of --bars or --synthetic is required"),
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            data,
            model_dir,
            cache_dir,
            output_dir,
        } => run_cmd(&config, &data, model_dir, &cache_dir, output_dir.as_deref()),
        Commands::Sweep {
            config,
            data,
            fast,
            slow,
            rank_by,
            top,
            sequential,
        } => sweep_cmd(&config, &data, fast, slow, &rank_by, top, sequential),
        Commands::Ensemble {
            forecasts,
            method,
            weights,
            y_true_column,
            output,
        } => ensemble_cmd(&forecasts, &method, weights, &y_true_column, output.as_deref()),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run_cmd(
    config_path: &Path,
    data: &DataArgs,
    model_dir: Option<PathBuf>,
    cache_dir: &Path,
    output_dir: Option<&Path>,
) -> Result<()> {
    let config = BacktestConfig::load(config_path)?;
    let bars = data.load(&config)?;

    let cache = match model_dir {
        Some(dir) => Some(Arc::new(ArtifactCache::new(
            cache_dir,
            Arc::new(DirFetcher::new(dir)),
        )?)),
        None => None,
    };
    let loader = match &cache {
        Some(cache) => JsonModelLoader::with_cache(Arc::clone(cache)),
        None => JsonModelLoader::new(),
    };
    let loader_ref: Option<&dyn ModelLoader> = Some(&loader);

    let outcome = match output_dir {
        Some(dir) => {
            let sink = JsonFileSink::new(dir)?;
            let outcome = run_and_persist(&config, &bars, loader_ref, &sink)?;
            println!(
                "Result saved to: {}",
                sink.record_path(&outcome.run_id).display()
            );
            outcome
        }
        None => run_backtest(&config, &bars, loader_ref)?,
    };

    if let Some(cache) = &cache {
        let evicted = cache.evict_expired()?;
        if evicted > 0 {
            info!(evicted, "evicted stale model artifacts");
        }
    }

    print_summary(&outcome);
    Ok(())
}

fn sweep_cmd(
    config_path: &Path,
    data: &DataArgs,
    fast: Vec<usize>,
    slow: Vec<usize>,
    rank_by: &str,
    top: usize,
    sequential: bool,
) -> Result<()> {
    let rank_by = parse_rank_by(rank_by)?;
    let config = BacktestConfig::load(config_path)?;
    let bars = data.load(&config)?;

    let grid = CrossoverGrid::new(fast, slow);
    if grid.size() == 0 {
        bail!("the grid has no (fast, slow) pair with fast < slow");
    }
    let results = ParamSweep::new(grid)
        .with_parallelism(!sequential)
        .run(&config, &bars)?;

    println!();
    println!(
        "{:<5} {:>5} {:>5} {:>10} {:>8} {:>8} {:>9} {:>7}",
        "Rank", "Fast", "Slow", "Return%", "Sharpe", "Sortino", "MaxDD%", "Trades"
    );
    println!("{}", "-".repeat(64));
    for (i, entry) in results.ranked(rank_by).into_iter().take(top).enumerate() {
        let s = &entry.stats;
        println!(
            "{:<5} {:>5} {:>5} {:>10.2} {:>8.3} {:>8.3} {:>9.2} {:>7}",
            i + 1,
            entry.fast,
            entry.slow,
            s.total_return,
            s.sharpe_ratio,
            s.sortino_ratio,
            s.max_drawdown,
            s.total_trades
        );
    }
    println!();
    Ok(())
}

fn parse_rank_by(s: &str) -> Result<RankBy> {
    Ok(match s.trim().to_ascii_lowercase().as_str() {
        "sharpe" | "sharpe_ratio" => RankBy::SharpeRatio,
        "sortino" | "sortino_ratio" => RankBy::SortinoRatio,
        "calmar" | "calmar_ratio" => RankBy::CalmarRatio,
        "return" | "total_return" => RankBy::TotalReturn,
        other => bail!("unknown ranking metric '{other}'. Valid: sharpe, sortino, calmar, total_return"),
    })
}

fn ensemble_cmd(
    forecasts_path: &Path,
    method: &str,
    weights: Option<Vec<f64>>,
    y_true_column: &str,
    output: Option<&Path>,
) -> Result<()> {
    let policy: CombinePolicy = method.parse()?;
    let table = load_forecasts_csv(forecasts_path, y_true_column)?;

    let mut ensemble = match weights {
        Some(w) => {
            if policy != CombinePolicy::WeightedAvg {
                bail!("--weights only applies to weighted_avg");
            }
            Ensemble::with_weights(w)?
        }
        None => Ensemble::new(policy),
    };
    ensemble.fit(&table.forecasts, table.y_true.as_deref())?;
    let combined = ensemble.predict(&table.forecasts)?;

    if let Some(w) = ensemble.weights() {
        for (name, weight) in table.model_names.iter().zip(w) {
            info!(model = %name, weight, "ensemble weight");
        }
    }

    match output {
        Some(path) => {
            let mut wtr = csv::Writer::from_path(path)?;
            wtr.write_record(["step", "ensemble"])?;
            for (t, v) in combined.iter().enumerate() {
                wtr.write_record(&[t.to_string(), v.to_string()])?;
            }
            wtr.flush()?;
            println!("Combined {} steps into {}", combined.len(), path.display());
        }
        None => {
            for v in &combined {
                println!("{v}");
            }
        }
    }
    Ok(())
}

fn print_summary(outcome: &RunOutcome) {
    let s: &BacktestStats = &outcome.stats;
    let r = &outcome.result;
    println!();
    println!("=== Backtest Result ===");
    println!("Run:            {}", outcome.run_id);
    println!("Symbol:         {}", outcome.symbol);
    println!("Strategy:       {}", s.strategy_name);
    println!("Engine:         {}", r.engine);
    if let (Some(first), Some(last)) = (r.equity_curve.first(), r.equity_curve.last()) {
        println!("Period:         {} to {}", first.timestamp, last.timestamp);
    }
    println!("Bars:           {}", r.equity_curve.len());
    println!(
        "Trades:         {} ({} won, {} lost)",
        s.total_trades, s.winning_trades, s.losing_trades
    );
    println!();
    println!("--- Performance ---");
    println!("Final Value:    {:.2}", s.final_value);
    println!("Total Return:   {:.2}%", s.total_return);
    println!("Sharpe:         {:.3}", s.sharpe_ratio);
    println!("Sortino:        {:.3}", s.sortino_ratio);
    println!("Calmar:         {:.3}", s.calmar_ratio);
    println!("Max Drawdown:   {:.2}%", s.max_drawdown);
    println!("Win Rate:       {:.1}%", s.win_rate);
    println!("Profit Factor:  {:.2}", s.profit_factor);
    println!("Max Consec Win: {}", s.max_consecutive_wins);
    println!("Max Consec Loss:{}", s.max_consecutive_losses);
    if r.fallback_used {
        println!();
        println!("NOTE: strategy produced no round trip; fallback up/down signals were used");
    }
    println!();
}
