//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::{self, CsvBarSource};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::paper_adapter::PaperBroker;
use crate::domain::config_validation::{load_settings, FeatureSettings, Settings};
use crate::domain::decision_loop::{DecisionLoop, RunSummary};
use crate::domain::error::BarwiseError;
use crate::domain::exit_rules::{StopTargetExit, TrailingStopExit};
use crate::domain::feature::{FeatureEngine, FeatureLogic, FeatureVector};
use crate::domain::strategy::MaCrossStrategy;
use crate::ports::bar_source::BarSource;
use crate::ports::config_port::ConfigPort;

#[derive(Parser, Debug)]
#[command(name = "barwise", about = "Bar-driven trading loop and feature engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay a CSV through the decision loop against the paper broker
    Replay {
        #[arg(short, long)]
        config: PathBuf,
        /// Overrides [feed] data
        #[arg(short, long)]
        data: Option<PathBuf>,
    },
    /// Stream feature vectors from a CSV
    Features {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Write vectors here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Check the streaming path against the bulk path first
        #[arg(long)]
        verify: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Replay { config, data } => run_replay(&config, data.as_deref()),
        Command::Features {
            config,
            data,
            output,
            verify,
        } => run_features(&config, data.as_deref(), output.as_deref(), verify),
        Command::Validate { config } => run_validate(&config),
    }
}

fn report(err: BarwiseError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(report)
}

/// Render a settings error. Feature parse errors point a caret at the
/// offending character of `[features] columns`.
pub fn describe_settings_error(err: &BarwiseError, config: &dyn ConfigPort) -> String {
    match (err, config.get_string("features", "columns")) {
        (BarwiseError::FeatureParse(pe), Some(columns)) => {
            format!("error in [features] columns:\n{}", pe.display_with_context(&columns))
        }
        _ => format!("error: {err}"),
    }
}

fn load(config_path: &Path) -> Result<Settings, ExitCode> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;
    load_settings(&adapter).map_err(|err| {
        eprintln!("{}", describe_settings_error(&err, &adapter));
        ExitCode::from(&err)
    })
}

/// CLI override first, then `[feed] data`.
pub fn resolve_data_path(
    override_path: Option<&Path>,
    settings: &Settings,
) -> Result<PathBuf, BarwiseError> {
    override_path
        .map(Path::to_path_buf)
        .or_else(|| settings.feed.data.clone())
        .ok_or_else(|| BarwiseError::ConfigMissing {
            section: "feed".into(),
            key: "data".into(),
        })
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayReport {
    pub summary: RunSummary,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub closed_trades: usize,
    pub open_positions: usize,
}

/// Build the strategy and paper broker from `settings` and drive the loop
/// over `source` until it is exhausted.
pub fn run_replay_pipeline(
    settings: &Settings,
    source: &mut dyn BarSource,
) -> Result<ReplayReport, BarwiseError> {
    let mut strategy =
        MaCrossStrategy::new(settings.strategy.clone())?.with_exit_rule(StopTargetExit);
    if settings.trailing_stop_pct > 0.0 {
        strategy = strategy.with_exit_rule(TrailingStopExit::new(settings.trailing_stop_pct));
    }
    let broker = PaperBroker::new(
        settings.broker.initial_balance,
        settings.broker.execution.clone(),
    );

    let mut decision_loop = DecisionLoop::new(
        settings.feed.symbol.clone(),
        settings.window_size,
        strategy,
        broker,
    )?;
    let summary = decision_loop.run(source)?;
    let (_, broker) = decision_loop.into_parts();

    Ok(ReplayReport {
        summary,
        initial_balance: broker.initial_balance(),
        final_balance: broker.balance(),
        closed_trades: broker.closed_trades().len(),
        open_positions: broker.open_count(),
    })
}

fn run_replay(config_path: &Path, data: Option<&Path>) -> ExitCode {
    let settings = match load(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let data_path = match resolve_data_path(data, &settings) {
        Ok(p) => p,
        Err(e) => return report(e),
    };

    eprintln!("Reading bars from {}", data_path.display());
    let mut source = match CsvBarSource::from_path(&data_path, settings.feed.limit) {
        Ok(s) => s,
        Err(e) => return report(e),
    };
    eprintln!(
        "Replaying {} {} bars of {} (window {})",
        source.len(),
        settings.feed.timeframe,
        settings.feed.symbol,
        settings.window_size
    );

    match run_replay_pipeline(&settings, &mut source) {
        Ok(outcome) => {
            eprintln!("\nBars:            {}", outcome.summary.bars);
            eprintln!("Evaluated:       {}", outcome.summary.evaluated);
            eprintln!("Entries:         {}", outcome.summary.entries_submitted);
            eprintln!("Exits applied:   {}", outcome.summary.exits_applied);
            eprintln!("Closed trades:   {}", outcome.closed_trades);
            eprintln!("Open positions:  {}", outcome.open_positions);
            eprintln!("Initial balance: {:.2}", outcome.initial_balance);
            eprintln!("Final balance:   {:.2}", outcome.final_balance);
            ExitCode::SUCCESS
        }
        Err(e) => report(e),
    }
}

/// Write vectors as CSV: a `time` column followed by `names`. Absent values
/// are written as empty fields.
pub fn write_feature_csv<W: io::Write>(
    writer: W,
    names: &[String],
    vectors: &[FeatureVector],
) -> Result<(), BarwiseError> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut header = vec!["time".to_string()];
    header.extend(names.iter().cloned());
    wtr.write_record(&header).map_err(io::Error::from)?;

    for vector in vectors {
        let mut record = vec![vector.time.format("%Y-%m-%d %H:%M:%S").to_string()];
        record.extend(
            names
                .iter()
                .map(|n| vector.get(n).map(|v| v.to_string()).unwrap_or_default()),
        );
        wtr.write_record(&record).map_err(io::Error::from)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Stream `data_path` through a fresh engine, optionally verifying it
/// against the bulk path first.
pub fn run_features_pipeline(
    features: &FeatureSettings,
    data_path: &Path,
    limit: Option<usize>,
    verify: bool,
) -> Result<(Vec<String>, Vec<FeatureVector>), BarwiseError> {
    let rows = csv_adapter::read_raw_file(data_path, limit)?;
    let mut engine = FeatureEngine::new(features.logic.clone(), features.window)?;

    if verify {
        let compared = engine.verify_equivalence(&rows)?;
        eprintln!("Streaming and bulk paths agree on {compared} rows");
    }

    let mut source = CsvBarSource::from_rows(&rows)?;
    let vectors = engine.stream_from_source(&mut source)?;
    Ok((engine.feature_names(), vectors))
}

fn run_features(
    config_path: &Path,
    data: Option<&Path>,
    output: Option<&Path>,
    verify: bool,
) -> ExitCode {
    let settings = match load(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let Some(features) = settings.features.as_ref() else {
        return report(BarwiseError::ConfigMissing {
            section: "features".into(),
            key: "columns".into(),
        });
    };
    let data_path = match resolve_data_path(data, &settings) {
        Ok(p) => p,
        Err(e) => return report(e),
    };

    eprintln!(
        "Computing {} features over {} (needs {} bars)",
        features.logic.feature_names().len(),
        data_path.display(),
        features.logic.min_bars()
    );
    let limit = settings.feed.limit;
    let (names, vectors) = match run_features_pipeline(features, &data_path, limit, verify) {
        Ok(out) => out,
        Err(e) => return report(e),
    };

    let written = match output {
        Some(path) => fs::File::create(path)
            .map_err(BarwiseError::from)
            .and_then(|file| write_feature_csv(file, &names, &vectors)),
        None => write_feature_csv(io::stdout().lock(), &names, &vectors),
    };
    match written {
        Ok(()) => {
            eprintln!("Wrote {} feature vectors", vectors.len());
            ExitCode::SUCCESS
        }
        Err(e) => report(e),
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let settings = match load(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };

    eprintln!("\nFeed:     {} {}", settings.feed.symbol, settings.feed.timeframe);
    if let Some(data) = &settings.feed.data {
        eprintln!("  Data:   {}", data.display());
    }
    eprintln!("Window:   {} bars", settings.window_size);
    eprintln!(
        "Strategy: SMA({}) x SMA({}), size {}, max positions {}",
        settings.strategy.fast_period,
        settings.strategy.slow_period,
        settings.strategy.position_size,
        settings.strategy.max_positions
    );
    if let Some(features) = &settings.features {
        let specs: Vec<String> = features.logic.specs().iter().map(|s| s.to_string()).collect();
        eprintln!("Features: {}", specs.join(", "));
        eprintln!("  Needs:  {} bars", features.logic.min_bars());
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}
