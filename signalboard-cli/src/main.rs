//! SignalBoard CLI: rank boards and run scenario backtests from files.
//!
//! Commands:
//! - `rank`: score, classify and plan a snapshot file, then filter/sort it
//! - `sectors`: sector sentiment for a snapshot file
//! - `mtf`: multi-timeframe trend dots for one symbol
//! - `build`: compute snapshots from bar CSV
//! - `backtest`: RSI-trigger scale-in scenario over bar CSV
//!
//! Logging goes to stderr and honours `RUST_LOG` (default `info`).

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::info;

use signalboard_core::board::{apply, BoardFilter, BoardStats, Bucket, Sort, SortDirection, SortKey};
use signalboard_core::config::{ConfigProfiles, TradingConfig};
use signalboard_core::domain::{Direction, Mode, Timeframe};
use signalboard_core::evaluate::rank_board;
use signalboard_core::mtf::{aggregate_for_mode, render_dots};
use signalboard_core::sector::{aggregate_by, SectorLevel};
use signalboard_runner::export::{
    board_markdown, export_board_csv, export_board_json, export_scenario_json, export_sectors_csv,
    export_trades_csv, scenario_markdown, write_artifact,
};
use signalboard_runner::{
    load_bars_csv, load_snapshots, run_scenario, BoardReport, ScenarioParams, SnapshotBuilder,
};

#[derive(Parser)]
#[command(name = "signalboard", about = "SignalBoard: confluence-ranked market signal dashboard")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Table,
    Json,
    Csv,
}

#[derive(Clone, Copy, ValueEnum)]
enum Level {
    Group,
    Subgroup,
}

#[derive(Clone, Copy, ValueEnum)]
enum Action {
    Buy,
    Sell,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank a snapshot file and print the filtered, sorted board.
    Rank {
        /// Snapshot JSON (array or `{"status": "success", "data": [...]}`).
        #[arg(long)]
        snapshots: PathBuf,

        /// TOML with optional [swing] / [intraday] overrides.
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, default_value = "swing")]
        mode: Mode,

        /// Board timeframe label (must belong to the mode). Defaults to the mode's first.
        #[arg(long)]
        timeframe: Option<Timeframe>,

        /// all, bullish, bearish or confluence.
        #[arg(long, default_value = "all")]
        bucket: Bucket,

        #[arg(long)]
        min_rank: Option<u8>,

        #[arg(long)]
        sector: Option<String>,

        /// Case-insensitive symbol / ISIN substring.
        #[arg(long)]
        search: Option<String>,

        #[arg(long)]
        rsi_min: Option<f64>,

        #[arg(long)]
        rsi_max: Option<f64>,

        /// Sort column, e.g. rank, rsi, ltp, symbol.
        #[arg(long)]
        sort: Option<SortKey>,

        /// Sort ascending (default descending).
        #[arg(long, default_value_t = false)]
        asc: bool,

        #[arg(long, value_enum, default_value_t = Format::Table)]
        format: Format,

        /// Write to a file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Sector sentiment scores.
    Sectors {
        #[arg(long)]
        snapshots: PathBuf,

        #[arg(long, value_enum, default_value_t = Level::Group)]
        level: Level,

        #[arg(long, value_enum, default_value_t = Format::Table)]
        format: Format,
    },
    /// Multi-timeframe trend dots for one symbol.
    Mtf {
        #[arg(long)]
        snapshots: PathBuf,

        #[arg(long)]
        symbol: String,

        #[arg(long, default_value = "swing")]
        mode: Mode,
    },
    /// Build snapshots from bar CSV (symbol,timestamp,open,high,low,close,volume).
    Build {
        #[arg(long)]
        bars: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, default_value = "swing")]
        mode: Mode,

        /// Timeframe of the bars in --bars. Defaults to the mode's first.
        #[arg(long)]
        timeframe: Option<Timeframe>,

        /// Daily bars for the DMA levels (intraday mode).
        #[arg(long)]
        daily_bars: Option<PathBuf>,

        #[arg(long)]
        output: PathBuf,
    },
    /// RSI-trigger scale-in scenario backtest.
    Backtest {
        /// Base (5m) bar CSV.
        #[arg(long)]
        bars: PathBuf,

        #[arg(long, value_enum, ignore_case = true)]
        action: Action,

        #[arg(long)]
        rsi_min: f64,

        #[arg(long)]
        rsi_max: f64,

        /// Percent, e.g. 0.21.
        #[arg(long)]
        stop_loss_pct: f64,

        #[arg(long, default_value_t = 0.49)]
        target_pct: f64,

        /// Timeframe RSI is read from.
        #[arg(long, default_value = "15m")]
        primary: Timeframe,

        /// First session simulated (YYYY-MM-DD).
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last session simulated (YYYY-MM-DD).
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Restrict to one symbol ("ALL" for every symbol).
        #[arg(long)]
        symbol: Option<String>,

        #[arg(long, value_enum, default_value_t = Format::Table)]
        format: Format,

        /// Write the trade ledger to a file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Rank {
            snapshots,
            config,
            mode,
            timeframe,
            bucket,
            min_rank,
            sector,
            search,
            rsi_min,
            rsi_max,
            sort,
            asc,
            format,
            output,
        } => {
            let cfg = load_config(config.as_deref(), mode)?;
            let timeframe = timeframe.unwrap_or_else(|| mode.default_timeframe());
            if !mode.timeframes().contains(&timeframe) {
                bail!("timeframe {timeframe} is not part of {} mode", mode.as_str());
            }
            let filter = BoardFilter { bucket, min_rank, sector, search, ..BoardFilter::for_config(&cfg) }
                .with_rsi_bounds(rsi_min, rsi_max)?;
            let direction = if asc { SortDirection::Asc } else { SortDirection::Desc };
            let sort = sort.map(|key| Sort::new(key, direction));
            run_rank(&snapshots, &cfg, mode, timeframe, &filter, sort, format, output.as_deref())
        }
        Commands::Sectors { snapshots, level, format } => run_sectors(&snapshots, level, format),
        Commands::Mtf { snapshots, symbol, mode } => run_mtf(&snapshots, &symbol, mode),
        Commands::Build { bars, config, mode, timeframe, daily_bars, output } => {
            let cfg = load_config(config.as_deref(), mode)?;
            run_build(&bars, daily_bars.as_deref(), &cfg, mode, timeframe, &output)
        }
        Commands::Backtest {
            bars,
            action,
            rsi_min,
            rsi_max,
            stop_loss_pct,
            target_pct,
            primary,
            start,
            end,
            symbol,
            format,
            output,
        } => {
            let params = ScenarioParams {
                start,
                end,
                primary,
                action: match action {
                    Action::Buy => Direction::Buy,
                    Action::Sell => Direction::Sell,
                },
                rsi_min,
                rsi_max,
                stop_loss_pct,
                target_pct,
                ..ScenarioParams::default()
            };
            run_backtest(&bars, symbol.as_deref(), &params, format, output.as_deref())
        }
    }
}

fn load_config(path: Option<&Path>, mode: Mode) -> Result<TradingConfig> {
    let profiles = match path {
        Some(p) => ConfigProfiles::from_toml_file(p)
            .with_context(|| format!("failed to load config {}", p.display()))?,
        None => ConfigProfiles::default(),
    };
    let cfg = profiles.get(mode).clone();
    info!(mode = mode.as_str(), fingerprint = %cfg.fingerprint(), "config loaded");
    Ok(cfg)
}

fn emit(contents: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            write_artifact(path, contents)?;
            info!(path = %path.display(), "written");
        }
        None => print!("{contents}"),
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_rank(
    snapshots: &Path,
    cfg: &TradingConfig,
    mode: Mode,
    timeframe: Timeframe,
    filter: &BoardFilter,
    sort: Option<Sort>,
    format: Format,
    output: Option<&Path>,
) -> Result<()> {
    let snaps = load_snapshots(snapshots)
        .with_context(|| format!("failed to load snapshots from {}", snapshots.display()))?;
    let rows = rank_board(snaps, cfg);
    let stats = BoardStats::compute(&rows, cfg);
    let view = apply(&rows, filter, sort);
    let sectors = aggregate_by(rows.iter().map(|r| &r.snapshot), SectorLevel::Group);
    info!(total = stats.total, shown = view.len(), "board ranked");

    let report = BoardReport::new(mode, timeframe, cfg, stats, view, sectors);
    let rendered = match format {
        Format::Table => board_markdown(&report),
        Format::Json => export_board_json(&report)?,
        Format::Csv => export_board_csv(&report.rows, mode)?,
    };
    emit(&rendered, output)
}

fn run_sectors(snapshots: &Path, level: Level, format: Format) -> Result<()> {
    let snaps = load_snapshots(snapshots)
        .with_context(|| format!("failed to load snapshots from {}", snapshots.display()))?;
    let level = match level {
        Level::Group => SectorLevel::Group,
        Level::Subgroup => SectorLevel::Subgroup,
    };
    let groups = aggregate_by(&snaps, level);
    let rendered = match format {
        Format::Table => {
            let mut out = String::new();
            for g in &groups {
                out.push_str(&format!(
                    "{:<24} {:>3}%  ({} buy / {} sell / {} total)\n",
                    g.group_name, g.score, g.buy_count, g.sell_count, g.total
                ));
            }
            out
        }
        Format::Json => serde_json::to_string_pretty(&groups).context("failed to serialize sectors")?,
        Format::Csv => export_sectors_csv(&groups)?,
    };
    emit(&rendered, None)
}

fn run_mtf(snapshots: &Path, symbol: &str, mode: Mode) -> Result<()> {
    let snaps = load_snapshots(snapshots)
        .with_context(|| format!("failed to load snapshots from {}", snapshots.display()))?;
    let Some(snap) = snaps.iter().find(|s| s.symbol.eq_ignore_ascii_case(symbol.trim())) else {
        bail!("symbol {symbol} not found in {}", snapshots.display());
    };
    let dots = aggregate_for_mode(snap, mode);
    println!("{}  {}", snap.symbol, render_dots(&dots));
    for dot in &dots {
        println!("  {:<8} {}", dot.timeframe.label(), dot.direction);
    }
    Ok(())
}

fn run_build(
    bars: &Path,
    daily_bars: Option<&Path>,
    cfg: &TradingConfig,
    mode: Mode,
    timeframe: Option<Timeframe>,
    output: &Path,
) -> Result<()> {
    let series = load_bars_csv(bars).with_context(|| format!("failed to load bars from {}", bars.display()))?;
    let daily = daily_bars
        .map(|p| load_bars_csv(p).with_context(|| format!("failed to load daily bars from {}", p.display())))
        .transpose()?;

    let mut builder = SnapshotBuilder::new(cfg, mode)?;
    if let Some(tf) = timeframe {
        builder = builder.with_base_timeframe(tf);
    }
    let snaps = builder.build_all(&series, daily.as_ref());
    info!(symbols = series.len(), built = snaps.len(), "snapshots built");

    let json = serde_json::to_string_pretty(&snaps).context("failed to serialize snapshots")?;
    emit(&json, Some(output))
}

fn run_backtest(
    bars: &Path,
    symbol: Option<&str>,
    params: &ScenarioParams,
    format: Format,
    output: Option<&Path>,
) -> Result<()> {
    let series = load_bars_csv(bars).with_context(|| format!("failed to load bars from {}", bars.display()))?;
    let summary = run_scenario(&series, symbol, params)?;

    let rendered = match format {
        Format::Table => {
            let mut md = scenario_markdown(&summary);
            md.push('\n');
            md.push_str(&export_trades_csv(&summary.trades)?);
            md
        }
        Format::Json => export_scenario_json(&summary)?,
        Format::Csv => export_trades_csv(&summary.trades)?,
    };
    emit(&rendered, output)
}
