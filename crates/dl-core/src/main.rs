use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use dl_core::calendar::{self, format_day};
use dl_core::exit_codes::ExitCode;
use dl_core::logging::{init_logging, LogFormat};
use dl_core::{ArtifactTier, CompositeKey, DataLogger, Error, KeyFilter, Result, Session};
use dl_config::{resolve_basedir, TableMetadata};
use regex::Regex;
use serde_json::{json, Value};
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dl-core")]
#[command(about = "Tiered cache for daily monitoring time series", version)]
struct Cli {
    /// Directory holding datalogger.json and the project directories
    #[arg(long, global = true)]
    basedir: Option<PathBuf>,

    /// Default log filter when DATALOGGER_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormatArg::Text)]
    log_format: LogFormatArg,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TierArg {
    SeriesArray,
    SeriesStats,
    Quantile,
    TotalStats,
}

impl From<TierArg> for ArtifactTier {
    fn from(arg: TierArg) -> Self {
        match arg {
            TierArg::SeriesArray => ArtifactTier::SeriesArray,
            TierArg::SeriesStats => ArtifactTier::SeriesStats,
            TierArg::Quantile => ArtifactTier::Quantile,
            TierArg::TotalStats => ArtifactTier::TotalStats,
        }
    }
}

/// One table on one day.
#[derive(clap::Args, Debug)]
struct DayArgs {
    project: String,
    table: String,
    /// `YYYY-MM-DD`, `yesterday` or `last-business-day`
    day: String,
    /// Seconds added to every raw timestamp
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    timedelta: f64,
}

#[derive(Subcommand)]
enum Commands {
    /// List defined projects
    Projects,
    /// List the tables of a project
    Tables { project: String },
    /// Show the validated definition of a table
    Meta { project: String, table: String },
    /// Print the JSON Schema of table definition files
    MetaSchema,
    /// Load one tier, building it if needed
    Load {
        #[command(flatten)]
        target: DayArgs,
        #[arg(value_enum)]
        tier: TierArg,
        /// Keep only keys with `column=value`; repeatable
        #[arg(long = "filter")]
        filters: Vec<String>,
        /// Keep only keys with a part matching this regex
        #[arg(long)]
        pattern: Option<String>,
    },
    /// Rank keys by the histogram of one value column
    Quantile {
        #[command(flatten)]
        target: DayArgs,
        column: String,
        /// Rank by this bucket's count instead of the weighted score
        #[arg(long)]
        bucket: Option<usize>,
        #[arg(long, default_value_t = 10)]
        head: usize,
        #[arg(long, default_value_t = 10)]
        tail: usize,
    },
    /// Show raw input and cache files of a day
    Caches {
        #[command(flatten)]
        target: DayArgs,
    },
    /// Delete every cache file of a day
    Purge {
        #[command(flatten)]
        target: DayArgs,
    },
    /// Print raw rows inside the day window
    Raw {
        #[command(flatten)]
        target: DayArgs,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List the days of a month or of a `[start, stop]` range
    Walk {
        #[arg(long, conflicts_with_all = ["start", "stop"])]
        month: Option<String>,
        #[arg(long, requires = "stop")]
        start: Option<String>,
        #[arg(long, requires = "start")]
        stop: Option<String>,
    },
    /// Daily series of every statistic of one key across a month
    Longtime {
        project: String,
        table: String,
        /// `YYYY-MM`
        month: String,
        column: String,
        /// Key parts in index column order; repeatable
        #[arg(long = "key", required = true)]
        key: Vec<String>,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = init_logging(&cli.log_level, cli.log_format.into()) {
        eprintln!("dl-core: {e}");
    }
    let code = match run(cli) {
        Ok(()) => ExitCode::Clean,
        Err(err) => {
            let report = json!({
                "error": {
                    "code": err.code(),
                    "message": err.to_string(),
                }
            });
            eprintln!("{report}");
            ExitCode::from(&err)
        }
    };
    std::process::exit(code.as_i32());
}

fn run(cli: Cli) -> Result<()> {
    let Cli {
        basedir, command, ..
    } = cli;
    match command {
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "dl-core", &mut io::stdout());
            Ok(())
        }
        Commands::MetaSchema => print_json(&serde_json::to_value(TableMetadata::json_schema())?),
        Commands::Walk { month, start, stop } => {
            let days: Vec<String> = match (month, start, stop) {
                (Some(month), _, _) => calendar::monthwalker(&month)?.map(format_day).collect(),
                (None, Some(start), Some(stop)) => {
                    let start = calendar::parse_day(&resolve_day(&start))?;
                    let stop = calendar::parse_day(&resolve_day(&stop))?;
                    calendar::datewalker(start, stop).map(format_day).collect()
                }
                _ => {
                    return Err(Error::Config(
                        "walk needs --month or --start and --stop".to_string(),
                    ))
                }
            };
            print_json(&json!(days))
        }
        command => {
            let basedir = resolve_basedir(basedir.as_deref())?;
            let datalogger = DataLogger::open(basedir)?;
            run_with(&datalogger, command)
        }
    }
}

fn run_with(datalogger: &DataLogger, command: Commands) -> Result<()> {
    match command {
        Commands::Projects => print_json(&json!(datalogger.projects())),
        Commands::Tables { project } => print_json(&json!(datalogger.tables(&project)?)),
        Commands::Meta { project, table } => {
            let meta = datalogger.config().table_metadata(&project, &table)?;
            print_json(&serde_json::to_value(&meta)?)
        }
        Commands::Load {
            target,
            tier,
            filters,
            pattern,
        } => {
            let session = setup(datalogger, &target)?;
            let filter = key_filter(&filters, pattern.as_deref())?;
            print_json(&load(&session, tier, filter.as_ref())?)
        }
        Commands::Quantile {
            target,
            column,
            bucket,
            head,
            tail,
        } => {
            let session = setup(datalogger, &target)?;
            let mut quantiles = session.load_quantiles()?;
            let quantile = quantiles
                .get_mut(&column)
                .ok_or_else(|| Error::Config(format!("no quantile for value column {column}")))?;
            quantile.sort(bucket)?;
            let rows = |entries: Vec<(&CompositeKey, &[u64; 5])>| -> Vec<Value> {
                entries
                    .into_iter()
                    .map(|(key, buckets)| json!({ "key": key, "buckets": buckets }))
                    .collect()
            };
            print_json(&json!({
                "day": session.day(),
                "column": column,
                "max": quantile.max(),
                "min": quantile.min(),
                "keys": quantile.len(),
                "head": rows(quantile.head(head)),
                "tail": rows(quantile.tail(tail)),
            }))
        }
        Commands::Caches { target } => {
            let session = setup(datalogger, &target)?;
            print_json(&json!({
                "day": session.day(),
                "cache_dir": session.cache_dir().display().to_string(),
                "inventory": session.list_caches()?,
            }))
        }
        Commands::Purge { target } => {
            let session = setup(datalogger, &target)?;
            print_json(&json!({ "day": session.day(), "removed": session.delete_caches()? }))
        }
        Commands::Raw { target, limit } => {
            let session = setup(datalogger, &target)?;
            let mut rows = Vec::new();
            for row in session.raw_reader()?.take(limit.unwrap_or(usize::MAX)) {
                let row = row?;
                rows.push(json!({ "ts": row.ts, "fields": row.fields }));
            }
            print_json(&Value::Array(rows))
        }
        Commands::Longtime {
            project,
            table,
            month,
            column,
            key,
        } => {
            let key = CompositeKey::new(key);
            let series = datalogger.series_stats_longtime(&project, &table, &month, &key, &column)?;
            print_json(&json!({ "key": key, "column": column, "stats": series }))
        }
        Commands::Completions { .. } | Commands::MetaSchema | Commands::Walk { .. } => Ok(()),
    }
}

fn setup(datalogger: &DataLogger, target: &DayArgs) -> Result<Session> {
    datalogger.setup(
        &target.project,
        &target.table,
        &resolve_day(&target.day),
        target.timedelta,
    )
}

/// Expand the day aliases accepted on the command line.
fn resolve_day(day: &str) -> String {
    match day {
        "yesterday" => format_day(calendar::yesterday()),
        "last-business-day" => format_day(calendar::last_business_day()),
        other => other.to_string(),
    }
}

fn key_filter(filters: &[String], pattern: Option<&str>) -> Result<Option<KeyFilter>> {
    if filters.is_empty() && pattern.is_none() {
        return Ok(None);
    }
    let mut filter = KeyFilter::new();
    for spec in filters {
        let (column, value) = spec
            .split_once('=')
            .ok_or_else(|| Error::Config(format!("filter {spec:?} is not column=value")))?;
        filter = filter.with_part(column, value);
    }
    if let Some(pattern) = pattern {
        let re = Regex::new(pattern)
            .map_err(|e| Error::Config(format!("invalid key pattern: {e}")))?;
        filter = filter.with_pattern(re);
    }
    Ok(Some(filter))
}

fn load(session: &Session, tier: TierArg, filter: Option<&KeyFilter>) -> Result<Value> {
    let payload = match tier {
        TierArg::SeriesArray => {
            let array = session.load_series_array(filter)?;
            let keys: Vec<Value> = array
                .iter()
                .map(|(key, series)| json!({ "key": key, "samples": series.len() }))
                .collect();
            json!({
                "index_keys": array.index_keys(),
                "value_keys": array.value_keys(),
                "keys": keys,
            })
        }
        TierArg::SeriesStats => {
            let stats = session.load_series_stats(filter)?;
            let keys: Vec<Value> = stats
                .iter()
                .map(|(key, columns)| json!({ "key": key, "stats": columns }))
                .collect();
            json!({
                "index_keys": stats.index_keys(),
                "value_keys": stats.value_keys(),
                "keys": keys,
            })
        }
        TierArg::Quantile => serde_json::to_value(session.load_quantiles()?)?,
        TierArg::TotalStats => serde_json::to_value(session.load_total_stats()?)?,
    };
    Ok(json!({
        "day": session.day(),
        "tier": ArtifactTier::from(tier).as_str(),
        "data": payload,
    }))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
