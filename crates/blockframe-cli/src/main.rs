//! CLI tool for reading and writing block-packed series in SQLite.

mod error;

use std::path::{Path, PathBuf};

use blockframe_core::{
    ColumnKind, Database, Frame, Owner, Profile, RangeBound, SeriesConfig, Value,
    backend::sqlite::SqliteBackend,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use snafu::ResultExt;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::error::{
    CliResult, CreateTableSnafu, OpenDatabaseSnafu, ParseConfigSnafu, ReadConfigSnafu,
    RenderSnafu,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProfileArg {
    RowMerge,
    Upsert,
    CaseUpdate,
}

impl From<ProfileArg> for Profile {
    fn from(v: ProfileArg) -> Self {
        match v {
            ProfileArg::RowMerge => Profile::RowMerge,
            ProfileArg::Upsert => Profile::Upsert,
            ProfileArg::CaseUpdate => Profile::CaseUpdate,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormatArg {
    Lines,
    Json,
}

#[derive(Debug, Args)]
struct StoreArgs {
    /// SQLite database file (created if missing)
    #[arg(long)]
    db: PathBuf,

    /// Series config JSON: {"layout": {...}, "indexer": {...}}
    #[arg(long)]
    config: PathBuf,

    /// Override the bulk update strategy (default: from the dialect)
    #[arg(long, value_enum)]
    profile: Option<ProfileArg>,
}

#[derive(Debug, Args)]
struct OwnerArgs {
    #[arg(long = "owner-id")]
    owner_id: i64,

    #[arg(long = "owner-type")]
    owner_type: String,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the block table described by the config
    Init {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Print the values of a time range, one per line
    Get {
        #[command(flatten)]
        store: StoreArgs,

        #[command(flatten)]
        owner: OwnerArgs,

        /// First timestamp, e.g. 2001-01-01 or 2001-01-01T03:00
        #[arg(long)]
        start: String,

        #[arg(long)]
        end: String,

        /// Include the period containing --end
        #[arg(long, default_value_t = false)]
        inclusive: bool,

        /// Round floats to this many decimal places
        #[arg(long)]
        round: Option<u32>,

        #[arg(long, value_enum, default_value_t = OutputFormatArg::Lines)]
        format: OutputFormatArg,
    },

    /// Write consecutive values starting at a timestamp
    Set {
        #[command(flatten)]
        store: StoreArgs,

        #[command(flatten)]
        owner: OwnerArgs,

        #[arg(long)]
        start: String,

        /// Comma separated; `null` clears a period, `".."` is always text
        #[arg(long, value_delimiter = ',', required = true)]
        values: Vec<String>,
    },

    /// Delete the whole blocks covering a block-aligned range
    Delete {
        #[command(flatten)]
        store: StoreArgs,

        #[command(flatten)]
        owner: OwnerArgs,

        #[arg(long)]
        start: String,

        #[arg(long)]
        end: String,
    },
}

#[derive(Debug, Parser)]
#[command(name = "blockframe", version)]
struct Cli {
    /// Log engine activity (planned writes, flushes) to stderr
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A subscriber may already be installed when embedded; keep that one.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn load_config(path: &Path) -> CliResult<SeriesConfig> {
    let text = std::fs::read_to_string(path).context(ReadConfigSnafu {
        path: path.display().to_string(),
    })?;
    serde_json::from_str(&text).context(ParseConfigSnafu {
        path: path.display().to_string(),
    })
}

fn open_store(args: &StoreArgs) -> CliResult<(Database<SqliteBackend>, SeriesConfig)> {
    let config = load_config(&args.config)?;
    let mut backend = SqliteBackend::open(&args.db).context(OpenDatabaseSnafu {
        path: args.db.display().to_string(),
    })?;
    if let Some(profile) = args.profile {
        backend = backend.with_profile(profile.into());
    }
    Ok((Database::new(backend), config))
}

fn frame<'a>(
    db: &'a Database<SqliteBackend>,
    config: &SeriesConfig,
    owner: &OwnerArgs,
) -> CliResult<Frame<'a, SqliteBackend>> {
    Ok(db.frame(config, &Owner::new(owner.owner_id, owner.owner_type.as_str()))?)
}

/// Read `token` as a value for a column of `kind`.
///
/// `null` clears the period. Categorical columns keep numeric-looking
/// labels as text. A double-quoted token is always text, which is how the
/// label `null` is written.
fn parse_value(token: &str, kind: ColumnKind) -> Value {
    let token = token.trim();
    if let Some(text) = token
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        return Value::Text(text.to_string());
    }
    if token.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    match kind {
        ColumnKind::Categorical => Value::Text(token.to_string()),
        // Anything unparseable stays text so the store reports the column.
        ColumnKind::Integer | ColumnKind::Float => token
            .parse::<i64>()
            .map(Value::Int)
            .or_else(|_| token.parse::<f64>().map(Value::Float))
            .unwrap_or_else(|_| Value::Text(token.to_string())),
    }
}

fn cmd_init(store: &StoreArgs) -> CliResult<()> {
    let (db, config) = open_store(store)?;
    db.create_table(&config.layout).context(CreateTableSnafu {
        table: config.layout.table(),
    })?;
    println!("Created table {}", config.layout.table());
    Ok(())
}

fn cmd_get(
    store: &StoreArgs,
    owner: &OwnerArgs,
    range: (&str, &str),
    bound: RangeBound,
    round: Option<u32>,
    format: OutputFormatArg,
) -> CliResult<()> {
    let (db, config) = open_store(store)?;
    let frame = frame(&db, &config, owner)?;
    let mut seq = frame.get_between(range.0, range.1, bound)?;
    if let Some(digits) = round {
        seq = seq.round(digits);
    }
    debug!(periods = seq.len(), "read");

    match format {
        OutputFormatArg::Lines => {
            for value in &seq {
                println!("{value}");
            }
        }
        OutputFormatArg::Json => {
            println!("{}", serde_json::to_string(seq.values()).context(RenderSnafu)?);
        }
    }
    Ok(())
}

fn cmd_set(store: &StoreArgs, owner: &OwnerArgs, start: &str, tokens: &[String]) -> CliResult<()> {
    let (db, config) = open_store(store)?;
    let frame = frame(&db, &config, owner)?;
    let first = frame.period(start)?;
    let layout = frame.series().layout();
    let values: Vec<Value> = tokens
        .iter()
        .zip(0i64..)
        .map(|(token, i)| {
            let slot = frame.indexer().slot_offset(first.saturating_add(i));
            parse_value(token, layout.column_for_slot(slot).kind)
        })
        .collect();
    frame.set_from(start, &values)?;
    println!("Wrote {} values", values.len());
    Ok(())
}

fn cmd_delete(store: &StoreArgs, owner: &OwnerArgs, start: &str, end: &str) -> CliResult<()> {
    let (db, config) = open_store(store)?;
    let frame = frame(&db, &config, owner)?;
    let (start, end) = (frame.period(start)?, frame.period(end)?);
    frame.delete_periods(start, end)?;
    let capacity = frame.indexer().capacity() as i64;
    println!("Deleted blocks {}..{}", start / capacity, end / capacity);
    Ok(())
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.cmd {
        Command::Init { store } => cmd_init(&store),

        Command::Get {
            store,
            owner,
            start,
            end,
            inclusive,
            round,
            format,
        } => {
            let bound = if inclusive {
                RangeBound::Inclusive
            } else {
                RangeBound::Exclusive
            };
            cmd_get(&store, &owner, (&start, &end), bound, round, format)
        }

        Command::Set {
            store,
            owner,
            start,
            values,
        } => cmd_set(&store, &owner, &start, &values),

        Command::Delete {
            store,
            owner,
            start,
            end,
        } => cmd_delete(&store, &owner, &start, &end),
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_columns_parse_numbers() {
        assert_eq!(parse_value("NULL", ColumnKind::Float), Value::Null);
        assert_eq!(parse_value(" 42 ", ColumnKind::Integer), Value::Int(42));
        assert_eq!(parse_value("2.5", ColumnKind::Float), Value::Float(2.5));
        assert_eq!(parse_value("high", ColumnKind::Float), Value::Text("high".into()));
    }

    #[test]
    fn categorical_columns_keep_labels_as_text() {
        assert_eq!(parse_value("123", ColumnKind::Categorical), Value::Text("123".into()));
        assert_eq!(parse_value("1.5", ColumnKind::Categorical), Value::Text("1.5".into()));
        assert_eq!(parse_value("null", ColumnKind::Categorical), Value::Null);
        assert_eq!(parse_value("\"null\"", ColumnKind::Categorical), Value::Text("null".into()));
        assert_eq!(parse_value("\"\"", ColumnKind::Categorical), Value::Text(String::new()));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
