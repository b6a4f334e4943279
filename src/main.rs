use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

use logstats::record::NewRecord;
use logstats::store::{InMemoryRecordStore, RecordStore, SqliteRecordStore};
use logstats::timefmt::parse_instant;
use logstats::window::{WindowRequest, WindowScope};
use logstats::{logging, Analytics, CancelToken, EngineConfig, ReportRequest};

#[derive(Parser)]
#[command(name = "logstats")]
#[command(about = "Messaging analytics over stored webhook event logs", long_about = None)]
struct Cli {
    /// SQLite record database
    #[arg(long, global = true, conflicts_with = "input")]
    db: Option<PathBuf>,

    /// JSON-lines file of records, analyzed in memory
    #[arg(long, global = true)]
    input: Option<PathBuf>,

    /// Engine configuration (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write logs to <dir>/logstats.log
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Abort a report that runs longer than this
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ReportArgs {
    /// Store identifier
    #[arg(long)]
    store: String,

    /// Window start (RFC 3339 or YYYY-MM-DD); defaults to 7 days before --to
    #[arg(long)]
    from: Option<String>,

    /// Window end, exclusive (RFC 3339 or YYYY-MM-DD); defaults to now
    #[arg(long)]
    to: Option<String>,

    /// Calendar window instead of bounds: 2025, 2025-03, 2025-W12 or 2025-03-15
    #[arg(long, conflicts_with_all = ["from", "to"])]
    window: Option<String>,
}

impl ReportArgs {
    fn request(&self, config: &EngineConfig) -> Result<ReportRequest> {
        if let Some(key) = &self.window {
            let scope = WindowScope::parse(key)?;
            return ReportRequest::for_scope(self.store.clone(), &scope, config.day_offset()?);
        }

        let window = WindowRequest {
            start: self.from.as_deref().map(parse_instant).transpose()?,
            end: self.to.as_deref().map(parse_instant).transpose()?,
        };
        Ok(ReportRequest {
            store: self.store.clone(),
            window,
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Load a JSON-lines file into the SQLite database (requires --db)
    Import {
        #[arg(long)]
        file: PathBuf,
    },
    /// Per-direction messages and averages over active days
    Stats(ReportArgs),
    /// Repeated outgoing messages and direction/group ratio
    Block(ReportArgs),
    /// Averages over the whole window and the most repeated messages
    Frequency(ReportArgs),
    /// Print one stored record
    Show {
        #[arg(long, conflicts_with = "external_id")]
        id: Option<String>,
        #[arg(long)]
        external_id: Option<String>,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Import { .. } => "import",
            Self::Stats(_) => "stats",
            Self::Block(_) => "block",
            Self::Frequency(_) => "frequency",
            Self::Show { .. } => "show",
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.log_dir.as_deref(), cli.command.name())?;

    let config = match &cli.config {
        Some(path) => EngineConfig::load_from_file(path)?,
        None => EngineConfig::default(),
    };

    let cancel = match cli.timeout_secs {
        Some(secs) => CancelToken::with_timeout(Duration::from_secs(secs)),
        None => CancelToken::new(),
    };
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .context("Failed to install Ctrl-C handler")?;

    if let Commands::Import { file } = &cli.command {
        let db = cli
            .db
            .as_deref()
            .ok_or_else(|| anyhow!("--db is required for import"))?;
        return import(db, file);
    }

    if let Some(db) = &cli.db {
        run(SqliteRecordStore::open(db)?, config, cli.command, &cancel)
    } else if let Some(input) = &cli.input {
        run(load_jsonl(input)?, config, cli.command, &cancel)
    } else {
        bail!("Either --db or --input is required");
    }
}

fn run<S: RecordStore>(
    store: S,
    config: EngineConfig,
    command: Commands,
    cancel: &CancelToken,
) -> Result<()> {
    let analytics = Analytics::new(store, config)?;

    let output = match command {
        Commands::Stats(args) => {
            let request = args.request(analytics.config())?;
            serde_json::to_value(analytics.store_stats(&request, cancel)?)?
        }
        Commands::Block(args) => {
            let request = args.request(analytics.config())?;
            serde_json::to_value(analytics.block_analysis(&request, cancel)?)?
        }
        Commands::Frequency(args) => {
            let request = args.request(analytics.config())?;
            serde_json::to_value(analytics.high_frequency(&request, cancel)?)?
        }
        Commands::Show { id, external_id } => {
            let record = match (id, external_id) {
                (Some(id), _) => analytics.record(&id)?,
                (None, Some(external_id)) => analytics.record_by_external_id(&external_id)?,
                (None, None) => bail!("show needs --id or --external-id"),
            };
            serde_json::to_value(record)?
        }
        Commands::Import { .. } => bail!("import does not produce a report"),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn read_records(path: &Path, mut sink: impl FnMut(NewRecord) -> Result<()>) -> Result<usize> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open input file: {}", path.display()))?;
    let now = chrono::Utc::now();

    let mut count = 0;
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let record = NewRecord::from_json_line(&line, now)
            .with_context(|| format!("{}:{}", path.display(), idx + 1))?;
        sink(record)?;
        count += 1;
    }
    Ok(count)
}

fn load_jsonl(path: &Path) -> Result<InMemoryRecordStore> {
    let store = InMemoryRecordStore::new();
    let count = read_records(path, |record| {
        store.insert(record)?;
        Ok(())
    })?;
    tracing::info!(records = count, "Loaded records from {}", path.display());
    Ok(store)
}

fn import(db: &Path, file: &Path) -> Result<()> {
    let store = SqliteRecordStore::open(db)?;
    let count = read_records(file, |record| {
        store.insert(&record)?;
        Ok(())
    })?;
    eprintln!("Imported {} records into {}", count, db.display());
    Ok(())
}
