use clap::{Args, Parser, Subcommand};
use docshell::cli::{self as prog_cli, Command, OutputMode};
use docshell::config::ShellConfig;
use docshell::exec::telemetry;
use docshell::logger;
use docshell::store::MemoryStore;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "docshell", version, about = "Parse and run MongoDB shell style queries", long_about = None)]
struct Cli {
    /// Path to a config file (TOML)
    #[arg(long, help = "Path to a config file (TOML). Defaults to DOCSHELL_CONFIG, ~/.config/docshell.toml, ./docshell.toml")]
    config: Option<PathBuf>,
    #[arg(long, help = "Output format: human|plain|json (default human on a terminal, plain otherwise)")]
    format: Option<String>,
    #[arg(long, help = "Directory for app.log / metrics.log; logging stays off when unset")]
    log_dir: Option<PathBuf>,
    #[arg(long, help = "Log level: error|warn|info|debug|trace")]
    log_level: Option<String>,
    #[arg(long, help = "Queries at or above this many milliseconds are logged as slow")]
    slow_query_ms: Option<u64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct StoreArgs {
    #[arg(long, help = "Seed file: JSON array or one document per line")]
    seed: Option<PathBuf>,
    #[arg(long, help = "Collection to seed into; defaults to the seed file stem")]
    collection: Option<String>,
    #[arg(long, default_value = "test", help = "Database name reported by db.getName()")]
    db: String,
    #[arg(long, help = "Page size: 10|25|50|100|250|500")]
    page_size: Option<u64>,
    #[arg(long, help = "Store-side time limit per query in milliseconds")]
    timeout_ms: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Parse a query and print its descriptor")]
    Parse {
        #[arg(help = "Query text, e.g. \"db.users.find({age: {$gt: 21}})\"")]
        query: String,
    },
    #[command(about = "Execute one query against an in-memory store")]
    Run {
        #[arg(help = "Query text")]
        query: String,
        #[arg(long, default_value_t = 1, help = "1-based page number")]
        page: u64,
        #[arg(long, help = "Print query counters after the result")]
        metrics: bool,
        #[command(flatten)]
        store: StoreArgs,
    },
    #[command(about = "Interactive shell over stdin; `metrics` prints the session's query counters")]
    Shell {
        #[command(flatten)]
        store: StoreArgs,
    },
}

fn open_store(args: &StoreArgs) -> Result<MemoryStore, Box<dyn std::error::Error>> {
    let store = MemoryStore::new(args.db.clone());
    if let Some(path) = &args.seed {
        let collection = args
            .collection
            .clone()
            .or_else(|| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .ok_or("cannot derive a collection name from the seed file; pass --collection")?;
        let n = store.seed(&collection, prog_cli::load_seed(path)?)?;
        log::info!("seeded {n} document(s) into '{collection}' from {}", path.display());
    }
    Ok(store)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let store_args = match &cli.command {
        Commands::Run { store, .. } | Commands::Shell { store } => Some(store),
        Commands::Parse { .. } => None,
    };
    let flags = ShellConfig {
        page_size: store_args.and_then(|s| s.page_size),
        timeout_ms: store_args.and_then(|s| s.timeout_ms),
        slow_query_ms: cli.slow_query_ms,
        log_dir: cli.log_dir.clone(),
        log_level: cli.log_level.clone(),
    };
    let cfg = match ShellConfig::resolve(flags, cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };

    let logging = match &cfg.log_dir {
        Some(dir) => {
            let dev6 = std::env::var("DOCSHELL_DEV6").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
            logger::configure_logging(Some(dir.as_path()), cfg.log_level.as_deref(), None, dev6).map(|()| true)
        }
        None => logger::configure_from_env(),
    };
    if let Err(e) = logging {
        eprintln!("warning: logging disabled: {e}");
    }
    if let Some(ms) = cfg.slow_query_ms {
        telemetry::set_slow_query_ms(ms);
    }

    let mode = cli.format.as_deref().map_or_else(
        || if std::io::stdout().is_terminal() { OutputMode::Human } else { OutputMode::Plain },
        |f| prog_cli::parse_output_mode(Some(f)),
    );
    let store = match store_args.map(open_store).transpose() {
        Ok(s) => s.unwrap_or_default(),
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };

    let mut stdout = std::io::stdout().lock();
    let res = match cli.command {
        Commands::Parse { query } => {
            prog_cli::run_with_format(&store, Command::Parse { query }, mode, &cfg, &mut stdout).await
        }
        Commands::Run { query, page, metrics, .. } => {
            let res = prog_cli::run_with_format(&store, Command::Run { query, page }, mode, &cfg, &mut stdout).await;
            if metrics && let Err(e) = prog_cli::run_with_format(&store, Command::Metrics, mode, &cfg, &mut stdout).await {
                eprintln!("error: {e}");
            }
            res
        }
        Commands::Shell { .. } => {
            let mut stdin = std::io::stdin().lock();
            let shell_mode = if cli.format.is_none() && std::io::stdin().is_terminal() { OutputMode::Human } else { mode };
            prog_cli::run_shell(&store, &cfg, shell_mode, &mut stdin, &mut stdout).await
        }
    };
    // Failures were already rendered to stdout.
    if res.is_err() { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}
