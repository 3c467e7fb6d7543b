//! pgdash - PostgreSQL monitoring dashboard.
//!
//! Interactive terminal dashboard over a set of servers, plus one-shot
//! `explain` and server inventory commands.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pgdash_core::backend::{self, MetricsBackend, MockBackend, PgBackend};
use pgdash_core::plan::{Plan, render_text};
use pgdash_core::refresh::RefreshOptions;
use pgdash_core::servers::{ServerConfig, ServerStore, default_inventory_path};
use pgdash_core::tui::App;

const DEFAULT_LOG_FILTER: &str = "pgdash=info,pgdash_core=info";

/// Key poll interval of the dashboard.
const TICK_RATE: Duration = Duration::from_millis(250);

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// PostgreSQL monitoring dashboard.
#[derive(Parser)]
#[command(name = "pgdash", about = "PostgreSQL monitoring dashboard", version = pgdash_core::VERSION)]
struct Args {
    /// Path to the server inventory file.
    #[arg(long = "servers", value_name = "PATH", env = "PGDASH_SERVERS", global = true)]
    inventory: Option<PathBuf>,

    /// Server id to open first (or to explain against).
    #[arg(long, value_name = "ID", global = true)]
    server: Option<String>,

    /// Refresh interval in seconds.
    #[arg(long, default_value = "5", env = "PGDASH_INTERVAL", global = true)]
    interval: u64,

    /// Start with live refresh paused.
    #[arg(long, global = true)]
    paused: bool,

    /// Use built-in demo data instead of real servers.
    #[arg(long, global = true)]
    demo: bool,

    /// Write logs to this file. The dashboard discards logs otherwise.
    #[arg(long, value_name = "PATH", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Interactive dashboard (default).
    Tui,
    /// Print the execution plan of a query.
    Explain {
        /// Execute the query and report measured timings. Its effects are rolled back.
        #[arg(long)]
        analyze: bool,
        query: String,
    },
    /// Manage the server inventory.
    Servers {
        #[command(subcommand)]
        action: ServersCommand,
    },
}

#[derive(Subcommand, Debug, PartialEq)]
enum ServersCommand {
    /// List configured servers.
    List {
        /// Connect to each server and report its version.
        #[arg(long)]
        check: bool,
    },
    /// Add a server.
    Add {
        id: String,
        /// Display name (defaults to the id).
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        host: String,
        #[arg(long, default_value_t = 5432)]
        port: u16,
        #[arg(long, default_value = "postgres")]
        database: String,
        #[arg(long, default_value = "postgres")]
        username: String,
        /// Require TLS.
        #[arg(long)]
        ssl: bool,
        /// Environment variable holding the password.
        #[arg(long, value_name = "VAR")]
        password_env: Option<String>,
    },
    /// Remove a server.
    Remove { id: String },
}

/// Installs the tracing subscriber. The dashboard owns the terminal, so in
/// interactive mode logs go to `log_file` or nowhere.
fn init_logging(log_file: Option<&Path>, interactive: bool) -> io::Result<()> {
    let filter = EnvFilter::try_from_env("PGDASH_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None if interactive => builder.with_writer(io::sink).init(),
        None => builder.with_writer(io::stderr).init(),
    }
    Ok(())
}

fn demo_server() -> ServerConfig {
    ServerConfig {
        id: "demo".to_string(),
        name: "Demo".to_string(),
        host: "localhost".to_string(),
        port: 5432,
        database: "postgres".to_string(),
        username: "postgres".to_string(),
        use_ssl: false,
        password_env: None,
    }
}

fn load_store(args: &Args) -> CliResult<ServerStore> {
    if args.demo {
        return Ok(ServerStore::in_memory(vec![demo_server()]));
    }
    let path = args
        .inventory
        .clone()
        .or_else(default_inventory_path)
        .ok_or("cannot locate the server inventory, pass --servers")?;
    Ok(ServerStore::load(path)?)
}

fn make_backend(demo: bool) -> Arc<dyn MetricsBackend> {
    if demo {
        Arc::new(MockBackend::new())
    } else {
        Arc::new(PgBackend::new())
    }
}

async fn run_tui(args: &Args) -> CliResult<()> {
    let store = load_store(args)?;
    if store.is_empty() {
        return Err("no servers configured, add one with `pgdash servers add`".into());
    }
    let options = RefreshOptions::every(Duration::from_secs(args.interval.max(1)))
        .with_enabled(!args.paused);
    info!(
        servers = store.list().len(),
        interval_secs = args.interval,
        live = !args.paused,
        "starting dashboard"
    );

    let app = App::new(
        make_backend(args.demo),
        store.list().to_vec(),
        args.server.as_deref(),
        options,
    )?;
    app.run(TICK_RATE).await?;
    Ok(())
}

async fn run_explain(args: &Args, analyze: bool, query: String) -> CliResult<()> {
    let store = load_store(args)?;
    let server = match args.server.as_deref() {
        Some(id) => store
            .get(id)
            .cloned()
            .ok_or_else(|| format!("unknown server '{}'", id))?,
        None => match store.list() {
            [only] => only.clone(),
            [] => return Err("no servers configured".into()),
            _ => return Err("several servers configured, pick one with --server".into()),
        },
    };

    let backend = make_backend(args.demo);
    let config = server.clone();
    let version = backend::call(backend.clone(), move |b| b.connect(&config)).await?;
    info!(server = %server.id, version = %version, analyze, "explaining query");

    let id = server.id.clone();
    let text = query.clone();
    let raw = backend::call(backend, move |b| b.explain(&id, &text, analyze)).await?;
    let plan = Plan::from_value(raw, &query)?;
    print!("{}", render_text(&plan));
    Ok(())
}

async fn run_servers(args: &Args, action: ServersCommand) -> CliResult<()> {
    if args.demo && !matches!(action, ServersCommand::List { .. }) {
        return Err("the demo inventory is read-only".into());
    }
    let mut store = load_store(args)?;
    match action {
        ServersCommand::List { check } => {
            if store.is_empty() {
                println!("No servers configured.");
                return Ok(());
            }
            let backend = make_backend(args.demo);
            for server in store.list() {
                let status = if check {
                    let config = server.clone();
                    let result =
                        backend::call(backend.clone(), move |b| Ok(b.test_connection(&config)))
                            .await?;
                    match result.postgres_version {
                        Some(v) if result.success => format!("ok  {}", v),
                        _ => format!("FAIL  {}", result.message),
                    }
                } else {
                    String::new()
                };
                println!(
                    "{:<16} {:<24} {:<40} {}",
                    server.id,
                    server.name,
                    server.endpoint(),
                    status
                );
            }
        }
        ServersCommand::Add {
            id,
            name,
            host,
            port,
            database,
            username,
            ssl,
            password_env,
        } => {
            let server = ServerConfig {
                name: name.unwrap_or_else(|| id.clone()),
                id,
                host,
                port,
                database,
                username,
                use_ssl: ssl,
                password_env,
            };
            let added = format!("{} ({})", server.id, server.endpoint());
            store.add(server)?;
            store.save()?;
            println!("Added {}", added);
        }
        ServersCommand::Remove { id } => {
            let removed = store.remove(&id)?;
            store.save()?;
            println!("Removed {} ({})", removed.id, removed.endpoint());
        }
    }
    Ok(())
}

fn main() {
    let mut args = Args::parse();
    let command = args.command.take().unwrap_or(Command::Tui);
    let interactive = command == Command::Tui;

    if let Err(e) = init_logging(args.log_file.as_deref(), interactive) {
        eprintln!("pgdash: cannot open log file: {}", e);
        std::process::exit(1);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("pgdash-worker")
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("pgdash: failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(async {
        match command {
            Command::Tui => run_tui(&args).await,
            Command::Explain { analyze, query } => run_explain(&args, analyze, query).await,
            Command::Servers { action } => run_servers(&args, action).await,
        }
    });

    if let Err(e) = result {
        error!(error = %e, "pgdash failed");
        eprintln!("pgdash: {}", e);
        std::process::exit(1);
    }
}
