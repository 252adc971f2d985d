use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "lns")]
#[command(about = "Legacy notes sync CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> local ...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Import commands
    Import {
        #[command(subcommand)]
        cmd: ImportCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations.
    Migrate,
}

#[derive(Subcommand)]
enum ImportCmd {
    /// Reconcile every active subject and print the run report as JSON.
    Run {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Use the in-memory store instead of Postgres (nothing persists)
        #[arg(long, default_value_t = false)]
        mem: bool,
    },

    /// Reconcile one subject and print the run report as JSON.
    Subject {
        /// Local subject id
        #[arg(long)]
        id: i64,

        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Use the in-memory store instead of Postgres (nothing persists)
        #[arg(long, default_value_t = false)]
        mem: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist.
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = lns_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = lns_db::status(&pool).await?;
                    println!("db_ok={} has_notes_table={}", s.ok, s.has_notes_table);
                }
                DbCmd::Migrate => {
                    lns_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = lns_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Import { cmd } => {
            let report = match cmd {
                ImportCmd::Run { config_paths, mem } => {
                    commands::import::import_run(&config_paths, mem).await?
                }
                ImportCmd::Subject {
                    id,
                    config_paths,
                    mem,
                } => commands::import::import_subject(id, &config_paths, mem).await?,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.is_critical() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
