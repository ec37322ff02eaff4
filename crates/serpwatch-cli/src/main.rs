mod status;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "serpwatch-cli")]
#[command(about = "Rank-tracking pipeline command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run pending database migrations.
    Migrate,
    /// Show recently updated tracked terms with their rank state.
    Status {
        /// Maximum number of terms to list.
        #[arg(long, default_value_t = 25)]
        limit: i64,
    },
    /// Show a term's recent observations, newest first.
    History {
        /// Internal id of the tracked term.
        term_id: i64,
        /// Maximum number of observations to list.
        #[arg(long, default_value_t = 30)]
        limit: i64,
    },
    /// Force an immediate re-check of a term, subject to the rate limit.
    Recheck {
        /// Internal id of the tracked term.
        term_id: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = serpwatch_core::load_app_config()?;
    tracing_subscriber::fmt::init();

    let pool_config = serpwatch_db::PoolConfig::from_app_config(&config);
    let pool = serpwatch_db::connect_pool(&config.database_url, pool_config).await?;

    let cli = Cli::parse();
    match cli.command {
        Commands::Migrate => {
            let applied = serpwatch_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
        Commands::Status { limit } => status::run_status(&pool, limit).await?,
        Commands::History { term_id, limit } => status::run_history(&pool, term_id, limit).await?,
        Commands::Recheck { term_id } => status::run_recheck(&pool, &config, term_id).await?,
    }

    Ok(())
}
