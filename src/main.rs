//! authgate - Main Server
//!
//! Token authentication with refresh rotation and federated login.

use anyhow::Result;
use authgate::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "authgate")]
#[command(about = "Token authentication and federated identity server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the authentication server
    Serve {
        /// Port to listen on (overrides config.yaml and SERVER_PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Path to the YAML config file
        #[arg(short, long, env = "AUTHGATE_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Print a bcrypt digest for `auth.admin_account.password`
    HashPassword {
        password: String,

        #[arg(long, default_value = "12")]
        cost: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,authgate=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, config } => {
            let mut config = Config::from_yaml_and_env(config.as_deref())?;
            if let Some(port) = port {
                config.server_port = port;
            }
            authgate::start_server(config).await
        }
        Commands::HashPassword { password, cost } => {
            let digest = bcrypt::hash(password, cost)?;
            println!("{}", digest);
            Ok(())
        }
    }
}
