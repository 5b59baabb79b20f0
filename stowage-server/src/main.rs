mod config;
use clap::{Parser, Subcommand};
use crate::config::Config;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod server;
use server::run_server;
use stowage_core::{S3ClientFactory, build_service};

#[derive(Parser)]
#[command(name = "stowage")]
#[command(about = "Hashed object storage over S3-compatible buckets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Server {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.yaml")]
        config: String,
    },
    /// Check that the configured bucket is reachable, then exit
    Check {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.yaml")]
        config: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stowage=info,stowage_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server { config } => {
            tracing::info!("Starting Stowage server with config: {}", config);

            let cfg = load_config(&config);
            tracing::info!(
                "Bucket: {}, Bind: {}, Request timeout: {}s",
                cfg.storage.bucket,
                cfg.bind_addr,
                cfg.request_timeout_secs
            );

            if let Err(e) = run_server(cfg).await {
                tracing::error!("Server error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Check { config } => {
            let cfg = load_config(&config);

            let service = match build_service(&cfg.storage, &S3ClientFactory::new()) {
                Ok(service) => service,
                Err(e) => {
                    tracing::error!("Failed to build storage service: {}", e);
                    std::process::exit(1);
                }
            };

            if service.is_healthy().await {
                tracing::info!("Bucket {} is healthy", cfg.storage.bucket);
            } else {
                tracing::error!("Bucket {} is not healthy", cfg.storage.bucket);
                std::process::exit(2);
            }
        }
    }
}

fn load_config(path: &str) -> Config {
    match Config::from_file(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    }
}
