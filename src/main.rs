use std::path::Path;
use std::process::ExitCode;

use tracing::{error, info};

use schoolgate::{Config, Database, WebServer};

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration; only a missing file falls back to defaults
    let mut config = match Config::load_or_default(CONFIG_PATH) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {CONFIG_PATH}: {e}");
            return ExitCode::FAILURE;
        }
    };
    config.apply_env_overrides();

    // Initialize logging
    if let Err(e) = schoolgate::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        schoolgate::logging::init_console_only(&config.logging.level);
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> schoolgate::Result<()> {
    config.validate()?;
    let token_secret = config.token_secret()?;

    info!("schoolgate {}", env!("CARGO_PKG_VERSION"));
    if !Path::new(CONFIG_PATH).exists() {
        info!("{CONFIG_PATH} not found, using default configuration");
    }

    let db =
        Database::open_with_max_connections(&config.database.path, config.database.max_connections)
            .await?;

    let server = WebServer::new(&config, db, &token_secret)?;
    server.run().await?;
    Ok(())
}
