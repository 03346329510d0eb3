#![warn(clippy::all, clippy::pedantic)]

use std::path::PathBuf;
use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use clap::Parser;
use tracing::info;
use vigil::{Engine, JsonFileStore};

mod config;
mod error;
mod routes;

use config::Config;
use error::AppError;

#[derive(Debug, Parser)]
#[command(version, about = "Uptime monitoring server")]
struct Cli {
    /// Path to config.toml (defaults to $XDG_CONFIG_HOME/vigil/config.toml)
    #[arg(short, long, env = "VIGIL_CONFIG")]
    config: Option<PathBuf>,

    /// Override the data directory from the config file
    #[arg(long, env = "VIGIL_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::from_config(cli.config.as_ref())?;
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir;
    }

    let format = config.logging.format.parse().unwrap_or_default();
    logger::init_with(&config.logging.level, format);
    info!("{config}");

    let store = JsonFileStore::open(&config.storage.data_dir)
        .await
        .map_err(vigil::VigilError::Store)?;
    let engine = Engine::start(Arc::new(store), config.engine_options()).await?;
    let engine = web::Data::new(engine);

    let result = run_server(&config.bind_addr(), engine.clone()).await;

    engine.shutdown().await;
    result
}

async fn run_server(addr: &str, engine: web::Data<Engine>) -> Result<(), AppError> {
    info!(addr, "Starting HTTP server");
    HttpServer::new(move || App::new().app_data(engine.clone()).configure(routes::routes))
        .bind(addr)?
        .run()
        .await?;

    Ok(())
}
