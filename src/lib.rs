use mongodb::{Client, Database};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;
use crate::error::BackendError;
use crate::service::files::{FileAssets, LocalFileStore};

pub mod config;
pub mod data;
pub mod error;
pub mod resp;
pub mod role;
pub mod service;
pub mod store;
pub mod util;

/// Everything the HTTP layer needs to call into the services.
pub struct Backend {
    pub config: Config,
    pub db: Database,
    pub assets: FileAssets<LocalFileStore>,
}

/// Installs the global tracing subscriber and forwards `log` records to it.
pub fn init_logging(log_level: Option<Level>) {
    if let Some(l) = log_level {
        let subscriber = FmtSubscriber::builder().with_max_level(l).finish();

        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Unable to set global logger: {}", err);
        };
        if let Err(err) = tracing_log::LogTracer::init() {
            eprintln!("Unable to forward log records: {}", err);
        }
    }
}

pub async fn connect(config: &Config) -> Result<Database, BackendError> {
    tracing::info!("Connecting to MongoDB: {}", config.mongodb_uri);
    let client = Client::with_uri_str(config.mongodb_uri.as_str()).await?;

    tracing::info!("Using MongoDB database: {}", config.mongodb_db);
    let db = client.database(config.mongodb_db.as_str());

    if let Err(e) = db.list_collection_names(None).await {
        tracing::error!("Unable to connect to MongoDB.");
        return Err(e.into());
    }

    Ok(db)
}

pub async fn create(log_level: Option<Level>) -> Result<Backend, BackendError> {
    init_logging(log_level);

    tracing::info!("Reading .env file...");
    if dotenv::dotenv().is_err() {
        tracing::warn!("Unable to load .env file.");
    }

    tracing::info!("Loading configuration...");
    let config = Config::load_or_default()?;

    let db = connect(&config).await?;

    tracing::info!("Storing uploads in '{}'", config.upload_dir.display());
    let assets = FileAssets::new(LocalFileStore::new(config.upload_dir.clone()));

    Ok(Backend { config, db, assets })
}
