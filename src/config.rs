use anyhow::{Context, Result};
use clap::Parser;
use std::{env, time::Duration};

use crate::services::geocoding::DEFAULT_NOMINATIM_URL;

const DEFAULT_USER_AGENT: &str = concat!("listing-service/", env!("CARGO_PKG_VERSION"));

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    /// Origin written into preview links, e.g. `http://localhost:3000`.
    pub public_base_url: String,
    pub geocoder_url: String,
    pub geocoder_user_agent: String,
    /// Request timeout for geocoding lookups; the HTTP client default when unset.
    pub geocoder_timeout_secs: Option<u64>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Real-estate listing lifecycle service")]
pub struct Args {
    /// Host to bind to (overrides LISTING_SERVICE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides LISTING_SERVICE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where image payloads are stored (overrides LISTING_SERVICE_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides LISTING_SERVICE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Public origin used in preview links (overrides LISTING_SERVICE_PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Nominatim-compatible geocoder (overrides LISTING_SERVICE_GEOCODER_URL)
    #[arg(long)]
    pub geocoder_url: Option<String>,

    /// User-Agent sent to the geocoder (overrides LISTING_SERVICE_GEOCODER_USER_AGENT)
    #[arg(long)]
    pub geocoder_user_agent: Option<String>,

    /// Geocoder timeout in seconds (overrides LISTING_SERVICE_GEOCODER_TIMEOUT_SECS)
    #[arg(long)]
    pub geocoder_timeout_secs: Option<u64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

fn env_parsed<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        Ok((Self::merge(args)?, migrate))
    }

    fn merge(args: Args) -> Result<Self> {
        // --- Environment fallback ---
        let env_host = env::var("LISTING_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = env_parsed::<u16>("LISTING_SERVICE_PORT")?.unwrap_or(3000);
        let env_storage =
            env::var("LISTING_SERVICE_STORAGE_DIR").unwrap_or_else(|_| "./data/assets".into());
        let env_db = env::var("LISTING_SERVICE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/listings.db".into());
        let env_geocoder =
            env::var("LISTING_SERVICE_GEOCODER_URL").unwrap_or_else(|_| DEFAULT_NOMINATIM_URL.into());
        let env_user_agent = env::var("LISTING_SERVICE_GEOCODER_USER_AGENT")
            .unwrap_or_else(|_| DEFAULT_USER_AGENT.into());
        let env_timeout = env_parsed::<u64>("LISTING_SERVICE_GEOCODER_TIMEOUT_SECS")?;

        let port = args.port.unwrap_or(env_port);
        let env_public = env::var("LISTING_SERVICE_PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", port));

        // --- Merge ---
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port,
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            public_base_url: args.public_base_url.unwrap_or(env_public),
            geocoder_url: args.geocoder_url.unwrap_or(env_geocoder),
            geocoder_user_agent: args.geocoder_user_agent.unwrap_or(env_user_agent),
            geocoder_timeout_secs: args.geocoder_timeout_secs.or(env_timeout),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn geocoder_timeout(&self) -> Option<Duration> {
        self.geocoder_timeout_secs.map(Duration::from_secs)
    }
}
