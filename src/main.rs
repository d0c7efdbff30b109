use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pezzottify_library::config::{AppConfig, BootstrapUser, CliConfig, FileConfig};
use pezzottify_library::library_store::{
    wall_clock_nanos, LibraryStore, SqliteLibraryStore, UserMetaComplete,
};
use pezzottify_library::server::{self, load_tls_config, run_server, RequestsLoggingLevel};

const METRICS_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the SQLite library database file, created if missing.
    #[clap(long, value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// Path to a TOML config file. Its values take precedence over the CLI.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// Lifetime of auth tokens in seconds.
    #[clap(long, default_value_t = 7 * 24 * 3600)]
    pub token_ttl_sec: u64,

    /// Interval in hours between expired token pruning runs. 0 disables pruning.
    #[clap(long, default_value_t = 24)]
    pub prune_interval_hours: u64,

    /// PEM certificate chain, enables HTTPS together with --ssl-key.
    #[clap(long, value_parser = parse_path)]
    pub ssl_cert: Option<PathBuf>,

    /// PEM private key of --ssl-cert.
    #[clap(long, value_parser = parse_path)]
    pub ssl_key: Option<PathBuf>,

    /// User created on startup if missing.
    #[clap(long)]
    pub admin_user: Option<String>,

    /// Password of --admin-user.
    #[clap(long)]
    pub admin_password: Option<String>,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_path: self.db_path.clone(),
            port: self.port,
            metrics_port: self.metrics_port,
            logging_level: self.logging_level,
            frontend_dir_path: self.frontend_dir_path.clone(),
            token_ttl_sec: self.token_ttl_sec,
            prune_interval_hours: self.prune_interval_hours,
            ssl_cert: self.ssl_cert.clone(),
            ssl_key: self.ssl_key.clone(),
            admin_user: self.admin_user.clone(),
            admin_password: self.admin_password.clone(),
        }
    }
}

fn bootstrap_user(store: &SqliteLibraryStore, user: &BootstrapUser) -> Result<()> {
    if store.find_user_by_name(&user.name)?.is_some() {
        info!("User '{}' already exists", user.name);
        return Ok(());
    }
    let created = store.create_user(&UserMetaComplete {
        name: user.name.clone(),
        password: Some(user.password.clone()),
    })?;
    info!("Created user '{}' with id {}", user.name, created.id);
    Ok(())
}

fn spawn_token_pruning(store: Arc<dyn LibraryStore>, interval_hours: u64, ttl_sec: u64) {
    if interval_hours == 0 {
        return;
    }
    info!("Pruning expired tokens every {} hours", interval_hours);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_hours * 60 * 60));
        loop {
            ticker.tick().await;
            let ttl_nanos = (ttl_sec as i64).saturating_mul(1_000_000_000);
            let cutoff = wall_clock_nanos().saturating_sub(ttl_nanos);
            match store.prune_auth_tokens(cutoff) {
                Ok(0) => {}
                Ok(count) => info!("Pruned {} expired auth tokens", count),
                Err(e) => error!("Failed to prune auth tokens: {}", e),
            }
        }
    });
}

fn spawn_metrics_refresh(store: Arc<dyn LibraryStore>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(METRICS_REFRESH_INTERVAL);
        loop {
            ticker.tick().await;
            server::metrics::update_library_metrics(store.as_ref());
            server::metrics::update_memory_usage();
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config file {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let app_config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    info!("Opening SQLite library database at {:?}...", app_config.db_path);
    let store = SqliteLibraryStore::new(&app_config.db_path)?;
    if let Some(user) = &app_config.bootstrap_user {
        bootstrap_user(&store, user)?;
    }
    let store: Arc<dyn LibraryStore> = Arc::new(store);

    info!("Initializing metrics...");
    server::metrics::init_metrics();
    spawn_metrics_refresh(store.clone());
    spawn_token_pruning(
        store.clone(),
        app_config.prune_interval_hours,
        app_config.token_ttl_sec,
    );

    let tls_config = match &app_config.ssl {
        Some(ssl) => {
            info!("Loading TLS certificate {:?}", ssl.cert_path);
            Some(load_tls_config(&ssl.cert_path, &ssl.key_path)?)
        }
        None => None,
    };

    info!("Ready to serve at port {}!", app_config.port);
    info!("Metrics available at port {}!", app_config.metrics_port);
    run_server(app_config.server_config(), store, tls_config).await
}
