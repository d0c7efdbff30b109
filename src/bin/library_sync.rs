//! Headless sync client: keeps a local replica of a library server and
//! prints what it holds.

use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pezzottify_library::client::{CertificateErrorKind, ClientConfig, ClientError, LibraryClient};
use pezzottify_library::library_store::EntityKind;
use pezzottify_library::replica::{LibraryView, LocalDb, LocalReplica};

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the client TOML config.
    #[clap(long)]
    pub config: PathBuf,

    /// Keep refreshing every this many seconds.
    #[clap(long)]
    pub watch: Option<u64>,

    /// List a view after each refresh: menu, artists, albums, songs,
    /// playlists, users, unknown-artist, unknown-album, artist:<id>,
    /// album:<id>, playlist:<id>, favorites:<user id>.
    #[clap(long, default_value = "menu")]
    pub show: LibraryView,
}

fn print_counts(db: &LocalDb) {
    for kind in EntityKind::ALL {
        println!("{:>18}: {}", kind.to_string(), db.len(kind));
    }
    println!("{:>18}: {}", "watermark", db.watermark);
}

fn print_view(view: &LibraryView, db: &LocalDb) {
    println!("--- {} ---", view);
    for line in view.lines(db) {
        println!("{}", line);
    }
}

fn explain(err: ClientError) -> anyhow::Error {
    match err {
        ClientError::Certificate(CertificateErrorKind::CertificateChanged) => anyhow::anyhow!(
            "The server certificate changed since it was pinned. If this is expected, \
             delete the pinned server.pem from the data directory and connect again."
        ),
        ClientError::Certificate(CertificateErrorKind::BadHostname) => anyhow::anyhow!(
            "The server certificate is not valid for the configured host. Check that \
             `hostname` in the client config is a name the certificate was issued for."
        ),
        ClientError::Certificate(CertificateErrorKind::InvalidCertificate) => anyhow::anyhow!(
            "The server presented an unusable certificate (expired, malformed or not \
             yet valid). Renew the certificate on the server, or check the local clock."
        ),
        other => other.into(),
    }
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

    let config = ClientConfig::load(&cli_args.config)?;
    if config.self_signed && !config.ssl {
        bail!("self_signed requires ssl = true");
    }

    let client = LibraryClient::connect(&config).await.map_err(explain)?;
    let user_id = client.login().await.map_err(explain)?;
    info!("Logged in as user {}", user_id);

    let replica = LocalReplica::new(client);
    let mut view = cli_args.show;

    replica.refresh().await.map_err(explain)?;
    let db = replica.snapshot();
    print_counts(&db);
    view = view.revalidate(&db);
    print_view(&view, &db);

    if let Some(secs) = cli_args.watch {
        let mut ticker = tokio::time::interval(Duration::from_secs(secs.max(1)));
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = tokio::signal::ctrl_c() => break,
            }
            match replica.refresh().await {
                // entries stamped at the watermark come back on every refresh
                Ok(outcome) if outcome.watermark == outcome.from_ts => {}
                Ok(_) => {
                    let db = replica.snapshot();
                    print_counts(&db);
                    view = view.revalidate(&db);
                    print_view(&view, &db);
                }
                Err(err @ ClientError::Certificate(_)) => return Err(explain(err)),
                // already logged by the replica, try again next tick
                Err(_) => warn!("Keeping the previous replica state"),
            }
        }
    }

    replica.source().logout().await?;
    Ok(())
}
