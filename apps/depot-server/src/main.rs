//! Depot Server - warehouse file server with capability URLs.
//!
//! Serves uploaded files under `/api/files/<warehouse>/<filename>` through the
//! access gate, and exposes upload, capability issuance, verification, and
//! session endpoints.
//!
//! # Usage
//!
//! ```text
//! GATEWAY_LISTEN=0.0.0.0:3000 DEPOT_HMAC_SECRET=... depot-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GATEWAY_LISTEN` | `0.0.0.0:3000` | Bind address |
//! | `DEPOT_HMAC_SECRET` | *(development secret)* | Capability signing secret |
//! | `DEPOT_SESSION_SECRET` | *(development secret)* | Session signing secret |
//! | `DEPOT_DATA_DIR` | `./storage` | Metadata snapshot directory |
//! | `DEPOT_UPLOADS_DIR` | `./uploads` | Uploaded file bytes |
//! | `DEPOT_ADMIN_EMAIL` / `DEPOT_ADMIN_PASSWORD` | *(unset)* | Bootstrap superadmin |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

mod bootstrap;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use depot_core::{Clock, DepotConfig, SystemClock};
use depot_http::{DepotHttpConfig, DepotHttpService, DepotProvider};
use depot_store::MetadataStore;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Server version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the configured log level.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

/// Run the accept loop, serving connections until a shutdown signal is received.
async fn serve(listener: TcpListener, service: DepotHttpService<DepotProvider>) -> Result<()> {
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.with_peer(peer_addr);
                let conn = http.serve_connection(TokioIo::new(stream), svc);
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    graceful.shutdown().await;
    info!("all connections drained, exiting");

    Ok(())
}

/// Probe the health endpoint of a running server.
async fn run_health_check(addr: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;

    let (mut reader, mut writer) = stream.into_split();

    let request = format!("GET /health HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    writer.write_all(request.as_bytes()).await?;
    writer.shutdown().await?;

    let mut response = String::new();
    reader.read_to_string(&mut response).await?;

    if response.contains("200 OK") && response.contains("\"running\"") {
        Ok(())
    } else {
        anyhow::bail!("unhealthy response from {addr}")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = DepotConfig::from_env();

    // Handle --health-check flag for container health probes.
    if std::env::args().any(|a| a == "--health-check") {
        let addr = config.gateway_listen.replace("0.0.0.0", "127.0.0.1");
        let healthy = run_health_check(&addr).await.is_ok();
        std::process::exit(i32::from(!healthy));
    }

    init_tracing(&config.log_level)?;

    if config.uses_default_secrets() {
        warn!("using development signing secrets; set DEPOT_HMAC_SECRET and DEPOT_SESSION_SECRET");
    }

    let metadata_path = config.metadata_path();
    let store = MetadataStore::open(&metadata_path)
        .await
        .with_context(|| format!("failed to open metadata at {}", metadata_path.display()))?;

    if let Some((email, password)) = bootstrap::admin_from_env() {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        bootstrap::ensure_admin(&store, &email, &password, &now).await?;
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let http_config = DepotHttpConfig::from(&config);
    let addr: SocketAddr = config
        .gateway_listen
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.gateway_listen))?;

    info!(
        data_dir = %config.data_dir.display(),
        uploads_dir = %config.uploads_dir.display(),
        rate_limit = config.rate_limit,
        auto_verify_uploads = config.auto_verify_uploads,
        default_ttl_secs = config.default_ttl_secs,
        "initializing Depot",
    );

    let provider = DepotProvider::new(config, Arc::new(store), Arc::clone(&clock));
    let service = DepotHttpService::new(provider, http_config, clock);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(%addr, version = VERSION, "starting Depot server");

    serve(listener, service).await
}
