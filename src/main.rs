use anyhow::{Context, Result};
use axum::Router;
use soubise::{
    config::{AppConfig, CommandConfig, GetConfig, LogConfig, ServerConfig, ShareConfig},
    routes::routes::routes,
    services::{
        archive_service::ArchiveService, client::Client, expiry::ExpiryEngine,
        memory_storage::IN_MEMORY_STORAGE_KIND, object_store::ObjectStore, resolve,
    },
    shutdown::{InterruptOutcome, watch_interrupts},
};
use std::{io::ErrorKind, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// How long in-flight requests get to finish once shutdown starts.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = AppConfig::from_env_and_args()?;

    // --- Logging setup ---
    init_logging(&cfg.log);
    tracing::debug!("Starting soubise with config: {:?}", cfg);

    match cfg.command {
        CommandConfig::Server(server) => run_server(server).await,
        CommandConfig::Share(share) => run_share(share).await,
        CommandConfig::Get(get) => run_get(get).await,
    }
}

fn init_logging(log: &LogConfig) {
    let default_level = if log.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run_server(cfg: ServerConfig) -> Result<()> {
    tracing::info!(address = %cfg.host, port = cfg.port, "booting server");

    // --- Resolve collaborators; failures here abort startup ---
    let broker = resolve::broker_from_path(&cfg.broker_path).context("broker initialization")?;
    let backend = resolve::storage_from_path(&cfg.storage_path, broker)
        .context("storage initialization")?;

    let store = Arc::new(ObjectStore::new());
    store.bind(backend).context("storage initialization")?;
    let expiry = Arc::new(ExpiryEngine::new());

    if store.kind() != Some(IN_MEMORY_STORAGE_KIND) {
        match expiry.reconcile(&store).await {
            Ok(report) => tracing::info!(
                tracked = report.tracked,
                removed = report.removed,
                failed = report.failed,
                "reconciled stored archives"
            ),
            Err(err) => tracing::warn!(
                error = %err,
                "unable to list stored archives, expiry is enforced on read until they are"
            ),
        }
    }

    let token = shutdown_token();

    let reaper = cfg.active_expiry.then(|| {
        tokio::spawn(
            expiry
                .clone()
                .run(store.clone(), cfg.tick_expiry, token.clone()),
        )
    });

    // --- Build router ---
    let service = ArchiveService::new(store.clone(), expiry.clone());
    let app: Router = routes().with_state(service);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!(
        storage = store.kind().unwrap_or_default(),
        "Server listening on http://{}",
        listener.local_addr()?
    );

    let serve = axum::serve(listener, app).with_graceful_shutdown({
        let token = token.clone();
        async move { token.cancelled().await }
    });
    let mut server = tokio::spawn(async move { serve.await });

    tokio::select! {
        result = &mut server => result??,
        _ = token.cancelled() => {
            tracing::info!(
                "received shutdown request, allowing maximum {}s for server to shutdown gracefully",
                SHUTDOWN_GRACE.as_secs()
            );
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
                Ok(result) => result??,
                Err(_) => {
                    tracing::warn!("graceful shutdown deadline passed, aborting in-flight requests");
                    server.abort();
                }
            }
        }
    }

    token.cancel();
    if let Some(reaper) = reaper {
        let _ = reaper.await;
    }
    tracing::info!(pending_expiry = expiry.len(), "server has stopped");
    Ok(())
}

/// Cancelled on Ctrl+C or SIGTERM; a second Ctrl+C exits immediately.
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            if watch_interrupts(token, tokio::signal::ctrl_c).await == InterruptOutcome::Forced {
                eprintln!("Force exiting.");
                std::process::exit(130);
            }
        });
    }

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let token = token.clone();
        tokio::spawn(async move {
            if let Ok(mut term) = signal(SignalKind::terminate()) {
                term.recv().await;
                token.cancel();
            }
        });
    }

    token
}

async fn run_share(cfg: ShareConfig) -> Result<()> {
    println!("   Server: {}", cfg.server);
    let receipt = Client::new()?
        .share(&cfg.file, cfg.lifetime, &cfg.server)
        .await
        .context("unable to share")?;

    println!("     File: {}", receipt.name);
    println!("     Size: {} bytes", receipt.size);
    println!("   SHA256: {}", receipt.sha256);
    println!("  Expires: {}", receipt.expiry.to_rfc2822());
    println!();
    println!("Encrypted file has been stored successfully! Use the following to share:");
    println!("  {}", receipt.reference);
    Ok(())
}

async fn run_get(cfg: GetConfig) -> Result<()> {
    let dest = std::env::current_dir().context("resolving current directory")?;
    let download = Client::new()?
        .get(&cfg.reference_path, &dest)
        .await
        .context("unable to get content")?;

    println!("{} ({} bytes)", download.path.display(), download.size);
    Ok(())
}
