use kioskd::{browser::Navigator, server, KioskConfig, KioskSession};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = KioskConfig::from_env()?;
    info!(
        bind = %config.bind_addr,
        default_url = %config.default_url,
        "starting kiosk"
    );

    // No session, no service: a launch failure is fatal.
    let session = Arc::new(KioskSession::launch(&config).await?);

    // The kiosk shows its default target before the control endpoint opens.
    session.navigate(config.default_url.as_str()).await?;

    let navigator: Arc<dyn Navigator> = session.clone();
    tokio::spawn({
        let bind_addr = config.bind_addr;
        async move {
            if let Err(err) = server::serve(bind_addr, navigator).await {
                error!(%err, "control endpoint failed");
            }
        }
    });

    tokio::spawn({
        let session = session.clone();
        async move {
            wait_for_shutdown_signal().await;
            session.shutdown();
        }
    });

    // Exit only once the session has fully terminated, whether by signal or
    // by the browser window going away on its own.
    session.closed().await;
    info!("browser session terminated, exiting");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let handlers = (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
        signal(SignalKind::quit()),
    );
    let (mut interrupt, mut terminate, mut quit) = match handlers {
        (Ok(i), Ok(t), Ok(q)) => (i, t, q),
        _ => {
            error!("failed to install signal handlers");
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = interrupt.recv() => info!("received SIGINT"),
        _ = terminate.recv() => info!("received SIGTERM"),
        _ = quit.recv() => info!("received SIGQUIT"),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("received ctrl-c");
    }
}
