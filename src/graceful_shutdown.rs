use std::future::Future;

use actix_web::dev::Server;
use tokio::signal;
use tracing::{error, info, warn};

/// Runs `server` until it exits on its own or `signal` resolves. On signal
/// the server stops accepting connections and in-flight requests are allowed
/// to finish.
pub async fn serve_until<F>(server: Server, signal: F) -> std::io::Result<()>
where
    F: Future<Output = ()>,
{
    let handle = server.handle();
    let server_task = actix_web::rt::spawn(server);

    tokio::select! {
        res = server_task => res.map_err(std::io::Error::other)?,
        _ = signal => {
            info!("Draining in-flight requests");
            handle.stop(true).await;
            Ok(())
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM. A signal that cannot be listened for is
/// logged and never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("🛑 Ctrl+C received, initiating shutdown...")
        },
        _ = terminate => {
            warn!("🛑 SIGTERM received, initiating shutdown...");
        }
    }
}
