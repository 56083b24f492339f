//! HTTP server lifecycle.

use std::sync::Arc;

use miette::Result;
use tokio::net::TcpListener;
use tracing::info;

use tickler_scheduler::Scheduler;
use tickler_web::create_router;

use crate::config::Config;

/// Serve the REST API until Ctrl-C or SIGTERM, then stop the scheduler.
pub async fn run(config: Config) -> Result<()> {
    let scheduler = Arc::new(Scheduler::with_config(config.scheduler_config()));
    let router = create_router(Arc::clone(&scheduler));

    let addr = config.rest_api.addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| miette::miette!("failed to bind {}: {}", addr, e))?;

    info!(
        work_duration_ms = config.scheduler.work_duration_ms,
        "service listening on http://{}", addr
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| miette::miette!("{}", e))?;

    let pending = scheduler.shutdown().await;
    info!(pending, "tickler stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("received shutdown signal");
}
