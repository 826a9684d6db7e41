use anyhow::Result;
use axum::Router;
use chrono::Utc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use custody_application::commands::auto_approval_commands::run_auto_approval;
use custody_application::AppState;
use custody_domain::{AutoApprovalReport, Principal};
use custody_infrastructure::AppConfig;
use custody_interfaces_http::build_router;

use crate::context::AppContext;
use crate::scheduler::schedule_auto_approval;

fn build_router_with_layers(state: AppState) -> Router {
    build_router(state.clone())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(
            usize::try_from(state.config.max_body_bytes).unwrap_or(usize::MAX),
        ))
        .layer(TimeoutLayer::new(std::time::Duration::from_secs(
            state.config.request_timeout_seconds,
        )))
        .layer(TraceLayer::new_for_http())
}

pub async fn run_standalone(config: &AppConfig) -> Result<()> {
    let context = AppContext::new(config).await?;
    let state = context.state;

    let scheduler = if state.config.auto_approve_interval_minutes > 0 {
        Some(tokio::spawn(schedule_auto_approval(
            state.clone(),
            state.config.auto_approve_interval_minutes,
        )))
    } else {
        None
    };

    let app = build_router_with_layers(state.clone());
    let addr: std::net::SocketAddr = state.config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = scheduler {
        handle.abort();
    }
    info!("server stopped");
    Ok(())
}

/// One engine run for crontab use.
pub async fn run_auto_approval_once(config: &AppConfig) -> Result<AutoApprovalReport> {
    let context = AppContext::new(config).await?;
    let report = run_auto_approval(&context.state, &Principal::System, Utc::now()).await?;
    Ok(report)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
