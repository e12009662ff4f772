use crate::cli::ServeArgs;
use crate::infra::{AppState, Marketplace};
use crate::routes::with_marketplace_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use carenest::config::AppConfig;
use carenest::error::AppError;
use carenest::notifications::{LogTransport, NotificationQueue};
use carenest::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let (queue, _worker) = NotificationQueue::spawn(LogTransport);
    let marketplace = Marketplace::in_memory(&config, Arc::new(queue));

    if let Some(admin) = &config.accounts.bootstrap_admin {
        let user = marketplace
            .accounts
            .bootstrap_admin(&admin.email, &admin.username)?;
        info!(user_id = %user.id, email = %user.email, "admin account available");
    }

    let app = with_marketplace_routes(&marketplace)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "carenest marketplace ready");

    axum::serve(listener, app).await?;
    Ok(())
}
