use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryNotificationOutbox};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use blind_hire::config::AppConfig;
use blind_hire::error::AppError;
use blind_hire::telemetry;
use blind_hire::workflows::matching::{InMemoryMatchingStore, MatchingService};
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
    if let Some(limit) = args.browse_limit.take().filter(|limit| *limit > 0) {
        config.matching.browse_limit = limit;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryMatchingStore::default());
    let outbox = Arc::new(InMemoryNotificationOutbox::default());
    let service = Arc::new(MatchingService::new(
        store,
        outbox,
        config.matching.clone(),
    ));

    let app = with_service_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        browse_limit = config.matching.browse_limit,
        "blind-hire matching service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
