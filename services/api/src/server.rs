use crate::cli::ServeArgs;
use crate::infra::{AppState, SimulatedGateway, TracingNotificationSink};
use crate::routes::with_operational_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use move_broker::config::AppConfig;
use move_broker::error::AppError;
use move_broker::telemetry;
use move_broker::workflows::marketplace::{InMemoryMarketplaceStore, MarketplaceService};
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

    let service = Arc::new(MarketplaceService::new(
        Arc::new(InMemoryMarketplaceStore::new()),
        Arc::new(SimulatedGateway::default()),
        Arc::new(TracingNotificationSink),
        config.marketplace,
    ));

    let app = with_operational_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        review_window_hours = config.marketplace.review_window.num_hours(),
        "move broker ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
