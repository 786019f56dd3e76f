use crate::cli::ServeArgs;
use crate::infra::{assemble_service, AppState, SeedStaffDirectory};
use crate::routes::with_maintenance_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tenant_maintenance::config::AppConfig;
use tenant_maintenance::error::AppError;
use tenant_maintenance::telemetry;
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
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let directory = match args.staff_roster.take() {
        Some(path) => {
            info!(path = %path.display(), "loading staff roster");
            SeedStaffDirectory::from_json_file(&path, &config.maintenance)?
        }
        None => SeedStaffDirectory::builtin(&config.maintenance),
    };
    let (service, _) = assemble_service(&directory, config.maintenance)?;

    let app = with_maintenance_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "maintenance request tracker ready");

    axum::serve(listener, app).await?;
    Ok(())
}
