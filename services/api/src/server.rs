use crate::cli::ServeArgs;
use crate::infra::{
    seed_demo_fleet, AppState, InMemoryAlertStore, InMemoryDriverDirectory,
    InMemoryWorkRecordStore,
};
use crate::routes::with_compliance_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Utc;
use duty_watch::compliance::{CompliancePolicy, ComplianceService, SweepScheduler};
use duty_watch::config::AppConfig;
use duty_watch::error::AppError;
use duty_watch::telemetry;
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

    let records = Arc::new(InMemoryWorkRecordStore::default());
    let alerts = Arc::new(InMemoryAlertStore::default());
    let roster = Arc::new(InMemoryDriverDirectory::default());
    seed_demo_fleet(&records, &roster, Utc::now().date_naive())?;

    let service = Arc::new(ComplianceService::new(
        records,
        alerts,
        roster,
        CompliancePolicy::default(),
    ));

    let scheduler = SweepScheduler::new(service.clone(), config.sweep.schedule());
    tokio::spawn(scheduler.run());

    let app = with_compliance_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "duty watch compliance service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
