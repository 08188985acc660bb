use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use tracing::info;

use admission_flow::config::AppConfig;
use admission_flow::error::AppError;
use admission_flow::telemetry;
use admission_flow::workflows::selection::router::SelectionState;
use admission_flow::workflows::selection::{
    CapacityScheduler, InMemoryDraftStore, StageOrchestrator, SubmissionLedger,
};

use crate::cli::ServeArgs;
use crate::infra::{default_roster, AppState, InMemorySelectionStore, LogNotifier};
use crate::routes::with_selection_routes;

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

    let store = Arc::new(InMemorySelectionStore::default());
    let drafts = Arc::new(InMemoryDraftStore::new(config.drafts.ttl));
    let notices = Arc::new(LogNotifier);

    let state = SelectionState {
        ledger: Arc::new(SubmissionLedger::new(
            store.clone(),
            drafts.clone(),
            notices.clone(),
        )),
        scheduler: Arc::new(CapacityScheduler::new(store.clone(), notices.clone())),
        orchestrator: Arc::new(StageOrchestrator::new(store.clone())),
        drafts,
        store,
        directory: Arc::new(default_roster()),
    };

    let app = with_selection_routes(state)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "admission selection service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
