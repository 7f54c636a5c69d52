use crate::cli::ServeArgs;
use crate::infra::{build_pipeline, load_config, AppState};
use crate::routes::webhook_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use survey_bridge::config::AppConfig;
use survey_bridge::error::AppError;
use survey_bridge::workflows::skills_match::SurveyPipeline;
use tracing::info;

pub(crate) fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = load_config()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    let pipeline = Arc::new(build_pipeline(&config)?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(config, pipeline))
}

async fn serve(config: AppConfig, pipeline: Arc<SurveyPipeline>) -> Result<(), AppError> {
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        pipeline,
    };

    let app = webhook_routes()
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        test_mode = config.test_mode.is_some(),
        "survey bridge ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
