use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use survey_bridge::config::AppConfig;
use survey_bridge::error::AppError;
use survey_bridge::telemetry;
use survey_bridge::workflows::skills_match::{
    CachedResults, DryRunMailer, FileResponseSource, HttpTransport, JsonLinesStore, Mailer,
    PipelineParts, PipelineSettings, ResponseSource, RetryPolicy, SchemaCombiner, SchemaEndpoint,
    SchemaFetcher, Scorer, SkillsClient, SmtpMailer, SurveyClient, SurveyPipeline, Transport,
};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) pipeline: Arc<SurveyPipeline>,
}

/// Loads configuration and installs the tracing subscriber.
pub(crate) fn load_config() -> Result<AppConfig, AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    Ok(config)
}

/// Wires the batch pipeline against the live services, or against local
/// files when test mode is enabled.
pub(crate) fn build_pipeline(config: &AppConfig) -> Result<SurveyPipeline, AppError> {
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(
        config.http.timeout,
        RetryPolicy::with_attempts(config.http.max_attempts),
    )?);

    let fetcher = SchemaFetcher::new(
        transport.clone(),
        SchemaEndpoint {
            url: config.survey.details_url(),
            bearer_token: config.survey.access_token.clone(),
            cache_path: config.survey.details_cache.clone(),
        },
        SchemaEndpoint {
            url: config.skills.schema_url.clone(),
            bearer_token: config.skills.api_token.clone(),
            cache_path: config.skills.schema_cache.clone(),
        },
    );

    let (responses, scorer, mailer): (Arc<dyn ResponseSource>, Arc<dyn Scorer>, Arc<dyn Mailer>) =
        match &config.test_mode {
            Some(test_mode) => {
                info!(
                    responses = %test_mode.responses_path.display(),
                    results = %test_mode.results_path.display(),
                    "test mode enabled, using local responses and results"
                );
                (
                    Arc::new(FileResponseSource::new(&test_mode.responses_path)),
                    Arc::new(CachedResults::new(&test_mode.results_path)),
                    Arc::new(DryRunMailer),
                )
            }
            None => (
                Arc::new(SurveyClient::new(
                    transport.clone(),
                    config.survey.responses_url(),
                    config.survey.access_token.clone(),
                    config.survey.listing.clone(),
                )),
                Arc::new(SkillsClient::new(
                    transport,
                    config.skills.score_url.clone(),
                    config.skills.api_token.clone(),
                )),
                Arc::new(SmtpMailer::from_config(&config.email)?),
            ),
        };

    Ok(SurveyPipeline::new(
        PipelineParts {
            map_source: Arc::new(SchemaCombiner::new(fetcher)),
            responses,
            scorer,
            mailer,
            store: Arc::new(JsonLinesStore::new(
                config.store.responses_path.clone(),
                config.store.failures_path.clone(),
            )),
        },
        PipelineSettings {
            max_recommendations: config.email.max_recommendations,
            max_refreshes: config.drift_max_refreshes,
        },
    ))
}
