use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info, warn};

use super::client::{ListingError, ResponseSource, Scorer, SkillsMatchResult};
use super::contacts::{check_email_address, email_address};
use super::email::{compose_email, Mailer};
use super::fetcher::SchemaError;
use super::mapping::{TranslationMap, TranslationMapSource};
use super::reconcile::{Reconciler, Reconciliation};
use super::request::build_request;
use super::response::RawResponse;
use super::store::{
    ContactOutcome, FailureData, FailureKind, FailureRecord, JobSummary, ProcessedRecord,
    ResponseStore, StoreError,
};
use super::translate::translate;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Source(#[from] ListingError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub max_recommendations: usize,
    pub max_refreshes: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_recommendations: 10,
            max_refreshes: 2,
        }
    }
}

/// Per-response outcome reported back to the webhook caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedSummary {
    pub id: String,
    pub valid_status: String,
    pub jobs: JobSummary,
    pub contacted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub successes: Vec<ProcessedSummary>,
    pub failures: Vec<FailureRecord>,
}

/// Collaborators a batch is run against.
pub struct PipelineParts {
    pub map_source: Arc<dyn TranslationMapSource>,
    pub responses: Arc<dyn ResponseSource>,
    pub scorer: Arc<dyn Scorer>,
    pub mailer: Arc<dyn Mailer>,
    pub store: Arc<dyn ResponseStore>,
}

/// Lists new responses, then reconciles, translates, scores, notifies and
/// records each one in listing order.
///
/// Only schema, listing, and store-read failures abort a batch; everything
/// else is confined to the response it happened on.
pub struct SurveyPipeline {
    reconciler: Reconciler,
    responses: Arc<dyn ResponseSource>,
    scorer: Arc<dyn Scorer>,
    mailer: Arc<dyn Mailer>,
    store: Arc<dyn ResponseStore>,
    settings: PipelineSettings,
    running: Mutex<()>,
}

struct BatchState {
    map: Arc<TranslationMap>,
    contacted: HashSet<String>,
    summary: BatchSummary,
}

impl SurveyPipeline {
    pub fn new(parts: PipelineParts, settings: PipelineSettings) -> Self {
        Self {
            reconciler: Reconciler::new(parts.map_source, settings.max_refreshes),
            responses: parts.responses,
            scorer: parts.scorer,
            mailer: parts.mailer,
            store: parts.store,
            settings,
            running: Mutex::new(()),
        }
    }

    pub fn translation_map(&self, force_refresh: bool) -> Result<TranslationMap, SchemaError> {
        self.reconciler.source().build_translation_map(force_refresh)
    }

    pub fn run_batch(&self) -> Result<BatchSummary, PipelineError> {
        // Batches share the store files, so they never overlap.
        let _running = self.running.lock().unwrap_or_else(PoisonError::into_inner);

        let processed = self.store.processed_ids()?;
        let contacted = self.store.contacted_addresses()?;
        let responses = self.responses.list_responses(&processed)?;
        if responses.is_empty() {
            return Ok(BatchSummary::default());
        }

        let mut state = BatchState {
            map: Arc::new(self.translation_map(false)?),
            contacted,
            summary: BatchSummary::default(),
        };
        for response in responses {
            self.process(response, &mut state)?;
        }

        info!(
            successes = state.summary.successes.len(),
            failures = state.summary.failures.len(),
            "survey batch complete"
        );
        Ok(state.summary)
    }

    fn process(&self, response: RawResponse, state: &mut BatchState) -> Result<(), SchemaError> {
        info!(response_id = %response.id, "processing survey response");

        if let Reconciliation::Unreconciled { unexpected, .. } =
            self.reconciler.reconcile(&response, &mut state.map)?
        {
            warn!(
                response_id = %response.id,
                "unable to reconcile response questions with the translation map, skipping"
            );
            let unexpected_questions = unexpected.into_iter().collect();
            self.record_failure(
                state,
                response,
                FailureKind::UnexpectedQuestionIds,
                unexpected_questions,
            );
            return Ok(());
        }

        let translated = translate(&response, &state.map);
        let address = email_address(&response);
        let status = check_email_address(address.as_deref(), &state.contacted);

        let mut result = SkillsMatchResult::default();
        let mut contacted = false;
        if status.is_valid() {
            let request = match build_request(&translated) {
                Ok(request) => request,
                Err(err) => {
                    error!(
                        response_id = %response.id,
                        error = %err,
                        "failed to build skills request"
                    );
                    self.record_failure(state, response, FailureKind::Translation, Vec::new());
                    return Ok(());
                }
            };

            result = self
                .scorer
                .score(&response.id, &request)
                .unwrap_or_else(|err| {
                    error!(
                        response_id = %response.id,
                        error = %err,
                        "skills submission failed, using an empty result"
                    );
                    SkillsMatchResult::default()
                });

            if let (Some(message), Some(recipient)) = (
                compose_email(&result, self.settings.max_recommendations),
                address.as_deref(),
            ) {
                match self.mailer.send(&response.id, recipient, &message) {
                    Ok(()) => contacted = true,
                    Err(err) => error!(
                        response_id = %response.id,
                        recipient,
                        error = %err,
                        "failed to send email"
                    ),
                }
            }
        } else {
            warn!(
                response_id = %response.id,
                address = address.as_deref().unwrap_or_default(),
                reason = %status.valid_status(),
                "invalid email address, skipping send"
            );
        }

        if contacted {
            if let Some(address) = &address {
                state.contacted.insert(address.clone());
            }
        }

        let jobs = JobSummary::from_titles(result.titles());
        info!(
            response_id = %response.id,
            jobs = jobs.n,
            valid_status = %status.valid_status(),
            contacted,
            "survey response processed"
        );
        let record = ProcessedRecord {
            id: response.id.clone(),
            date_added: Utc::now(),
            processed: translated,
            raw: response,
            jobs,
            email: ContactOutcome {
                address,
                valid_status: status.valid_status(),
                contacted,
            },
        };
        if let Err(err) = self.store.append_processed(&record) {
            error!(response_id = %record.id, error = %err, "failed to store processed response");
        }

        state.summary.successes.push(ProcessedSummary {
            id: record.id,
            valid_status: record.email.valid_status,
            jobs: record.jobs,
            contacted,
        });
        Ok(())
    }

    fn record_failure(
        &self,
        state: &mut BatchState,
        response: RawResponse,
        error_type: FailureKind,
        unexpected_questions: Vec<String>,
    ) {
        let record = FailureRecord {
            id: response.id.clone(),
            date_added: Utc::now(),
            error_type,
            data: FailureData {
                raw: response,
                unexpected_questions,
            },
        };
        if let Err(err) = self.store.append_failure(&record) {
            error!(response_id = %record.id, error = %err, "failed to store problem response");
        }
        state.summary.failures.push(record);
    }
}
