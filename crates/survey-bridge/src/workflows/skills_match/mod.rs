//! Survey-to-skills-matcher translation workflow.
//!
//! Schemas from both services are merged into a [`TranslationMap`]; each new
//! survey response is reconciled against that map, translated, scored by the
//! skills service, and the respondent is emailed their recommended jobs.

pub mod client;
pub mod contacts;
pub mod email;
pub mod fetcher;
pub mod mapping;
pub mod offline;
pub mod pipeline;
pub mod reconcile;
pub mod request;
pub mod response;
pub mod schema;
pub mod store;
pub mod text;
pub mod translate;
pub mod transport;

#[cfg(test)]
mod fixtures;
#[cfg(test)]
mod tests;

pub use client::{
    ListingError, RankedOccupation, ResponseSource, Scorer, SkillsClient, SkillsMatchResult,
    SubmissionError, SurveyClient,
};
pub use contacts::{check_email_address, email_address, EmailStatus};
pub use email::{
    compose_email, create_job_url, DryRunMailer, EmailMessage, Mailer, NotifyError, SmtpMailer,
};
pub use fetcher::{SchemaEndpoint, SchemaError, SchemaFetcher, SchemaService};
pub use mapping::{
    build_translation_map, AnswerOption, QuestionType, SchemaCombiner, SchemaMismatch,
    ServiceKeyed, TranslationMap, TranslationMapEntry, TranslationMapSource,
};
pub use offline::{CachedResults, FileResponseSource};
pub use pipeline::{
    BatchSummary, PipelineError, PipelineParts, PipelineSettings, ProcessedSummary, SurveyPipeline,
};
pub use reconcile::{find_unexpected_ids, Reconciler, Reconciliation};
pub use request::{build_request, RequestError, SkillValue, SkillsRequest};
pub use response::{AnswerFragment, RawResponse};
pub use store::{
    FailureKind, FailureRecord, JsonLinesStore, ProcessedRecord, ResponseStore, StoreError,
};
pub use translate::{translate, TranslatedAnswer, TranslatedQuestion, TranslatedResponse};
pub use transport::{HttpTransport, RetryPolicy, Transport, TransportError};
