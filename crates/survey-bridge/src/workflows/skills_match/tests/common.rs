use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::workflows::skills_match::client::{
    ListingError, RankedOccupation, ResponseSource, Scorer, SkillsMatchResult, SubmissionError,
};
use crate::workflows::skills_match::email::{EmailMessage, Mailer, NotifyError};
use crate::workflows::skills_match::fetcher::SchemaError;
use crate::workflows::skills_match::fixtures;
use crate::workflows::skills_match::mapping::{
    build_translation_map, TranslationMap, TranslationMapSource,
};
use crate::workflows::skills_match::pipeline::{PipelineParts, PipelineSettings, SurveyPipeline};
use crate::workflows::skills_match::request::SkillsRequest;
use crate::workflows::skills_match::response::RawResponse;
use crate::workflows::skills_match::schema::SkillsCatalog;
use crate::workflows::skills_match::store::{
    FailureRecord, ProcessedRecord, ResponseStore, StoreError,
};

/// Builds maps from the fixtures; a forced refresh can swap in another
/// skills catalog.
#[derive(Default)]
pub(super) struct FixtureMapSource {
    pub refreshed_skills: Option<SkillsCatalog>,
    pub builds: Mutex<Vec<bool>>,
}

impl FixtureMapSource {
    pub fn builds(&self) -> Vec<bool> {
        self.builds.lock().expect("builds mutex poisoned").clone()
    }
}

impl TranslationMapSource for FixtureMapSource {
    fn build_translation_map(&self, force_refresh: bool) -> Result<TranslationMap, SchemaError> {
        self.builds
            .lock()
            .expect("builds mutex poisoned")
            .push(force_refresh);
        let skills = match (&self.refreshed_skills, force_refresh) {
            (Some(refreshed), true) => refreshed.clone(),
            _ => fixtures::skills_catalog(),
        };
        build_translation_map(&fixtures::survey_details(), &skills)
    }
}

pub(super) struct StaticResponses(pub Vec<RawResponse>);

impl ResponseSource for StaticResponses {
    fn list_responses(
        &self,
        processed: &HashSet<String>,
    ) -> Result<Vec<RawResponse>, ListingError> {
        Ok(self
            .0
            .iter()
            .filter(|response| !processed.contains(&response.id))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub(super) struct StubScorer {
    pub failing: HashSet<String>,
    pub requests: Mutex<Vec<(String, SkillsRequest)>>,
}

impl StubScorer {
    pub fn requests(&self) -> Vec<(String, SkillsRequest)> {
        self.requests.lock().expect("requests mutex poisoned").clone()
    }
}

impl Scorer for StubScorer {
    fn score(
        &self,
        response_id: &str,
        request: &SkillsRequest,
    ) -> Result<SkillsMatchResult, SubmissionError> {
        self.requests
            .lock()
            .expect("requests mutex poisoned")
            .push((response_id.to_string(), request.clone()));
        if self.failing.contains(response_id) {
            return Err(SubmissionError::Status {
                url: "https://cos.test/skills".to_string(),
                status: 500,
            });
        }
        Ok(SkillsMatchResult {
            ranked: vec![
                occupation(1, "Librarians", 61190.0),
                occupation(2, "Archivists", 58400.0),
            ],
        })
    }
}

fn occupation(rank: u32, title: &str, wages: f64) -> RankedOccupation {
    RankedOccupation {
        rank,
        occupation_title: title.to_string(),
        onet_code: format!("25-40{rank:02}.00"),
        annual_wages: Some(wages),
        typical_education: Some("Master's degree".to_string()),
    }
}

#[derive(Default)]
pub(super) struct RecordingMailer {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().expect("sent mutex poisoned").clone()
    }
}

impl Mailer for RecordingMailer {
    fn send(
        &self,
        response_id: &str,
        recipient: &str,
        _message: &EmailMessage,
    ) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .expect("sent mutex poisoned")
            .push((response_id.to_string(), recipient.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct InMemoryStore {
    pub processed: Mutex<Vec<ProcessedRecord>>,
    pub failures: Mutex<Vec<FailureRecord>>,
    pub seeded_ids: HashSet<String>,
    pub seeded_contacts: HashSet<String>,
}

impl InMemoryStore {
    pub fn processed(&self) -> Vec<ProcessedRecord> {
        self.processed.lock().expect("store mutex poisoned").clone()
    }

    pub fn failures(&self) -> Vec<FailureRecord> {
        self.failures.lock().expect("store mutex poisoned").clone()
    }
}

impl ResponseStore for InMemoryStore {
    fn processed_ids(&self) -> Result<HashSet<String>, StoreError> {
        let mut ids = self.seeded_ids.clone();
        ids.extend(self.processed().into_iter().map(|record| record.id));
        ids.extend(self.failures().into_iter().map(|record| record.id));
        Ok(ids)
    }

    fn contacted_addresses(&self) -> Result<HashSet<String>, StoreError> {
        let mut addresses = self.seeded_contacts.clone();
        addresses.extend(
            self.processed()
                .into_iter()
                .filter(|record| record.email.contacted)
                .filter_map(|record| record.email.address),
        );
        Ok(addresses)
    }

    fn append_processed(&self, record: &ProcessedRecord) -> Result<(), StoreError> {
        self.processed
            .lock()
            .expect("store mutex poisoned")
            .push(record.clone());
        Ok(())
    }

    fn append_failure(&self, record: &FailureRecord) -> Result<(), StoreError> {
        self.failures
            .lock()
            .expect("store mutex poisoned")
            .push(record.clone());
        Ok(())
    }
}

pub(super) struct Harness {
    pub pipeline: SurveyPipeline,
    pub map_source: Arc<FixtureMapSource>,
    pub scorer: Arc<StubScorer>,
    pub mailer: Arc<RecordingMailer>,
    pub store: Arc<InMemoryStore>,
}

pub(super) fn harness(
    responses: Vec<RawResponse>,
    map_source: FixtureMapSource,
    scorer: StubScorer,
    store: InMemoryStore,
) -> Harness {
    let map_source = Arc::new(map_source);
    let scorer = Arc::new(scorer);
    let mailer = Arc::new(RecordingMailer::default());
    let store = Arc::new(store);

    let pipeline = SurveyPipeline::new(
        PipelineParts {
            map_source: map_source.clone(),
            responses: Arc::new(StaticResponses(responses)),
            scorer: scorer.clone(),
            mailer: mailer.clone(),
            store: store.clone(),
        },
        PipelineSettings::default(),
    );

    Harness {
        pipeline,
        map_source,
        scorer,
        mailer,
        store,
    }
}

pub(super) fn response_with_email(id: &str, address: &str) -> RawResponse {
    let mut response = fixtures::raw_response(id);
    let email_page = response.pages.last_mut().expect("email page");
    email_page.questions[0].answers = vec![serde_json::from_value(
        serde_json::json!({ "text": address }),
    )
    .expect("fragment decodes")];
    response
}
