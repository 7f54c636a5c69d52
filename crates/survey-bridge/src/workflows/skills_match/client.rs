use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::ListingConfig;

use super::request::SkillsRequest;
use super::response::RawResponse;
use super::transport::{HttpRequest, Transport, TransportError};

#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    #[error("failed to retrieve survey responses: {0}")]
    Transport(#[from] TransportError),
    #[error("survey response listing {url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("could not decode survey response listing: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("could not read survey responses from {path}: {message}")]
    Offline { path: String, message: String },
}

/// Upstream supply of raw responses for a batch.
pub trait ResponseSource: Send + Sync {
    /// New responses in listing order; anything in `processed` is excluded.
    fn list_responses(
        &self,
        processed: &HashSet<String>,
    ) -> Result<Vec<RawResponse>, ListingError>;
}

#[derive(Debug, Deserialize)]
struct ListingPage {
    #[serde(default)]
    data: Vec<RawResponse>,
    #[serde(default)]
    links: ListingLinks,
}

#[derive(Debug, Default, Deserialize)]
struct ListingLinks {
    #[serde(default)]
    next: Option<String>,
}

/// Survey platform `/responses/bulk` reader.
pub struct SurveyClient {
    transport: Arc<dyn Transport>,
    responses_url: String,
    access_token: String,
    listing: ListingConfig,
}

impl SurveyClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        responses_url: impl Into<String>,
        access_token: impl Into<String>,
        listing: ListingConfig,
    ) -> Self {
        Self {
            transport,
            responses_url: responses_url.into(),
            access_token: access_token.into(),
            listing,
        }
    }

    fn first_page_request(&self) -> HttpRequest {
        let mut request = HttpRequest::get(&self.responses_url)
            .bearer(&self.access_token)
            .query("per_page", self.listing.per_page.to_string())
            .query("status", self.listing.status.as_str())
            .query("total_time_min", self.listing.minimum_minutes.to_string())
            .query("total_time_units", "minute")
            .query("sort_by", self.listing.sort_by.as_str())
            .query("sort_order", self.listing.sort_order.as_str());
        if let Some(start) = self.listing.start_created_at {
            request = request.query(
                "start_created_at",
                start.format("%Y-%m-%dT%H:%M:%S+00:00").to_string(),
            );
        }
        request
    }
}

impl ResponseSource for SurveyClient {
    fn list_responses(
        &self,
        processed: &HashSet<String>,
    ) -> Result<Vec<RawResponse>, ListingError> {
        let mut responses: Vec<RawResponse> = Vec::new();
        let mut request = self.first_page_request();

        // Listing is newest-first, so a page holding an already-processed id
        // means everything older has been seen.
        loop {
            let reply = self.transport.send(&request)?;
            if !reply.is_success() {
                error!(
                    url = %request.url,
                    status = reply.status,
                    "failed to retrieve survey responses"
                );
                return Err(ListingError::Status {
                    url: request.url.clone(),
                    status: reply.status,
                });
            }

            let page: ListingPage = reply.json()?;
            responses.extend(page.data);

            if responses.iter().any(|response| processed.contains(&response.id)) {
                break;
            }
            match page.links.next {
                Some(next) => request = HttpRequest::get(next).bearer(&self.access_token),
                None => break,
            }
        }

        responses.retain(|response| !processed.contains(&response.id));
        if responses.is_empty() {
            info!("no new survey responses");
        } else {
            info!(count = responses.len(), "retrieved new survey responses");
        }
        Ok(responses)
    }
}

/// One recommended occupation from the scoring service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedOccupation {
    #[serde(rename = "Rank")]
    pub rank: u32,
    #[serde(rename = "OccupationTitle")]
    pub occupation_title: String,
    #[serde(rename = "OnetCode", default)]
    pub onet_code: String,
    #[serde(rename = "AnnualWages", default)]
    pub annual_wages: Option<f64>,
    #[serde(rename = "TypicalEducation", default)]
    pub typical_education: Option<String>,
}

/// Scoring result; unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillsMatchResult {
    #[serde(rename = "SKARankList", default)]
    pub ranked: Vec<RankedOccupation>,
}

impl SkillsMatchResult {
    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.ranked.iter().map(|job| job.occupation_title.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("skills submission failed: {0}")]
    Transport(#[from] TransportError),
    #[error("skills submission to {url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("could not decode skills submission result: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Submits a scoring request and returns ranked occupations.
pub trait Scorer: Send + Sync {
    fn score(
        &self,
        response_id: &str,
        request: &SkillsRequest,
    ) -> Result<SkillsMatchResult, SubmissionError>;
}

pub struct SkillsClient {
    transport: Arc<dyn Transport>,
    score_url: String,
    api_token: String,
}

impl SkillsClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        score_url: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            score_url: score_url.into(),
            api_token: api_token.into(),
        }
    }
}

impl Scorer for SkillsClient {
    fn score(
        &self,
        response_id: &str,
        request: &SkillsRequest,
    ) -> Result<SkillsMatchResult, SubmissionError> {
        let body = serde_json::to_value(request)?;
        let call = HttpRequest::post_json(&self.score_url, body).bearer(&self.api_token);

        let reply = self.transport.send(&call)?;
        if !reply.is_success() {
            error!(
                response_id,
                url = %self.score_url,
                status = reply.status,
                "skills submission rejected"
            );
            return Err(SubmissionError::Status {
                url: self.score_url.clone(),
                status: reply.status,
            });
        }

        let result: SkillsMatchResult = reply.json().map_err(|err| {
            warn!(response_id, error = %err, "skills submission result was not decodable");
            err
        })?;
        info!(response_id, jobs = result.ranked.len(), "recommended jobs received");
        Ok(result)
    }
}
