//! File-backed stand-ins for the two live services, used in test mode.

use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

use super::client::{ListingError, ResponseSource, Scorer, SkillsMatchResult, SubmissionError};
use super::request::SkillsRequest;
use super::response::RawResponse;

/// Reads a JSON array of raw responses from disk.
#[derive(Debug, Clone)]
pub struct FileResponseSource {
    path: PathBuf,
}

impl FileResponseSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ResponseSource for FileResponseSource {
    fn list_responses(
        &self,
        processed: &HashSet<String>,
    ) -> Result<Vec<RawResponse>, ListingError> {
        debug!(path = %self.path.display(), "loading cached survey responses");
        let raw = fs::read_to_string(&self.path).map_err(|err| ListingError::Offline {
            path: self.path.display().to_string(),
            message: err.to_string(),
        })?;
        let mut responses: Vec<RawResponse> = serde_json::from_str(&raw)?;
        responses.retain(|response| !processed.contains(&response.id));
        Ok(responses)
    }
}

/// Scoring results recorded ahead of time, keyed by response id.
///
/// A response with no recorded result scores as an empty rank list.
#[derive(Debug, Clone)]
pub struct CachedResults {
    path: PathBuf,
}

impl CachedResults {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<Map<String, Value>, SubmissionError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "cached skills results unavailable"
                );
                return Ok(Map::new());
            }
        };
        Ok(serde_json::from_str(&raw)?)
    }
}

impl Scorer for CachedResults {
    fn score(
        &self,
        response_id: &str,
        _request: &SkillsRequest,
    ) -> Result<SkillsMatchResult, SubmissionError> {
        debug!(response_id, "loading cached skills results");
        match self.load()?.remove(response_id) {
            Some(result) => Ok(serde_json::from_value(result)?),
            None => {
                warn!(
                    response_id,
                    path = %self.path.display(),
                    "no cached skills result for response, using an empty result"
                );
                Ok(SkillsMatchResult::default())
            }
        }
    }
}
