use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

use super::response::RawResponse;
use super::translate::TranslatedResponse;

/// Maximum number of recommended titles kept on a processed record.
pub const STORED_TOP_JOBS: usize = 10;

/// One fully processed response, as appended to the response log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub id: String,
    pub date_added: DateTime<Utc>,
    pub raw: RawResponse,
    pub processed: TranslatedResponse,
    pub jobs: JobSummary,
    pub email: ContactOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub n: usize,
    pub top: Vec<String>,
}

impl JobSummary {
    pub fn from_titles<'a>(titles: impl Iterator<Item = &'a str>) -> Self {
        let titles: Vec<&str> = titles.collect();
        Self {
            n: titles.len(),
            top: titles
                .into_iter()
                .take(STORED_TOP_JOBS)
                .map(str::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactOutcome {
    pub address: Option<String>,
    pub valid_status: String,
    pub contacted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UnexpectedQuestionIds,
    Translation,
}

/// A response routed to the problem sink instead of being processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub id: String,
    pub date_added: DateTime<Utc>,
    pub error_type: FailureKind,
    pub data: FailureData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureData {
    pub raw: RawResponse,
    pub unexpected_questions: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("response store io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not encode store record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Durable record of processed responses and contacted addresses.
pub trait ResponseStore: Send + Sync {
    /// Ids a batch must skip: processed responses and those already routed
    /// to the problem sink.
    fn processed_ids(&self) -> Result<HashSet<String>, StoreError>;
    fn contacted_addresses(&self) -> Result<HashSet<String>, StoreError>;
    fn append_processed(&self, record: &ProcessedRecord) -> Result<(), StoreError>;
    fn append_failure(&self, record: &FailureRecord) -> Result<(), StoreError>;
}

/// Newline-delimited JSON files, one object per line.
#[derive(Debug, Clone)]
pub struct JsonLinesStore {
    responses_path: PathBuf,
    failures_path: PathBuf,
}

/// Only the fields needed to rebuild the processed and contacted sets.
#[derive(Debug, Deserialize)]
struct StoredSummary {
    id: String,
    #[serde(default)]
    email: Option<StoredContact>,
}

#[derive(Debug, Deserialize)]
struct StoredContact {
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    contacted: bool,
}

impl JsonLinesStore {
    pub fn new(responses_path: impl Into<PathBuf>, failures_path: impl Into<PathBuf>) -> Self {
        Self {
            responses_path: responses_path.into(),
            failures_path: failures_path.into(),
        }
    }

    fn summaries(path: &Path) -> Result<Vec<StoredSummary>, StoreError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let mut summaries = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| StoreError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StoredSummary>(&line) {
                Ok(summary) => summaries.push(summary),
                Err(err) => warn!(
                    path = %path.display(),
                    line = index + 1,
                    error = %err,
                    "skipping unreadable store line"
                ),
            }
        }
        Ok(summaries)
    }

    fn append<T: Serialize>(path: &Path, record: &T) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let io_error = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_error)?;
        file.write_all(line.as_bytes()).map_err(io_error)
    }
}

impl ResponseStore for JsonLinesStore {
    fn processed_ids(&self) -> Result<HashSet<String>, StoreError> {
        let mut ids: HashSet<String> = Self::summaries(&self.responses_path)?
            .into_iter()
            .map(|summary| summary.id)
            .collect();
        ids.extend(
            Self::summaries(&self.failures_path)?
                .into_iter()
                .map(|summary| summary.id),
        );
        Ok(ids)
    }

    fn contacted_addresses(&self) -> Result<HashSet<String>, StoreError> {
        Ok(Self::summaries(&self.responses_path)?
            .into_iter()
            .filter_map(|summary| summary.email)
            .filter(|contact| contact.contacted)
            .filter_map(|contact| contact.address)
            .collect())
    }

    fn append_processed(&self, record: &ProcessedRecord) -> Result<(), StoreError> {
        Self::append(&self.responses_path, record)
    }

    fn append_failure(&self, record: &FailureRecord) -> Result<(), StoreError> {
        Self::append(&self.failures_path, record)
    }
}
