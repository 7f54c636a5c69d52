use serde_json::Value;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::mapping::SchemaMismatch;
use super::transport::{HttpRequest, Transport};

/// The two externally owned schemas the translation map is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaService {
    Survey,
    Skills,
}

impl SchemaService {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Survey => "SM",
            Self::Skills => "COS",
        }
    }
}

impl fmt::Display for SchemaService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("failed both to fetch a new copy and to load the cached copy of the {service} schema")]
    Unavailable { service: SchemaService },
    #[error("schema mismatch: {0}")]
    Mismatch(#[from] SchemaMismatch),
    #[error("malformed {service} schema: {reason}")]
    Malformed {
        service: SchemaService,
        reason: String,
    },
    #[error("could not decode {service} schema: {source}")]
    Decode {
        service: SchemaService,
        source: serde_json::Error,
    },
}

/// Where a schema lives remotely and where its last good copy is kept.
#[derive(Debug, Clone)]
pub struct SchemaEndpoint {
    pub url: String,
    pub bearer_token: String,
    pub cache_path: PathBuf,
}

/// Loads a service schema from its on-disk cache, refreshing it from the live
/// service when asked to or when the cache is unusable.
pub struct SchemaFetcher {
    transport: Arc<dyn Transport>,
    survey: SchemaEndpoint,
    skills: SchemaEndpoint,
}

impl SchemaFetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        survey: SchemaEndpoint,
        skills: SchemaEndpoint,
    ) -> Self {
        Self {
            transport,
            survey,
            skills,
        }
    }

    fn endpoint(&self, service: SchemaService) -> &SchemaEndpoint {
        match service {
            SchemaService::Survey => &self.survey,
            SchemaService::Skills => &self.skills,
        }
    }

    pub fn fetch_schema(
        &self,
        service: SchemaService,
        force_refresh: bool,
    ) -> Result<Value, SchemaError> {
        let endpoint = self.endpoint(service);

        let cached = load_cached(&endpoint.cache_path);
        let fetch = force_refresh || cached.is_none();
        if cached.is_none() {
            warn!(
                %service,
                cache = %endpoint.cache_path.display(),
                "cached schema unavailable, fetching a new copy"
            );
        }

        let fetched = if fetch { self.fetch_live(service, endpoint) } else { None };

        match (fetched, cached) {
            (None, None) => Err(SchemaError::Unavailable { service }),
            (None, Some(cached)) => Ok(cached),
            (Some(fetched), cached) if cached.as_ref() != Some(&fetched) => {
                warn!(
                    %service,
                    cache = %endpoint.cache_path.display(),
                    "fetched schema differs from cached copy, updating cache"
                );
                if let Err(err) = write_cache(&endpoint.cache_path, &fetched) {
                    error!(%service, error = %err, "failed to update schema cache");
                }
                Ok(fetched)
            }
            (Some(fetched), _) => {
                info!(
                    %service,
                    cache = %endpoint.cache_path.display(),
                    "fetched schema matches cached copy"
                );
                Ok(fetched)
            }
        }
    }

    fn fetch_live(&self, service: SchemaService, endpoint: &SchemaEndpoint) -> Option<Value> {
        let request = HttpRequest::get(&endpoint.url).bearer(&endpoint.bearer_token);
        match self.transport.send(&request) {
            Ok(reply) if reply.is_success() => match reply.json::<Value>() {
                Ok(value) => Some(value),
                Err(err) => {
                    error!(
                        %service,
                        error = %err,
                        "schema response was not JSON, using cached copy"
                    );
                    None
                }
            },
            Ok(reply) => {
                error!(
                    %service,
                    status = reply.status,
                    "schema request rejected, using cached copy"
                );
                None
            }
            Err(err) => {
                error!(%service, error = %err, "schema request failed, using cached copy");
                None
            }
        }
    }
}

fn load_cached(path: &Path) -> Option<Value> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "could not read schema cache");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "schema cache is not valid JSON");
            None
        }
    }
}

/// Replaces the cache file through a sibling temp file so readers never see a
/// partial write.
fn write_cache(path: &Path, value: &Value) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
    serde_json::to_writer(&mut temp, value)?;
    temp.flush()?;
    temp.persist(path).map_err(|err| err.error)?;
    Ok(())
}
