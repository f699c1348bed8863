//! Reverse geocoding of observation points through Nominatim.
//!
//! The public Nominatim instance allows one request per second, so the runner spaces requests,
//! retries transient failures with exponential backoff and checkpoints its cache after every
//! batch. A rerun after a crash only asks for what is still missing.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::GeocodingConfig;
use crate::types::GeoPoint;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("geocode cache {path}: {source}")]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("geocode cache is not valid JSON: {0}")]
    CacheFormat(#[from] serde_json::Error),
}

impl GeocodeError {
    /// Errors worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, GeocodeError::Http(_) | GeocodeError::RateLimited)
    }
}

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    fn name(&self) -> &'static str;

    /// Address for `point`, or `None` when the service knows nothing there.
    async fn reverse(&self, point: GeoPoint) -> Result<Option<String>, GeocodeError>;
}

pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(base_url: impl Into<String>, user_agent: &str) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn from_config(config: &GeocodingConfig) -> Result<Self, GeocodeError> {
        Self::new(config.base_url.clone(), &config.user_agent)
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    fn name(&self) -> &'static str {
        "nominatim"
    }

    async fn reverse(&self, point: GeoPoint) -> Result<Option<String>, GeocodeError> {
        let lat = point.latitude.to_string();
        let lon = point.longitude.to_string();
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("format", "jsonv2"),
                ("zoom", "18"),
                ("addressdetails", "0"),
            ])
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::RateLimited);
        }

        let body: serde_json::Value = resp.error_for_status()?.json().await?;
        parse_reverse_response(&body)
    }
}

fn parse_reverse_response(body: &serde_json::Value) -> Result<Option<String>, GeocodeError> {
    let object = body.as_object().ok_or_else(|| GeocodeError::Parse {
        message: "Nominatim reverse response is not an object".to_string(),
    })?;
    if object.contains_key("error") {
        return Ok(None);
    }
    Ok(object
        .get("display_name")
        .and_then(|v| v.as_str())
        .map(String::from))
}

#[derive(Debug, Clone)]
pub struct GeocodeSettings {
    pub min_delay: Duration,
    pub batch_size: usize,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl From<&GeocodingConfig> for GeocodeSettings {
    fn from(config: &GeocodingConfig) -> Self {
        Self {
            min_delay: Duration::from_millis(config.min_delay_ms),
            batch_size: config.batch_size.max(1),
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
        }
    }
}

/// Lookups keyed by [`GeoPoint::cache_key`]. A `null` entry records a point the service had
/// no address for, so it is not asked again.
#[derive(Debug, Default)]
pub struct GeocodeCache {
    path: Option<PathBuf>,
    entries: BTreeMap<String, Option<String>>,
}

impl GeocodeCache {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens the cache file at `path`; a missing file is an empty cache.
    pub fn open(path: &Path) -> Result<Self, GeocodeError> {
        let entries = match fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => {
                return Err(GeocodeError::Cache {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            entries,
        })
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        self.entries.contains_key(&point.cache_key())
    }

    pub fn get(&self, point: &GeoPoint) -> Option<&Option<String>> {
        self.entries.get(&point.cache_key())
    }

    pub fn insert(&mut self, point: &GeoPoint, address: Option<String>) {
        self.entries.insert(point.cache_key(), address);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn addresses(&self) -> HashMap<String, Option<String>> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Writes the cache to its file, if it has one.
    pub fn checkpoint(&self) -> Result<(), GeocodeError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        let cache_error = |source| GeocodeError::Cache {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(cache_error)?;
        }
        let body = serde_json::to_string_pretty(&self.entries)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(cache_error)?;
        fs::rename(&tmp, path).map_err(cache_error)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedBatch {
    pub index: usize,
    pub points: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GeocodeReport {
    pub requested: usize,
    pub cached: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub failed_batches: Vec<FailedBatch>,
}

pub struct GeocodeRunner<'a> {
    geocoder: &'a dyn ReverseGeocoder,
    settings: GeocodeSettings,
    last_request: Option<Instant>,
}

impl<'a> GeocodeRunner<'a> {
    pub fn new(geocoder: &'a dyn ReverseGeocoder, settings: GeocodeSettings) -> Self {
        Self {
            geocoder,
            settings,
            last_request: None,
        }
    }

    /// Looks up every distinct point not yet in `cache`, batch by batch. A batch whose
    /// retries run out is reported and skipped; earlier batches stay in the cache.
    pub async fn run(
        &mut self,
        points: &[GeoPoint],
        cache: &mut GeocodeCache,
    ) -> Result<GeocodeReport, GeocodeError> {
        let mut seen = BTreeSet::new();
        let distinct: Vec<GeoPoint> = points
            .iter()
            .filter(|p| seen.insert(p.cache_key()))
            .copied()
            .collect();

        let mut report = GeocodeReport {
            requested: distinct.len(),
            ..GeocodeReport::default()
        };
        let pending: Vec<GeoPoint> = distinct
            .into_iter()
            .filter(|p| !cache.contains(p))
            .collect();
        report.cached = report.requested - pending.len();

        for (index, batch) in pending.chunks(self.settings.batch_size).enumerate() {
            match self.run_batch(batch, cache, &mut report).await {
                Ok(()) => debug!(batch = index, points = batch.len(), "geocode batch done"),
                Err(err) => {
                    warn!(batch = index, error = %err, "geocode batch aborted");
                    report.failed_batches.push(FailedBatch {
                        index,
                        points: batch.len(),
                        error: err.to_string(),
                    });
                }
            }
            cache.checkpoint()?;
        }

        info!(
            geocoder = self.geocoder.name(),
            requested = report.requested,
            cached = report.cached,
            resolved = report.resolved,
            unresolved = report.unresolved,
            failed_batches = report.failed_batches.len(),
            "reverse geocoding finished"
        );
        Ok(report)
    }

    async fn run_batch(
        &mut self,
        batch: &[GeoPoint],
        cache: &mut GeocodeCache,
        report: &mut GeocodeReport,
    ) -> Result<(), GeocodeError> {
        for point in batch {
            match self.lookup_with_retry(*point).await {
                Ok(address) => {
                    if address.is_some() {
                        report.resolved += 1;
                    } else {
                        report.unresolved += 1;
                    }
                    cache.insert(point, address);
                }
                Err(err) if err.is_transient() => return Err(err),
                Err(err) => {
                    debug!(point = %point, error = %err, "no usable geocode response");
                    report.unresolved += 1;
                }
            }
        }
        Ok(())
    }

    async fn lookup_with_retry(&mut self, point: GeoPoint) -> Result<Option<String>, GeocodeError> {
        let mut backoff = self.settings.initial_backoff;
        let mut attempt = 1;
        loop {
            self.wait_for_slot().await;
            match self.geocoder.reverse(point).await {
                Ok(address) => return Ok(address),
                Err(err) if err.is_transient() && attempt < self.settings.max_attempts => {
                    debug!(attempt, point = %point, error = %err, "retrying geocode");
                    sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn wait_for_slot(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.settings.min_delay {
                sleep(self.settings.min_delay - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}
