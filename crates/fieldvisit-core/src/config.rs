use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::locations::RegionBounds;
use crate::review::ReviewSettings;

pub const DEFAULT_TIMEZONE: &str = "Europe/Amsterdam";

/// Behaviour labels that point at a fixed site (roost, nest) and are worth an address.
pub const DEFAULT_GEOCODE_BEHAVIOURS: &[&str] = &[
    "Invliegend (algemeen)",
    "baltsend",
    "zwermend (algemeen)",
    "uitvliegend (algemeen)",
    "nest-indicerend gedrag",
    "territoriumindicerend",
    "ter plaatse",
    "slaapplaats",
    "bezoek aan nestplaats",
    "baltsend/zingend",
    "rustend",
    "nestbouw",
    "parend / copula",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),
    #[error("invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub timezone: String,
    pub removal_keywords: Vec<String>,
    pub sun: SunConfig,
    pub review: ReviewConfig,
    pub region: RegionBounds,
    pub geocoding: GeocodingConfig,
    pub output: OutputConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.to_string(),
            removal_keywords: vec!["test".into(), "ongeldig".into(), "tim".into()],
            sun: SunConfig::default(),
            review: ReviewConfig::default(),
            region: RegionBounds::default(),
            geocoding: GeocodingConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SunConfig {
    pub elevation_m: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    pub time_tolerance_seconds: i64,
    pub duration_tolerance_hours: f64,
    pub manual_review_codes: Vec<String>,
    pub flag_unrecognized_names: bool,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        let settings = ReviewSettings::default();
        Self {
            time_tolerance_seconds: settings.time_tolerance.num_seconds(),
            duration_tolerance_hours: settings.duration_tolerance_hours,
            manual_review_codes: settings.manual_review_codes,
            flag_unrecognized_names: settings.flag_unrecognized_names,
        }
    }
}

impl ReviewConfig {
    pub fn settings(&self) -> ReviewSettings {
        ReviewSettings {
            time_tolerance: Duration::seconds(self.time_tolerance_seconds),
            duration_tolerance_hours: self.duration_tolerance_hours,
            manual_review_codes: self.manual_review_codes.clone(),
            flag_unrecognized_names: self.flag_unrecognized_names,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    pub base_url: String,
    pub user_agent: String,
    pub min_delay_ms: u64,
    pub batch_size: usize,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub cache_file: Option<PathBuf>,
    pub behaviours: Vec<String>,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org/reverse".to_string(),
            user_agent: "fieldvisit-geocoder".to_string(),
            min_delay_ms: 1_100,
            batch_size: 50,
            max_attempts: 3,
            initial_backoff_ms: 3_000,
            cache_file: Some(PathBuf::from("geocode_cache.json")),
            behaviours: DEFAULT_GEOCODE_BEHAVIOURS
                .iter()
                .map(|b| b.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub visits_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            visits_file: "veldbezoeken_export_aanpassingenMETA.csv".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Loads `path` when given, defaults otherwise.
    pub fn load_optional(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::UnknownTimezone(self.timezone.clone()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timezone()?;
        if !self.region.is_valid() {
            return Err(ConfigError::Invalid(
                "region bounds must have min below max".to_string(),
            ));
        }
        if self.review.time_tolerance_seconds < 0 || self.review.duration_tolerance_hours < 0.0 {
            return Err(ConfigError::Invalid(
                "review tolerances must not be negative".to_string(),
            ));
        }
        if self.geocoding.batch_size == 0 || self.geocoding.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "geocoding batch_size and max_attempts must be at least 1".to_string(),
            ));
        }
        if !self.sun.elevation_m.is_finite() || self.sun.elevation_m < 0.0 {
            return Err(ConfigError::Invalid(
                "sun.elevation_m must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }
}
