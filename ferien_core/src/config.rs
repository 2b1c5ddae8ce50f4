//! Settings, read from a TOML file.
//!
//! ```toml
//! output_dir = "/config"
//! provider = "openholidays"
//!
//! [[regions]]
//! code = "BY"
//! regional = false
//! ```

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;

use crate::{
    holiday_client::{legacy, openholidays, CalendarSource, FetchError, HttpFetcher},
    model::HolidayKinds,
    region::Region,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid settings: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("region {0} is configured more than once")]
    DuplicateRegion(Region),
    #[error("no region configured")]
    NoRegion,
    #[error("the refresh interval must be at least one second")]
    ZeroInterval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    OpenHolidays,
    /// ferien-api.de for school holidays and date.nager.at for public holidays.
    Legacy,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegionSettings {
    pub code: Region,
    #[serde(default = "default_true")]
    pub national: bool,
    #[serde(default = "default_true")]
    pub regional: bool,
}

impl RegionSettings {
    pub fn new(code: Region) -> Self {
        RegionSettings {
            code,
            national: true,
            regional: true,
        }
    }

    pub fn kinds(&self) -> HolidayKinds {
        HolidayKinds::from_flags(self.national, self.regional)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where `{REGION}_Ferien.yaml` is written.
    pub output_dir: PathBuf,
    pub interval_secs: u64,
    pub years_ahead: u32,
    pub timeout_secs: u64,
    pub provider: Provider,
    pub language: String,
    pub openholidays_url: String,
    pub ferien_api_url: String,
    pub nager_url: String,
    pub regions: Vec<RegionSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            output_dir: PathBuf::from("."),
            interval_secs: 86400,
            years_ahead: 3,
            timeout_secs: 15,
            provider: Provider::default(),
            language: String::from("DE"),
            openholidays_url: String::from(openholidays::BASE_URL),
            ferien_api_url: String::from(legacy::FERIEN_API_URL),
            nager_url: String::from(legacy::NAGER_URL),
            regions: vec![],
        }
    }
}

fn default_true() -> bool {
    true
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Settings::parse(&contents)?;
        log::info!(
            "loaded settings from {} ({} regions)",
            path.display(),
            settings.regions.len()
        );
        Ok(settings)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.regions.is_empty() {
            return Err(ConfigError::NoRegion);
        }
        if self.interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        let mut seen = HashSet::new();
        for region in &self.regions {
            if !seen.insert(region.code) {
                return Err(ConfigError::DuplicateRegion(region.code));
            }
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Build the client for the configured provider.
    pub fn source(&self) -> Result<Arc<dyn CalendarSource>, FetchError> {
        let fetcher = HttpFetcher::new(Duration::from_secs(self.timeout_secs))?;
        let source: Arc<dyn CalendarSource> = match self.provider {
            Provider::OpenHolidays => Arc::new(openholidays::OpenHolidaysClient::new(
                fetcher,
                &self.openholidays_url,
                &self.language,
            )),
            Provider::Legacy => Arc::new(legacy::LegacyClient::new(
                fetcher,
                &self.ferien_api_url,
                &self.nager_url,
                &self.language,
            )),
        };
        Ok(source)
    }
}
