// Configuration for the providers and the weekend window

use chrono::NaiveTime;
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Config parse error: {0}")]
    Parse(String),

    #[error("Invalid time for {key}: `{value}` (expected HH:MM)")]
    InvalidTime { key: String, value: String },

    #[error("Empty airport list: {0}")]
    EmptyAirportList(String),

    #[error("Missing config section: {0}")]
    MissingSection(String),

    #[error("cache_capacity must be at least 1")]
    InvalidCacheCapacity,
}

// Airports one provider is queried for
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RouteConfig {
    #[serde(deserialize_with = "deserialize_airports")]
    pub origins: Vec<String>,
    #[serde(deserialize_with = "deserialize_airports")]
    pub destinations: Vec<String>,
}

impl RouteConfig {
    pub fn new(origins: &[&str], destinations: &[&str]) -> Result<Self, ConfigError> {
        Ok(Self {
            origins: normalize_airports(origins.iter().copied(), "origins")?,
            destinations: normalize_airports(destinations.iter().copied(), "destinations")?,
        })
    }

    // Cartesian product in configured order; destinations lead when reversed
    pub fn pairs(&self, reverse: bool) -> Vec<(String, String)> {
        let (outer, inner) = if reverse {
            (&self.destinations, &self.origins)
        } else {
            (&self.origins, &self.destinations)
        };

        outer
            .iter()
            .flat_map(|from| inner.iter().map(move |to| (from.clone(), to.clone())))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GeneralSettings {
    #[serde(deserialize_with = "deserialize_clock_time")]
    pub leave_after: NaiveTime,
    #[serde(deserialize_with = "deserialize_clock_time")]
    pub leave_before: NaiveTime,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl GeneralSettings {
    pub fn new(leave_after: &str, leave_before: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            leave_after: parse_clock_time("leave_after", leave_after)?,
            leave_before: parse_clock_time("leave_before", leave_before)?,
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_capacity: default_cache_capacity(),
            request_timeout_secs: default_request_timeout_secs(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_capacity == 0 {
            return Err(ConfigError::InvalidCacheCapacity);
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// One section per provider; a provider whose section is absent fails at
// registry instantiation rather than on first query.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub general: GeneralSettings,
    #[serde(default)]
    pub southwest: Option<RouteConfig>,
    #[serde(default)]
    pub jetblue: Option<RouteConfig>,
    #[serde(default)]
    pub united: Option<RouteConfig>,
}

impl Settings {
    pub fn new(general: GeneralSettings) -> Self {
        Self {
            general,
            southwest: None,
            jetblue: None,
            united: None,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let settings: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        settings.general.validate()?;
        Ok(settings)
    }

    pub fn require<'a>(
        section: &'a Option<RouteConfig>,
        name: &str,
    ) -> Result<&'a RouteConfig, ConfigError> {
        section
            .as_ref()
            .ok_or_else(|| ConfigError::MissingSection(name.to_string()))
    }
}

fn default_cache_ttl_secs() -> u64 {
    600
}

fn default_cache_capacity() -> usize {
    128
}

fn default_request_timeout_secs() -> u64 {
    30
}

pub fn parse_clock_time(key: &str, value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|_| ConfigError::InvalidTime {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn normalize_airports<'a, I>(codes: I, field: &str) -> Result<Vec<String>, ConfigError>
where
    I: IntoIterator<Item = &'a str>,
{
    let airports: Vec<String> = codes
        .into_iter()
        .map(|code| code.trim().to_uppercase())
        .filter(|code| !code.is_empty())
        .collect();

    if airports.is_empty() {
        return Err(ConfigError::EmptyAirportList(field.to_string()));
    }
    Ok(airports)
}

// Accepts "SFO,OAK" as well as ["SFO", "OAK"]
#[derive(Deserialize)]
#[serde(untagged)]
enum AirportList {
    Joined(String),
    Listed(Vec<String>),
}

fn deserialize_airports<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let airports = match AirportList::deserialize(deserializer)? {
        AirportList::Joined(joined) => normalize_airports(joined.split(','), "airports"),
        AirportList::Listed(listed) => {
            normalize_airports(listed.iter().map(String::as_str), "airports")
        }
    };
    airports.map_err(serde::de::Error::custom)
}

fn deserialize_clock_time<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_clock_time("time", &raw).map_err(serde::de::Error::custom)
}
