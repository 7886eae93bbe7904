// Provider registry: explicit factories, one lazily built adapter set per registry

use chrono::NaiveDate;
use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{ConfigError, RouteConfig, Settings};
use crate::error::RequestError;
use crate::flight::FlightBatch;
use crate::provider::{FlightSearch, ProviderAdapter};
use crate::providers::{JetBlue, Southwest, United};
use crate::session::{HttpSession, ReqwestSession};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("No providers registered")]
    NoProviders,

    #[error("Providers have not been instantiated")]
    NotInstantiated,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Session setup failed: {0}")]
    Session(#[from] RequestError),
}

pub type AdapterFactory =
    Box<dyn Fn(&Settings) -> Result<Arc<dyn ProviderAdapter>, RegistryError> + Send + Sync>;

pub struct ProviderRegistry {
    factories: Vec<(&'static str, AdapterFactory)>,
    adapters: RwLock<Option<Vec<Arc<dyn ProviderAdapter>>>>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            factories: Vec::new(),
            adapters: RwLock::new(None),
        }
    }

    // Southwest, JetBlue and United, each on its own reqwest session
    pub fn with_default_providers() -> Self {
        let mut registry = Self::new();
        registry.register(crate::providers::southwest::NAME, |settings| {
            let route = route_for(&settings.southwest, crate::providers::southwest::NAME)?;
            let session = live_session(settings, crate::providers::southwest::ENDPOINT)?;
            let adapter: Arc<dyn ProviderAdapter> = Arc::new(Southwest::new(route, session));
            Ok(adapter)
        });
        registry.register(crate::providers::jetblue::NAME, |settings| {
            let route = route_for(&settings.jetblue, crate::providers::jetblue::NAME)?;
            let session = live_session(settings, crate::providers::jetblue::ENDPOINT)?;
            let adapter: Arc<dyn ProviderAdapter> = Arc::new(JetBlue::new(route, session));
            Ok(adapter)
        });
        registry.register(crate::providers::united::NAME, |settings| {
            let route = route_for(&settings.united, crate::providers::united::NAME)?;
            let session = live_session(settings, crate::providers::united::ENDPOINT)?;
            let adapter: Arc<dyn ProviderAdapter> = Arc::new(United::new(route, session));
            Ok(adapter)
        });
        registry
    }

    // Registration order is fan-out order
    pub fn register<F>(&mut self, name: &'static str, factory: F)
    where
        F: Fn(&Settings) -> Result<Arc<dyn ProviderAdapter>, RegistryError> + Send + Sync + 'static,
    {
        self.factories.push((name, Box::new(factory)));
    }

    pub fn providers(&self) -> Vec<&'static str> {
        self.factories.iter().map(|(name, _)| *name).collect()
    }

    // Builds every registered adapter once. Later calls, with any settings,
    // leave the existing adapters in place.
    pub fn instantiate(&self, settings: &Settings) -> Result<(), RegistryError> {
        if self.factories.is_empty() {
            return Err(RegistryError::NoProviders);
        }
        if self.adapters.read().is_some() {
            return Ok(());
        }

        let mut adapters = self.adapters.write();
        if adapters.is_some() {
            return Ok(());
        }

        let built = self
            .factories
            .iter()
            .map(|(_, factory)| factory(settings))
            .collect::<Result<Vec<_>, _>>()?;
        info!(providers = ?self.providers(), "instantiated providers");
        *adapters = Some(built);
        Ok(())
    }

    pub fn is_instantiated(&self) -> bool {
        self.adapters.read().is_some()
    }

    fn adapters(&self) -> Result<Vec<Arc<dyn ProviderAdapter>>, RegistryError> {
        self.adapters
            .read()
            .as_ref()
            .cloned()
            .ok_or(RegistryError::NotInstantiated)
    }

    // Every adapter's configured pairs, concatenated in registration order.
    // A failing adapter only contributes failures.
    pub async fn request_all(
        &self,
        date: NaiveDate,
        reverse: bool,
        early: bool,
    ) -> Result<FlightBatch, RegistryError> {
        let mut batch = FlightBatch::default();
        for adapter in self.adapters()? {
            batch.extend(adapter.request_all(date, reverse, early).await);
        }
        Ok(batch)
    }

    pub async fn request_single(
        &self,
        origin: &str,
        destination: &str,
        date: NaiveDate,
    ) -> Result<FlightBatch, RegistryError> {
        let mut batch = FlightBatch::default();
        for adapter in self.adapters()? {
            match adapter.request_single(origin, destination, date, false).await {
                Ok(found) => batch.extend(found),
                Err(err) => {
                    warn!(provider = adapter.name(), error = %err, "request failed");
                    batch.failures.push(err);
                }
            }
        }
        Ok(batch)
    }
}

fn route_for(section: &Option<RouteConfig>, name: &str) -> Result<RouteConfig, RegistryError> {
    Ok(Settings::require(section, name)?.clone())
}

fn live_session(settings: &Settings, endpoint: &str) -> Result<Arc<dyn HttpSession>, RegistryError> {
    let session = ReqwestSession::new(endpoint, settings.general.request_timeout())?;
    Ok(Arc::new(session))
}
