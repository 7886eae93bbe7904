// Weekend getaway search: evening departures on the day itself plus
// early departures the next morning, cached per (date, direction).

use chrono::{Days, NaiveDate, NaiveTime};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::cache::{CacheConfig, Clock, SystemClock, TtlCache};
use crate::config::Settings;
use crate::flight::FlightBatch;
use crate::registry::{ProviderRegistry, RegistryError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WeekendError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("No day follows {0}")]
    DateOutOfRange(NaiveDate),
}

// Which departures of a leg to keep; both bounds are exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegBound {
    After(NaiveTime),
    Before(NaiveTime),
}

impl LegBound {
    pub fn admits(&self, depart_time: NaiveTime) -> bool {
        match *self {
            LegBound::After(bound) => depart_time > bound,
            LegBound::Before(bound) => depart_time < bound,
        }
    }
}

pub struct WeekendFilter {
    registry: Arc<ProviderRegistry>,
    leave_after: NaiveTime,
    leave_before: NaiveTime,
    cache: TtlCache<(NaiveDate, bool), Result<FlightBatch, WeekendError>>,
}

impl WeekendFilter {
    pub fn new(registry: Arc<ProviderRegistry>, settings: &Settings) -> Result<Self, RegistryError> {
        Self::with_clock(registry, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        registry: Arc<ProviderRegistry>,
        settings: &Settings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RegistryError> {
        settings.general.validate()?;
        registry.instantiate(settings)?;

        let general = &settings.general;
        Ok(Self {
            registry,
            leave_after: general.leave_after,
            leave_before: general.leave_before,
            cache: TtlCache::new(
                CacheConfig {
                    ttl: general.cache_ttl(),
                    capacity: general.cache_capacity,
                },
                clock,
            ),
        })
    }

    // Departures after `leave_after` on `date`, then departures before
    // `leave_before` on the following day. Concurrent callers share one
    // fetch and its outcome; only complete batches are kept for later calls.
    pub async fn request_with_next(
        &self,
        date: NaiveDate,
        reverse: bool,
    ) -> Result<FlightBatch, WeekendError> {
        self.cache
            .get_or_insert_if(
                (date, reverse),
                || self.fetch_with_next(date, reverse),
                |outcome| matches!(outcome, Ok(batch) if batch.is_complete()),
            )
            .await
    }

    pub async fn request_leg(
        &self,
        date: NaiveDate,
        bound: LegBound,
        reverse: bool,
        early: bool,
    ) -> Result<FlightBatch, RegistryError> {
        let mut batch = self.registry.request_all(date, reverse, early).await?;
        batch.records.retain(|record| bound.admits(record.depart_time));
        Ok(batch)
    }

    async fn fetch_with_next(
        &self,
        date: NaiveDate,
        reverse: bool,
    ) -> Result<FlightBatch, WeekendError> {
        let next_day = date
            .checked_add_days(Days::new(1))
            .ok_or(WeekendError::DateOutOfRange(date))?;
        debug!(%date, %next_day, reverse, "fetching weekend legs");

        let mut batch = self
            .request_leg(date, LegBound::After(self.leave_after), reverse, false)
            .await?;
        batch.extend(
            self.request_leg(next_day, LegBound::Before(self.leave_before), reverse, true)
                .await?,
        );
        Ok(batch)
    }
}
