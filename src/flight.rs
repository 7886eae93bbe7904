// Normalized flight offers and the batches they travel in

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

// One bookable one-way offer. There is no "unavailable" fare: rows without
// a bookable fare never become records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlightRecord {
    pub origin: String,
    pub destination: String,
    pub is_early_leg: bool,
    pub depart_date: NaiveDate,
    pub depart_time: NaiveTime,
    pub arrive_time: NaiveTime,
    pub flight_no: String,
    pub fare: u32,
}

// The origin/destination/date an adapter is asked about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegQuery {
    pub origin: String,
    pub destination: String,
    pub date: NaiveDate,
    pub early: bool,
}

impl LegQuery {
    pub fn new(origin: &str, destination: &str, date: NaiveDate, early: bool) -> Self {
        Self {
            origin: origin.to_string(),
            destination: destination.to_string(),
            date,
            early,
        }
    }

    pub fn record(
        &self,
        depart_time: NaiveTime,
        arrive_time: NaiveTime,
        flight_no: String,
        fare: u32,
    ) -> FlightRecord {
        FlightRecord {
            origin: self.origin.clone(),
            destination: self.destination.clone(),
            is_early_leg: self.early,
            depart_date: self.date,
            depart_time,
            arrive_time,
            flight_no,
            fare,
        }
    }
}

// Records from a fan-out together with whatever failed along the way
#[derive(Debug, Clone, Default)]
pub struct FlightBatch {
    pub records: Vec<FlightRecord>,
    pub failures: Vec<ProviderError>,
}

impl FlightBatch {
    pub fn failed(failure: ProviderError) -> Self {
        Self {
            records: Vec::new(),
            failures: vec![failure],
        }
    }

    pub fn extend(&mut self, other: FlightBatch) {
        self.records.extend(other.records);
        self.failures.extend(other.failures);
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
