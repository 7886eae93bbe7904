// Error taxonomy shared by every provider adapter

use chrono::NaiveDate;
use thiserror::Error;

use crate::flight::LegQuery;

// Transport-level failures for a single provider exchange
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Continuation parameter `{param}` missing from {url}")]
    MissingContinuation { param: String, url: String },
}

// A result row that no longer matches the markup an adapter expects.
// Sold-out rows never produce one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Selector `{0}` matched nothing")]
    MissingElement(String),

    #[error("Label `{0}` has no sibling container")]
    MissingLabel(String),

    #[error("Invalid time `{0}`")]
    InvalidTime(String),

    #[error("Invalid fare `{0}`")]
    InvalidFare(String),

    #[error("Malformed flight number `{0}`")]
    InvalidFlightNumber(String),

    #[error("Invalid selector `{0}`")]
    Selector(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("row {row}: {source}")]
    Extraction { row: usize, source: ExtractionError },
}

// A failure attributed to the provider and query it happened in
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{provider} {origin}->{destination} on {date}: {kind}")]
pub struct ProviderError {
    pub provider: &'static str,
    pub origin: String,
    pub destination: String,
    pub date: NaiveDate,
    pub kind: FailureKind,
}

impl ProviderError {
    pub fn request(provider: &'static str, query: &LegQuery, source: RequestError) -> Self {
        Self::new(provider, query, FailureKind::Request(source))
    }

    pub fn extraction(
        provider: &'static str,
        query: &LegQuery,
        row: usize,
        source: ExtractionError,
    ) -> Self {
        Self::new(provider, query, FailureKind::Extraction { row, source })
    }

    fn new(provider: &'static str, query: &LegQuery, kind: FailureKind) -> Self {
        Self {
            provider,
            origin: query.origin.clone(),
            destination: query.destination.clone(),
            date: query.date,
            kind,
        }
    }

    pub fn is_request_failure(&self) -> bool {
        matches!(self.kind, FailureKind::Request(_))
    }
}
