// Provider adapter contract and the orchestration every adapter shares

use async_trait::async_trait;
use chrono::NaiveDate;
use scraper::{ElementRef, Html};
use tracing::{debug, warn};

use crate::config::RouteConfig;
use crate::error::{ExtractionError, ProviderError, RequestError};
use crate::flight::{FlightBatch, FlightRecord, LegQuery};
use crate::session::FormFields;

// Provider-specific names of the three form fields that vary per query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicFieldNames {
    pub origin: &'static str,
    pub destination: &'static str,
    pub date: &'static str,
}

// One airline booking site.
//
// Adapters describe their form (endpoint, fixed fields, dynamic field names,
// date format), perform the raw exchange, and know how to pick result rows
// out of the returned document and turn each row into a record. Everything
// else lives in `FlightSearch`.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    fn endpoint(&self) -> &str;

    // chrono strftime pattern for the query date
    fn date_format(&self) -> &'static str;

    fn fixed_fields(&self) -> &[(&'static str, &'static str)];

    fn dynamic_field_names(&self) -> DynamicFieldNames;

    fn route(&self) -> &RouteConfig;

    // Runs the (possibly multi-step) exchange and returns the final HTML body
    async fn perform_request(
        &self,
        query: &LegQuery,
        fields: &FormFields,
    ) -> Result<String, RequestError>;

    // Offer rows only; header, template and footer rows are left out
    fn select_rows<'a>(&self, document: &'a Html) -> Result<Vec<ElementRef<'a>>, ExtractionError>;

    // `Ok(None)` when the row has no bookable fare
    fn extract_record(
        &self,
        row: ElementRef<'_>,
        query: &LegQuery,
    ) -> Result<Option<FlightRecord>, ExtractionError>;
}

// Fixed fields first, then the dynamic ones; a dynamic name replaces a fixed
// field of the same name.
pub fn build_form_fields<A>(adapter: &A, query: &LegQuery) -> FormFields
where
    A: ProviderAdapter + ?Sized,
{
    let names = adapter.dynamic_field_names();
    let dynamic = [
        (names.origin, query.origin.clone()),
        (names.destination, query.destination.clone()),
        (names.date, query.date.format(adapter.date_format()).to_string()),
    ];

    let mut fields: FormFields = adapter
        .fixed_fields()
        .iter()
        .filter(|(name, _)| !dynamic.iter().any(|(dynamic_name, _)| dynamic_name == name))
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
    fields.extend(
        dynamic
            .into_iter()
            .map(|(name, value)| (name.to_string(), value)),
    );
    fields
}

fn extract_rows<A>(adapter: &A, body: &str, query: &LegQuery) -> FlightBatch
where
    A: ProviderAdapter + ?Sized,
{
    let document = Html::parse_document(body);
    let rows = match adapter.select_rows(&document) {
        Ok(rows) => rows,
        Err(source) => {
            warn!(provider = adapter.name(), error = %source, "result rows not found");
            return FlightBatch::failed(ProviderError::extraction(adapter.name(), query, 0, source));
        }
    };

    let mut batch = FlightBatch::default();
    for (index, row) in rows.into_iter().enumerate() {
        match adapter.extract_record(row, query) {
            Ok(Some(record)) => batch.records.push(record),
            Ok(None) => debug!(provider = adapter.name(), row = index, "sold out"),
            Err(source) => {
                warn!(
                    provider = adapter.name(),
                    origin = %query.origin,
                    destination = %query.destination,
                    row = index,
                    error = %source,
                    "skipping unreadable row"
                );
                batch
                    .failures
                    .push(ProviderError::extraction(adapter.name(), query, index, source));
            }
        }
    }
    batch
}

// Queries shared by every adapter
#[async_trait]
pub trait FlightSearch {
    // One origin/destination pair. Transport failures are returned as `Err`;
    // unreadable rows are skipped and reported in the batch.
    async fn request_single(
        &self,
        origin: &str,
        destination: &str,
        date: NaiveDate,
        early: bool,
    ) -> Result<FlightBatch, ProviderError>;

    // Every configured pair, in configured order
    async fn request_all(&self, date: NaiveDate, reverse: bool, early: bool) -> FlightBatch;
}

#[async_trait]
impl<T> FlightSearch for T
where
    T: ProviderAdapter + ?Sized,
{
    async fn request_single(
        &self,
        origin: &str,
        destination: &str,
        date: NaiveDate,
        early: bool,
    ) -> Result<FlightBatch, ProviderError> {
        let query = LegQuery::new(origin, destination, date, early);
        let fields = build_form_fields(self, &query);

        debug!(
            provider = self.name(),
            origin,
            destination,
            date = %date,
            "requesting flights"
        );
        let body = self
            .perform_request(&query, &fields)
            .await
            .map_err(|e| ProviderError::request(self.name(), &query, e))?;

        Ok(extract_rows(self, &body, &query))
    }

    async fn request_all(&self, date: NaiveDate, reverse: bool, early: bool) -> FlightBatch {
        let mut batch = FlightBatch::default();
        for (origin, destination) in self.route().pairs(reverse) {
            match self.request_single(&origin, &destination, date, early).await {
                Ok(found) => batch.extend(found),
                Err(err) => {
                    warn!(provider = self.name(), error = %err, "request failed");
                    batch.failures.push(err);
                }
            }
        }
        batch
    }
}
