// Southwest: one form POST, results in a plain HTML table

use async_trait::async_trait;
use chrono::NaiveTime;
use scraper::{ElementRef, Html};
use std::sync::Arc;

use crate::config::RouteConfig;
use crate::error::{ExtractionError, RequestError};
use crate::extract::{child_elements, parse_fare, parse_meridian_time, select_text, selector, text_of};
use crate::flight::{FlightRecord, LegQuery};
use crate::provider::{DynamicFieldNames, ProviderAdapter};
use crate::session::{FormFields, HttpSession};

pub const NAME: &str = "southwest";
pub const ENDPOINT: &str = "https://www.southwest.com/flight/select-flight.html";
const PREFIX: &str = "WN";

// The lowest fare class is the last column; without it every class is sold out
const FARE_COLUMN: usize = 7;

// Most of these only exist because the form validation insists on them
const FIXED_FIELDS: &[(&str, &str)] = &[
    ("selectedOutboundTrip", ""),
    ("selectedInboundTrip", ""),
    ("awardCertificateProductId", ""),
    ("returnAirport", ""),
    ("promoCode", ""),
    ("promoCertSelected", "false"),
    ("transitionalAwardSelected", "false"),
    ("showAwardToggle", "false"),
    ("awardCertificateToggleSelected", "false"),
    ("oneWayCertificateOrAward", "false"),
    ("swaBizDiscountSearch", "false"),
    ("modifySearchSubmitButton", "Search"),
    ("adultPassengerCount", "1"),
    ("seniorPassengerCount", "0"),
    ("outboundTimeOfDay", "ANYTIME"),
    ("returnTimeOfDay", "ANYTIME"),
    ("bugFareType", "DOLLARS"),
    ("fareType", "DOLLARS"),
    ("originAirport_displayed", ""),
    ("destinationAirport_displayed", ""),
];

pub struct Southwest {
    route: RouteConfig,
    session: Arc<dyn HttpSession>,
}

impl Southwest {
    pub fn new(route: RouteConfig, session: Arc<dyn HttpSession>) -> Self {
        Self { route, session }
    }

    fn column_time(column: ElementRef<'_>) -> Result<NaiveTime, ExtractionError> {
        let clock = select_text(column, ".time", "")?;
        let indicator = select_text(column, ".indicator", "")?;
        parse_meridian_time(&format!("{} {}", clock.trim(), indicator.trim()))
    }

    fn column_flight(column: ElementRef<'_>) -> Result<String, ExtractionError> {
        let sel = selector(".bugLinkText")?;
        let segments: Vec<String> = column
            .select(&sel)
            .map(|segment| text_of(segment).trim().to_string())
            .filter(|segment| !segment.is_empty())
            .collect();

        if segments.is_empty() {
            return Err(ExtractionError::InvalidFlightNumber(text_of(column).trim().to_string()));
        }
        Ok(format!("{} {}", PREFIX, segments.join("/")))
    }
}

#[async_trait]
impl ProviderAdapter for Southwest {
    fn name(&self) -> &'static str {
        NAME
    }

    fn endpoint(&self) -> &str {
        ENDPOINT
    }

    fn date_format(&self) -> &'static str {
        "%m/%d/%y"
    }

    fn fixed_fields(&self) -> &[(&'static str, &'static str)] {
        FIXED_FIELDS
    }

    fn dynamic_field_names(&self) -> DynamicFieldNames {
        DynamicFieldNames {
            origin: "originAirport",
            destination: "destinationAirport",
            date: "outboundDateString",
        }
    }

    fn route(&self) -> &RouteConfig {
        &self.route
    }

    async fn perform_request(
        &self,
        _query: &LegQuery,
        fields: &FormFields,
    ) -> Result<String, RequestError> {
        let response = self.session.post_form(ENDPOINT, fields, &[]).await?;
        Ok(response.ensure_success()?.body)
    }

    fn select_rows<'a>(&self, document: &'a Html) -> Result<Vec<ElementRef<'a>>, ExtractionError> {
        let sel = selector(".searchResultsTable > tbody > tr")?;
        Ok(document.select(&sel).collect())
    }

    fn extract_record(
        &self,
        row: ElementRef<'_>,
        query: &LegQuery,
    ) -> Result<Option<FlightRecord>, ExtractionError> {
        // Nested tables hide their own cells, so only direct children count
        let columns = child_elements(row, "td");
        if columns.len() <= FARE_COLUMN {
            return Ok(None);
        }

        let Some(fare) = parse_fare(&select_text(columns[FARE_COLUMN], ".product_price", "")?)?
        else {
            return Ok(None);
        };

        Ok(Some(query.record(
            Self::column_time(columns[0])?,
            Self::column_time(columns[1])?,
            Self::column_flight(columns[2])?,
            fare,
        )))
    }
}
