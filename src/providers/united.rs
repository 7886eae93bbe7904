// United (mobile site): one POST, fields found by their labels rather than
// by position because the list markup has no stable columns.

use async_trait::async_trait;
use chrono::NaiveTime;
use regex::Regex;
use scraper::{ElementRef, Html};
use std::sync::{Arc, LazyLock};

use crate::config::RouteConfig;
use crate::error::{ExtractionError, RequestError};
use crate::extract::{parse_fare, parse_meridian_time, select_first, selector, text_of};
use crate::flight::{FlightRecord, LegQuery};
use crate::provider::{DynamicFieldNames, ProviderAdapter};
use crate::session::{FormFields, HttpSession};

pub const NAME: &str = "united";
pub const ENDPOINT: &str = "https://mobile.united.com/Booking/OneWaySearch";
const PREFIX: &str = "UA";

// Without it the session framework answers with a cookie probe page
const COOKIE_SUPPORT: (&str, &str) = ("AspxAutoDetectCookieSupport", "1");

const DEPARTURE_LABEL: &str = "DepartureAirportName";
const ARRIVAL_LABEL: &str = "ArrivalAirportName";

static FARE_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$([\d,]+)").unwrap());

const FIXED_FIELDS: &[(&str, &str)] = &[
    ("SearchType", "OW"),
    ("DepartTime", "0000"),
    ("NumberOfAdults", "1"),
    ("Cabin", "Coach"),
    ("SearchBy", "P"),
    ("NonstopOnly", "true"),
];

pub struct United {
    route: RouteConfig,
    session: Arc<dyn HttpSession>,
}

impl United {
    pub fn new(route: RouteConfig, session: Arc<dyn HttpSession>) -> Self {
        Self { route, session }
    }

    // The value sits in the div following the label's container
    fn labelled_container<'a>(row: ElementRef<'a>, label: &str) -> Result<ElementRef<'a>, ExtractionError> {
        let css = format!("label[for='{}']", label);
        let label_el = select_first(row, &css)?;

        label_el
            .parent()
            .and_then(ElementRef::wrap)
            .and_then(|container| {
                container
                    .next_siblings()
                    .filter_map(ElementRef::wrap)
                    .find(|sibling| sibling.value().name() == "div")
            })
            .ok_or_else(|| ExtractionError::MissingLabel(label.to_string()))
    }

    // First line of the container is the time, then date and airport
    fn labelled_time(row: ElementRef<'_>, label: &str) -> Result<NaiveTime, ExtractionError> {
        let text = text_of(Self::labelled_container(row, label)?);
        let first_line = text
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default();
        parse_meridian_time(first_line)
    }

    fn flight_number(row: ElementRef<'_>) -> Result<String, ExtractionError> {
        let logo = select_first(row, "img[alt='carrier logo']")?;
        let text = logo
            .parent()
            .and_then(ElementRef::wrap)
            .map(text_of)
            .unwrap_or_default();

        let tokens: Vec<&str> = text.split_whitespace().collect();
        match tokens.as_slice() {
            [_carrier, number] => Ok(format!("{} {}", PREFIX, number)),
            _ => Err(ExtractionError::InvalidFlightNumber(text.trim().to_string())),
        }
    }

    fn fare(row: ElementRef<'_>) -> Result<u32, ExtractionError> {
        let button = select_first(row, "#btnPickTrip")?;
        let value = button.value().attr("value").unwrap_or_default();

        FARE_PATTERN
            .captures(value)
            .and_then(|caps| caps.get(1))
            .map(|amount| parse_fare(amount.as_str()))
            .transpose()?
            .flatten()
            .ok_or_else(|| ExtractionError::InvalidFare(value.to_string()))
    }
}

#[async_trait]
impl ProviderAdapter for United {
    fn name(&self) -> &'static str {
        NAME
    }

    fn endpoint(&self) -> &str {
        ENDPOINT
    }

    fn date_format(&self) -> &'static str {
        "%a., %b. %d, %Y"
    }

    fn fixed_fields(&self) -> &[(&'static str, &'static str)] {
        FIXED_FIELDS
    }

    // These are routed on, even though the site itself sends display names
    fn dynamic_field_names(&self) -> DynamicFieldNames {
        DynamicFieldNames {
            origin: "From",
            destination: "To",
            date: "DepartDate",
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
        let response = self
            .session
            .post_form(ENDPOINT, fields, &[COOKIE_SUPPORT])
            .await?;
        Ok(response.ensure_success()?.body)
    }

    fn select_rows<'a>(&self, document: &'a Html) -> Result<Vec<ElementRef<'a>>, ExtractionError> {
        // The last list view is the page footer
        let sel = selector("ul[data-role='listview']")?;
        let mut rows: Vec<ElementRef<'a>> = document.select(&sel).collect();
        rows.pop();
        Ok(rows)
    }

    fn extract_record(
        &self,
        row: ElementRef<'_>,
        query: &LegQuery,
    ) -> Result<Option<FlightRecord>, ExtractionError> {
        Ok(Some(query.record(
            Self::labelled_time(row, DEPARTURE_LABEL)?,
            Self::labelled_time(row, ARRIVAL_LABEL)?,
            Self::flight_number(row)?,
            Self::fare(row)?,
        )))
    }
}
