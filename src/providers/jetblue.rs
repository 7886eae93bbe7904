// JetBlue: POST that redirects to a flow key, then a GET for the async results

use async_trait::async_trait;
use scraper::{ElementRef, Html};
use std::sync::Arc;

use crate::config::RouteConfig;
use crate::error::{ExtractionError, RequestError};
use crate::extract::{parse_fare, parse_meridian_time, select_first, select_last, select_text, selector, text_of};
use crate::flight::{FlightRecord, LegQuery};
use crate::provider::{DynamicFieldNames, ProviderAdapter};
use crate::session::{FormFields, HttpSession};

pub const NAME: &str = "jetblue";
pub const ENDPOINT: &str = "https://book.jetblue.com/B6/webqtrip.html";
const PREFIX: &str = "B6";
const FLOW_KEY: &str = "_flowExecutionKey";

const FIXED_FIELDS: &[(&str, &str)] = &[
    ("searchType", "NORMAL"),
    ("returnDate", ""),
    ("numAdults", "1"),
    ("numChildren", "0"),
    ("numInfants", "0"),
    ("adult_count", "1"),
    ("kid_count", "0"),
    ("infant_count", "0"),
    ("journeySpan", "OW"),
    ("flight_type", "one_way"),
    ("fareFamily", "LOWESTFARE"),
    ("fareDisplay", "lowest"),
    ("fare_display", "lowest"),
];

pub struct JetBlue {
    route: RouteConfig,
    session: Arc<dyn HttpSession>,
}

impl JetBlue {
    pub fn new(route: RouteConfig, session: Arc<dyn HttpSession>) -> Self {
        Self { route, session }
    }

    // "B6 1234" -> "1234"
    fn segment_number(label: &str) -> Result<String, ExtractionError> {
        let mut tokens = label.split_whitespace();
        match (tokens.next(), tokens.next()) {
            (Some(_), Some(number)) => Ok(number.to_string()),
            _ => Err(ExtractionError::InvalidFlightNumber(label.trim().to_string())),
        }
    }
}

#[async_trait]
impl ProviderAdapter for JetBlue {
    fn name(&self) -> &'static str {
        NAME
    }

    fn endpoint(&self) -> &str {
        ENDPOINT
    }

    fn date_format(&self) -> &'static str {
        "%Y-%m-%d"
    }

    fn fixed_fields(&self) -> &[(&'static str, &'static str)] {
        FIXED_FIELDS
    }

    fn dynamic_field_names(&self) -> DynamicFieldNames {
        DynamicFieldNames {
            origin: "origin",
            destination: "destination",
            date: "departureDate",
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
        let search = self
            .session
            .post_form(ENDPOINT, fields, &[])
            .await?
            .ensure_success()?;

        let flow_key = search
            .query_param(FLOW_KEY)
            .ok_or_else(|| RequestError::MissingContinuation {
                param: FLOW_KEY.to_string(),
                url: search.url.to_string(),
            })?;

        let results = self
            .session
            .get(
                ENDPOINT,
                &[("_eventId", "getAsyncSearchResult"), (FLOW_KEY, flow_key.as_str())],
            )
            .await?
            .ensure_success()?;
        Ok(results.body)
    }

    fn select_rows<'a>(&self, document: &'a Html) -> Result<Vec<ElementRef<'a>>, ExtractionError> {
        // The first row is the template the page clones for results
        let sel = selector(".flight-row")?;
        Ok(document.select(&sel).skip(1).collect())
    }

    fn extract_record(
        &self,
        row: ElementRef<'_>,
        query: &LegQuery,
    ) -> Result<Option<FlightRecord>, ExtractionError> {
        let Some(fare) = parse_fare(&select_text(row, ".fare.non-refund .label", "")?)? else {
            return Ok(None);
        };

        // Segments are listed one by one: first departure, last arrival
        let depart_time = parse_meridian_time(&text_of(select_first(row, ".from time")?))?;
        let arrive_time = parse_meridian_time(&text_of(select_last(row, ".to time")?))?;

        let sel = selector(".flight-number")?;
        let numbers = row
            .select(&sel)
            .map(|label| Self::segment_number(&text_of(label)))
            .collect::<Result<Vec<_>, _>>()?;
        if numbers.is_empty() {
            return Err(ExtractionError::MissingElement(".flight-number".to_string()));
        }

        Ok(Some(query.record(
            depart_time,
            arrive_time,
            format!("{} {}", PREFIX, numbers.join("/")),
            fare,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::provider::FlightSearch;
    use crate::session::mock_session::{ok_response, Method, MockSession};
    use chrono::{NaiveDate, NaiveTime};

    const RESULTS: &str = r#"
        <html><body><div id="results">
          <div class="flight-row template">
            <div class="from"><time>{depart}</time></div>
            <div class="to"><time>{arrive}</time></div>
            <span class="flight-number">B6 {number}</span>
            <div class="fare non-refund"><span class="label">{fare}</span></div>
          </div>
          <div class="flight-row">
            <div class="segment">
              <div class="from"><time>6:05 PM</time></div>
              <div class="to"><time>7:20 PM</time></div>
              <span class="flight-number">B6 1121</span>
            </div>
            <div class="segment">
              <div class="from"><time>8:10 PM</time></div>
              <div class="to"><time>11:45 PM</time></div>
              <span class="flight-number">B6 488</span>
            </div>
            <div class="fare non-refund"><span class="label">
              $139
            </span></div>
          </div>
          <div class="flight-row">
            <div class="from"><time>9:00 PM</time></div>
            <div class="to"><time>10:25 PM</time></div>
            <span class="flight-number">B6 77</span>
            <div class="fare non-refund"><span class="label"></span></div>
          </div>
        </div></body></html>"#;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2015, 2, 20).unwrap()
    }

    fn jetblue(session: Arc<MockSession>) -> JetBlue {
        JetBlue::new(RouteConfig::new(&["SFO"], &["LGB"]).unwrap(), session)
    }

    fn two_step_session() -> Arc<MockSession> {
        MockSession::new(|request| match request.method {
            Method::Post => Ok(ok_response(
                &format!("{}?{}=e2s1", ENDPOINT, FLOW_KEY),
                "<html>searching</html>",
            )),
            Method::Get => Ok(ok_response(&request.url, RESULTS)),
        })
    }

    #[tokio::test]
    async fn test_follows_continuation_and_joins_segments() {
        let session = two_step_session();
        let provider = jetblue(session.clone());

        let batch = provider.request_single("SFO", "LGB", date(), false).await.unwrap();
        assert!(batch.is_complete());
        assert_eq!(batch.len(), 1);

        let record = &batch.records[0];
        assert_eq!(record.flight_no, "B6 1121/488");
        assert_eq!(record.depart_time, NaiveTime::from_hms_opt(18, 5, 0).unwrap());
        assert_eq!(record.arrive_time, NaiveTime::from_hms_opt(23, 45, 0).unwrap());
        assert_eq!(record.fare, 139);

        let requests = session.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, Method::Post);
        assert_eq!(requests[0].param("departureDate"), Some("2015-02-20"));
        assert_eq!(requests[0].param("journeySpan"), Some("OW"));
        assert_eq!(requests[1].method, Method::Get);
        assert_eq!(requests[1].param("_eventId"), Some("getAsyncSearchResult"));
        assert_eq!(requests[1].param(FLOW_KEY), Some("e2s1"));
    }

    #[tokio::test]
    async fn test_missing_flow_key_is_request_error() {
        let session = MockSession::with_body("<html></html>");
        let provider = jetblue(session.clone());

        let err = provider.request_single("SFO", "LGB", date(), false).await.unwrap_err();
        assert_eq!(err.provider, NAME);
        assert_eq!(
            err.kind,
            FailureKind::Request(RequestError::MissingContinuation {
                param: FLOW_KEY.to_string(),
                url: ENDPOINT.to_string(),
            })
        );
        assert_eq!(session.request_count(), 1);
    }

    #[test]
    fn test_segment_number_requires_carrier_and_number() {
        assert_eq!(JetBlue::segment_number(" B6  915 ").unwrap(), "915");
        assert!(matches!(
            JetBlue::segment_number("915"),
            Err(ExtractionError::InvalidFlightNumber(_))
        ));
    }
}
