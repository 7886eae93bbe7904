// Text and markup helpers shared by the provider adapters

use chrono::NaiveTime;
use scraper::{ElementRef, Selector};

use crate::error::ExtractionError;

pub fn selector(css: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(css).map_err(|e| ExtractionError::Selector(format!("{}: {}", css, e)))
}

pub fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

// Text of every match of `css` under `element`, joined with `sep`
pub fn select_text(element: ElementRef<'_>, css: &str, sep: &str) -> Result<String, ExtractionError> {
    let sel = selector(css)?;
    Ok(element
        .select(&sel)
        .map(text_of)
        .collect::<Vec<_>>()
        .join(sep))
}

pub fn select_first<'a>(element: ElementRef<'a>, css: &str) -> Result<ElementRef<'a>, ExtractionError> {
    let sel = selector(css)?;
    element
        .select(&sel)
        .next()
        .ok_or_else(|| ExtractionError::MissingElement(css.to_string()))
}

pub fn select_last<'a>(element: ElementRef<'a>, css: &str) -> Result<ElementRef<'a>, ExtractionError> {
    let sel = selector(css)?;
    element
        .select(&sel)
        .last()
        .ok_or_else(|| ExtractionError::MissingElement(css.to_string()))
}

// Direct element children with the given tag name
pub fn child_elements<'a>(element: ElementRef<'a>, tag: &str) -> Vec<ElementRef<'a>> {
    element
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == tag)
        .collect()
}

// Converts "H:MM AM" / "H:MM PM" into a 24-hour time
pub fn parse_meridian_time(raw: &str) -> Result<NaiveTime, ExtractionError> {
    let invalid = || ExtractionError::InvalidTime(raw.trim().to_string());

    let mut parts = raw.split_whitespace();
    let clock = parts.next().ok_or_else(invalid)?;
    let indicator = parts.next().ok_or_else(invalid)?;
    if parts.next().is_some() {
        return Err(invalid());
    }

    let (hour, minute) = clock.split_once(':').ok_or_else(invalid)?;
    let hour: u32 = hour.parse().map_err(|_| invalid())?;
    let minute: u32 = minute.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&hour) {
        return Err(invalid());
    }

    let hour = match indicator.replace('.', "").to_ascii_uppercase().as_str() {
        "AM" => hour % 12,
        "PM" => hour % 12 + 12,
        _ => return Err(invalid()),
    };

    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)
}

// Empty fare text means the fare class is sold out
pub fn parse_fare(raw: &str) -> Result<Option<u32>, ExtractionError> {
    let cleaned: String = raw
        .trim_matches(|c: char| c == '$' || c.is_whitespace())
        .chars()
        .filter(|c| *c != ',')
        .collect();

    if cleaned.is_empty() {
        return Ok(None);
    }

    cleaned
        .parse::<u32>()
        .map(Some)
        .map_err(|_| ExtractionError::InvalidFare(raw.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;
    use test_case::test_case;

    #[test_case("12:00 AM", 0, 0; "#1 midnight")]
    #[test_case("12:00 PM", 12, 0; "#2 noon")]
    #[test_case("1:05 PM", 13, 5; "#3 early afternoon")]
    #[test_case("11:59 PM", 23, 59; "#4 last minute")]
    #[test_case("6:30 AM", 6, 30; "#5 morning passes through")]
    #[test_case("11:15 AM", 11, 15; "#6 late morning passes through")]
    #[test_case("  7:45   pm ", 19, 45; "#7 loose spacing and lower case")]
    #[test_case("9:10 P.M.", 21, 10; "#8 dotted indicator")]
    fn test_parse_meridian_time(raw: &str, hour: u32, minute: u32) {
        assert_eq!(
            parse_meridian_time(raw).unwrap(),
            NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
        );
    }

    #[test_case(""; "#1 empty")]
    #[test_case("7:45"; "#2 no indicator")]
    #[test_case("13:00 PM"; "#3 hour out of range")]
    #[test_case("0:30 AM"; "#4 zero hour")]
    #[test_case("7:61 AM"; "#5 minute out of range")]
    #[test_case("7.45 AM"; "#6 wrong separator")]
    #[test_case("7:45 XM"; "#7 unknown indicator")]
    fn test_parse_meridian_time_rejects(raw: &str) {
        assert!(matches!(
            parse_meridian_time(raw),
            Err(ExtractionError::InvalidTime(_))
        ));
    }

    #[test_case("$120", Some(120); "#1 dollar amount")]
    #[test_case("\n\t $89 \n", Some(89); "#2 padded")]
    #[test_case("$1,204", Some(1204); "#3 thousands separator")]
    #[test_case("", None; "#4 empty is sold out")]
    #[test_case(" $ \n", None; "#5 only symbol is sold out")]
    fn test_parse_fare(raw: &str, expected: Option<u32>) {
        assert_eq!(parse_fare(raw).unwrap(), expected);
    }

    #[test]
    fn test_parse_fare_rejects_text() {
        assert_eq!(
            parse_fare("Sold Out").unwrap_err(),
            ExtractionError::InvalidFare("Sold Out".to_string())
        );
    }

    #[test]
    fn test_selection_helpers() {
        let doc = Html::parse_document(
            r#"<div id="root"><span class="n">A</span><p><span class="n">B</span></p><span class="n">C</span></div>"#,
        );
        let root = doc.select(&selector("#root").unwrap()).next().unwrap();

        assert_eq!(select_text(root, ".n", "/").unwrap(), "A/B/C");
        assert_eq!(text_of(select_first(root, ".n").unwrap()), "A");
        assert_eq!(text_of(select_last(root, ".n").unwrap()), "C");
        assert_eq!(child_elements(root, "span").len(), 2);
        assert_eq!(
            select_first(root, ".missing").unwrap_err(),
            ExtractionError::MissingElement(".missing".to_string())
        );
        assert!(matches!(selector("td["), Err(ExtractionError::Selector(_))));
    }
}
