//! Value coercion helpers.
//!
//! Pure functions turning raw HL7 v2 text into normalized primitives: ISO
//! dates and instants, administrative gender, order status and observation
//! values. None of them fail; an unusable input is reported as `None`.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

/// A date at the precision the source supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FhirDate {
    Year(i32),
    YearMonth(i32, u32),
    Date(NaiveDate),
    Instant(DateTime<Utc>),
}

impl FhirDate {
    /// Drop any time part, keeping at most day precision.
    pub fn to_date_precision(self) -> FhirDate {
        match self {
            FhirDate::Instant(dt) => FhirDate::Date(dt.date_naive()),
            other => other,
        }
    }

    /// The value as a UTC instant; a bare date becomes midnight UTC.
    ///
    /// Year and year-month values have no instant form.
    pub fn to_instant(self) -> Option<DateTime<Utc>> {
        match self {
            FhirDate::Instant(dt) => Some(dt),
            FhirDate::Date(d) => d.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n)),
            FhirDate::Year(_) | FhirDate::YearMonth(..) => None,
        }
    }
}

impl fmt::Display for FhirDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FhirDate::Year(y) => write!(f, "{:04}", y),
            FhirDate::YearMonth(y, m) => write!(f, "{:04}-{:02}", y, m),
            FhirDate::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FhirDate::Instant(dt) => write!(f, "{}", format_instant(dt)),
        }
    }
}

impl Serialize for FhirDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Render an instant as `YYYY-MM-DDThh:mm:ss+00:00`.
pub fn format_instant(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S+00:00").to_string()
}

fn iso_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"^(\d{4})(?:-(\d{2})(?:-(\d{2})(?:T(\d{2}):(\d{2}):(\d{2})(?:\+00:00|Z))?)?)?$",
            )
            .ok()
        })
        .as_ref()
}

/// Normalize an HL7 v2 `DT`/`DTM` value (or an already normalized ISO value).
///
/// - `YYYYMMDDhhmmss...` → instant (UTC)
/// - `YYYYMMDD...` (8 to 13 leading digits) → date
/// - exactly `YYYYMM` → year-month
/// - exactly `YYYY` → year
///
/// Anything else, including impossible calendar values, yields `None`.
///
/// # Example
/// ```
/// use hl7_fhir::coercion::normalize_date;
///
/// assert_eq!(normalize_date("19700101").unwrap().to_string(), "1970-01-01");
/// assert_eq!(normalize_date("197001").unwrap().to_string(), "1970-01");
/// assert!(normalize_date("19701").is_none());
/// ```
pub fn normalize_date(raw: &str) -> Option<FhirDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if s.as_bytes().get(4) == Some(&b'-') {
        return parse_iso(s);
    }

    let digits = s.len() - s.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    let prefix = &s[..digits];
    match digits {
        n if n >= 14 => NaiveDateTime::parse_from_str(&prefix[..14], "%Y%m%d%H%M%S")
            .ok()
            .map(|n| FhirDate::Instant(Utc.from_utc_datetime(&n))),
        n if n >= 8 => parse_ymd(&prefix[..4], &prefix[4..6], &prefix[6..8]),
        6 if digits == s.len() => year_month(&prefix[..4], &prefix[4..6]),
        4 if digits == s.len() => prefix.parse().ok().map(FhirDate::Year),
        _ => None,
    }
}

fn parse_iso(s: &str) -> Option<FhirDate> {
    let caps = iso_pattern()?.captures(s)?;
    let year = caps.get(1)?.as_str();
    let Some(month) = caps.get(2).map(|m| m.as_str()) else {
        return year.parse().ok().map(FhirDate::Year);
    };
    let Some(day) = caps.get(3).map(|m| m.as_str()) else {
        return year_month(year, month);
    };
    let date = NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)?;
    match (caps.get(4), caps.get(5), caps.get(6)) {
        (Some(h), Some(m), Some(sec)) => {
            let time = date.and_hms_opt(
                h.as_str().parse().ok()?,
                m.as_str().parse().ok()?,
                sec.as_str().parse().ok()?,
            )?;
            Some(FhirDate::Instant(Utc.from_utc_datetime(&time)))
        }
        _ => Some(FhirDate::Date(date)),
    }
}

fn parse_ymd(year: &str, month: &str, day: &str) -> Option<FhirDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
        .map(FhirDate::Date)
}

fn year_month(year: &str, month: &str) -> Option<FhirDate> {
    let month: u32 = month.parse().ok()?;
    if !(1..=12).contains(&month) {
        return None;
    }
    Some(FhirDate::YearMonth(year.parse().ok()?, month))
}

/// Normalize to at most day precision (birth dates, encounter periods).
pub fn to_date_precision(raw: &str) -> Option<FhirDate> {
    normalize_date(raw).map(FhirDate::to_date_precision)
}

/// Normalize to a UTC instant (observation effective time).
pub fn to_instant(raw: &str) -> Option<DateTime<Utc>> {
    normalize_date(raw).and_then(FhirDate::to_instant)
}

/// Administrative gender code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdministrativeGender {
    Male,
    Female,
    Other,
    Unknown,
}

/// Map PID-8 to administrative gender.
///
/// `M`, `F`, `O`, `U` map directly (case-insensitive); any other non-empty
/// code is `Unknown`; an empty value stays absent.
pub fn map_gender(raw: &str) -> Option<AdministrativeGender> {
    let code = raw.trim().to_ascii_uppercase();
    match code.as_str() {
        "" => None,
        "M" => Some(AdministrativeGender::Male),
        "F" => Some(AdministrativeGender::Female),
        "O" => Some(AdministrativeGender::Other),
        _ => Some(AdministrativeGender::Unknown),
    }
}

/// Service request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Active,
    Completed,
}

/// Map ORC-5 to a request status. Only `CM` completes an order.
pub fn map_order_status(raw: Option<&str>) -> RequestStatus {
    match raw.map(|s| s.trim().to_ascii_uppercase()).as_deref() {
        Some("CM") => RequestStatus::Completed,
        _ => RequestStatus::Active,
    }
}

/// Numeric observation value with an optional unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quantity {
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Observation value, serialized as `valueQuantity` or `valueString`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ObservationValue {
    #[serde(rename = "valueQuantity")]
    Quantity(Quantity),
    #[serde(rename = "valueString")]
    String(String),
}

/// Coerce OBX-5 into a decimal quantity, keeping the text when it is not a
/// number.
pub fn coerce_value(raw: &str, unit: Option<String>) -> ObservationValue {
    let text = raw.trim();
    match Decimal::from_str(text) {
        Ok(value) => ObservationValue::Quantity(Quantity { value, unit }),
        Err(_) => ObservationValue::String(text.to_string()),
    }
}

/// Trim a value, mapping blank text to `None`.
pub fn clean(raw: &str) -> Option<String> {
    let s = raw.trim();
    (!s.is_empty()).then(|| s.to_string())
}
