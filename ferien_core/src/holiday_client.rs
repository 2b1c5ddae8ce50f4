//! These clients fetch school holidays and public holidays and normalize them into the calendar
//! model.
//!
//! Both feeds are requested once per calendar year of the request window. A failing request only
//! marks its year as failed, it never fails the whole fetch.

pub mod legacy;
pub mod openholidays;

use std::{collections::BTreeSet, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use reqwest::{header::ACCEPT, Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use thiserror::Error;

use crate::{
    model::{HolidayDay, HolidayKind, HolidayKinds, HolidayPeriod, RequestWindow},
    region::Region,
};

static DEFAULT_PERIOD_NAME: &str = "Ferien";
static DEFAULT_DAY_NAME: &str = "Feiertag";

/// The records of one feed together with the years whose request failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFeed<T> {
    pub records: Vec<T>,
    pub failed_years: BTreeSet<i32>,
    /// Years with at least one usable record, including records filtered out afterwards.
    pub observed_years: BTreeSet<i32>,
}

impl<T> Default for RawFeed<T> {
    fn default() -> Self {
        RawFeed {
            records: vec![],
            failed_years: BTreeSet::new(),
            observed_years: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("no data published (404)")]
    NotPublished,
    #[error("unexpected status {0}")]
    Status(StatusCode),
    #[error("malformed body: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("expected a JSON array, got {0}")]
    Shape(&'static str),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("cannot parse date `{0}`")]
    InvalidDate(String),
    #[error("period ends before it starts ({start} > {end})")]
    Reversed { start: NaiveDate, end: NaiveDate },
}

/// A remote source of school holidays and public holidays.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    async fn fetch_periods(&self, region: Region, window: &RequestWindow) -> RawFeed<HolidayPeriod>;

    async fn fetch_days(
        &self,
        region: Region,
        window: &RequestWindow,
        kinds: HolidayKinds,
    ) -> RawFeed<HolidayDay>;
}

/// Fetch both feeds concurrently.
///
/// The public holiday feed is skipped and `None` is returned if no holiday kind is included.
pub async fn fetch_all(
    source: &dyn CalendarSource,
    region: Region,
    window: &RequestWindow,
    kinds: HolidayKinds,
) -> (RawFeed<HolidayPeriod>, Option<RawFeed<HolidayDay>>) {
    if kinds == HolidayKinds::none() {
        log::info!("public holidays disabled for {region}, skipping");
        return (source.fetch_periods(region, window).await, None);
    }
    let (periods, days) = tokio::join!(
        source.fetch_periods(region, window),
        source.fetch_days(region, window, kinds),
    );
    (periods, Some(days))
}

/// A school holiday record as delivered by one provider.
pub trait PeriodRecord: DeserializeOwned {
    fn to_period(&self, language: &str) -> Result<HolidayPeriod, RecordError>;
}

/// A public holiday record as delivered by one provider.
pub trait DayRecord: DeserializeOwned {
    fn date(&self) -> Result<NaiveDate, RecordError>;

    fn name(&self, language: &str) -> Option<String>;

    /// Classify the record relative to the queried subdivision.
    ///
    /// Records without any regional scoping count as national.
    /// `None` means the holiday belongs to other subdivisions only.
    fn classify(&self, subdivision_code: &str) -> Option<HolidayKind>;
}

/// A name in one language, as used by providers which deliver translations.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalizedText {
    pub language: String,
    pub text: String,
}

/// Pick the variant in the target language, falling back to the first one.
pub fn localized(texts: &[LocalizedText], language: &str) -> Option<String> {
    texts
        .iter()
        .find(|text| text.language.eq_ignore_ascii_case(language))
        .or_else(|| texts.first())
        .map(|text| text.text.clone())
}

/// Parse an ISO date, tolerating a trailing time and timezone.
pub fn parse_iso_date(raw: &str) -> Result<NaiveDate, RecordError> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(date_time) = DateTime::parse_from_rfc3339(raw) {
        return Ok(date_time.date_naive());
    }
    let without_zone = raw.trim_end_matches('Z');
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .into_iter()
        .find_map(|format| NaiveDateTime::parse_from_str(without_zone, format).ok())
        .map(|date_time| date_time.date())
        .ok_or_else(|| RecordError::InvalidDate(raw.to_string()))
}

/// Shared HTTP plumbing for the providers.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(HttpFetcher { client })
    }

    /// Get the entries of a JSON array response.
    async fn get_entries(&self, url: &str) -> Result<Vec<Value>, FetchError> {
        log::debug!("fetching {url}");
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => return Err(FetchError::NotPublished),
            status if !status.is_success() => return Err(FetchError::Status(status)),
            _ => {}
        }
        let body: Value = serde_json::from_str(&response.text().await?)?;
        match body {
            Value::Array(entries) => Ok(entries),
            Value::Object(_) => Err(FetchError::Shape("an object")),
            Value::Null => Err(FetchError::Shape("null")),
            _ => Err(FetchError::Shape("a scalar")),
        }
    }

    /// Fetch every yearly unit and collect the school holidays.
    async fn collect_periods<R: PeriodRecord>(
        &self,
        units: Vec<(i32, String)>,
        language: &str,
    ) -> RawFeed<HolidayPeriod> {
        let mut feed = RawFeed::default();
        for (year, url) in units {
            match self.get_entries(&url).await {
                Ok(entries) => {
                    let periods = parse_periods::<R>(entries, language);
                    feed.observed_years.extend(periods.iter().flat_map(HolidayPeriod::years));
                    feed.records.extend(periods);
                }
                Err(err) => {
                    log_unit_failure(year, &url, &err);
                    feed.failed_years.insert(year);
                }
            }
        }
        feed.records.sort_by_key(|period| period.start);
        feed
    }

    /// Fetch every yearly unit and collect the public holidays of the included kinds.
    async fn collect_days<R: DayRecord>(
        &self,
        units: Vec<(i32, String)>,
        region: Region,
        kinds: HolidayKinds,
        language: &str,
    ) -> RawFeed<HolidayDay> {
        let mut feed = RawFeed::default();
        for (year, url) in units {
            match self.get_entries(&url).await {
                Ok(entries) => {
                    let records = parse_day_records::<R>(entries);
                    feed.observed_years.extend(records.iter().map(|(date, _)| date.year()));
                    feed.records.extend(select_days(records, region, kinds, language));
                }
                Err(err) => {
                    log_unit_failure(year, &url, &err);
                    feed.failed_years.insert(year);
                }
            }
        }
        feed.records.sort_by_key(|day| day.date);
        feed
    }
}

fn log_unit_failure(year: i32, url: &str, err: &FetchError) {
    match err {
        FetchError::NotPublished => {
            log::warn!("no data for {year} at {url}, the provider may not have published it yet")
        }
        _ => log::error!("error fetching {url}: {err}"),
    }
}

/// Parse school holiday entries one by one, dropping the ones which cannot be used.
pub fn parse_periods<R: PeriodRecord>(entries: Vec<Value>, language: &str) -> Vec<HolidayPeriod> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let record = match serde_json::from_value::<R>(entry) {
                Ok(record) => record,
                Err(err) => {
                    log::warn!("skipping malformed school holiday record: {err}");
                    return None;
                }
            };
            match record.to_period(language) {
                Ok(period) => Some(period),
                Err(err) => {
                    log::warn!("skipping school holiday record: {err}");
                    None
                }
            }
        })
        .collect()
}

/// Parse public holiday entries one by one, keeping only the included kinds.
pub fn parse_days<R: DayRecord>(
    entries: Vec<Value>,
    region: Region,
    kinds: HolidayKinds,
    language: &str,
) -> Vec<HolidayDay> {
    select_days(parse_day_records::<R>(entries), region, kinds, language)
}

/// Parse public holiday entries one by one, dropping the ones without a usable date.
fn parse_day_records<R: DayRecord>(entries: Vec<Value>) -> Vec<(NaiveDate, R)> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let record = match serde_json::from_value::<R>(entry) {
                Ok(record) => record,
                Err(err) => {
                    log::warn!("skipping malformed public holiday record: {err}");
                    return None;
                }
            };
            match record.date() {
                Ok(date) => Some((date, record)),
                Err(err) => {
                    log::warn!("skipping public holiday record: {err}");
                    None
                }
            }
        })
        .collect()
}

/// Classify parsed records for a region and keep the included kinds.
fn select_days<R: DayRecord>(
    records: Vec<(NaiveDate, R)>,
    region: Region,
    kinds: HolidayKinds,
    language: &str,
) -> Vec<HolidayDay> {
    let subdivision_code = region.subdivision_code();
    records
        .into_iter()
        .filter_map(|(date, record)| {
            let kind = record.classify(&subdivision_code)?;
            if !kinds.contains(kind.bit()) {
                return None;
            }
            Some(HolidayDay {
                name: record
                    .name(language)
                    .unwrap_or_else(|| String::from(DEFAULT_DAY_NAME)),
                date,
                kind,
            })
        })
        .collect()
}

/// The calendar years to request for a window.
fn years(window: &RequestWindow) -> Vec<i32> {
    window.years().into_iter().collect()
}

fn period(name: Option<String>, start: &str, end: &str) -> Result<HolidayPeriod, RecordError> {
    let start = parse_iso_date(start)?;
    let end = parse_iso_date(end)?;
    if start > end {
        return Err(RecordError::Reversed { start, end });
    }
    Ok(HolidayPeriod {
        name: name.unwrap_or_else(|| String::from(DEFAULT_PERIOD_NAME)),
        start,
        end,
    })
}
