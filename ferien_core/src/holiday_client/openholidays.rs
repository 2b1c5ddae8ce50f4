//! Client for <https://openholidaysapi.org>, which serves both school holidays and public holidays.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{
    holiday_client::{
        localized, parse_iso_date, period, years, CalendarSource, DayRecord, HttpFetcher,
        LocalizedText, PeriodRecord, RawFeed, RecordError,
    },
    model::{HolidayDay, HolidayKind, HolidayKinds, HolidayPeriod, RequestWindow},
    region::Region,
};

pub static BASE_URL: &str = "https://openholidaysapi.org";

#[derive(Debug, Clone)]
pub struct OpenHolidaysClient {
    fetcher: HttpFetcher,
    base_url: String,
    language: String,
}

impl OpenHolidaysClient {
    pub fn new(fetcher: HttpFetcher, base_url: &str, language: &str) -> Self {
        OpenHolidaysClient {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
            language: language.to_string(),
        }
    }

    /// One request per calendar year of the window.
    fn units(&self, endpoint: &str, region: Region, window: &RequestWindow) -> Vec<(i32, String)> {
        years(window)
            .into_iter()
            .map(|year| {
                let url = format!(
                    "{}/{endpoint}?countryIsoCode=DE&subdivisionCode={}&languageIsoCode={}&validFrom={year}-01-01&validTo={year}-12-31",
                    self.base_url,
                    region.subdivision_code(),
                    self.language,
                );
                (year, url)
            })
            .collect()
    }
}

#[async_trait]
impl CalendarSource for OpenHolidaysClient {
    async fn fetch_periods(&self, region: Region, window: &RequestWindow) -> RawFeed<HolidayPeriod> {
        let units = self.units("SchoolHolidays", region, window);
        self.fetcher
            .collect_periods::<OpenHolidaysRecord>(units, &self.language)
            .await
    }

    async fn fetch_days(
        &self,
        region: Region,
        window: &RequestWindow,
        kinds: HolidayKinds,
    ) -> RawFeed<HolidayDay> {
        let units = self.units("PublicHolidays", region, window);
        self.fetcher
            .collect_days::<OpenHolidaysRecord>(units, region, kinds, &self.language)
            .await
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Subdivision {
    code: String,
}

/// The record shape shared by the `SchoolHolidays` and `PublicHolidays` endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenHolidaysRecord {
    start_date: String,
    end_date: String,
    #[serde(default)]
    name: Vec<LocalizedText>,
    #[serde(default)]
    nationwide: Option<bool>,
    #[serde(default)]
    subdivisions: Option<Vec<Subdivision>>,
}

impl PeriodRecord for OpenHolidaysRecord {
    fn to_period(&self, language: &str) -> Result<HolidayPeriod, RecordError> {
        period(
            localized(&self.name, language),
            &self.start_date,
            &self.end_date,
        )
    }
}

impl DayRecord for OpenHolidaysRecord {
    fn date(&self) -> Result<NaiveDate, RecordError> {
        parse_iso_date(&self.start_date)
    }

    fn name(&self, language: &str) -> Option<String> {
        localized(&self.name, language)
    }

    fn classify(&self, subdivision_code: &str) -> Option<HolidayKind> {
        let subdivisions = self.subdivisions.as_deref().unwrap_or_default();
        if self.nationwide == Some(true) || subdivisions.is_empty() {
            return Some(HolidayKind::National);
        }
        subdivisions
            .iter()
            .any(|subdivision| subdivision.code == subdivision_code)
            .then_some(HolidayKind::Regional)
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeSet, str::FromStr};

    use serde_json::Value;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    use super::*;
    use crate::{
        holiday_client::{parse_days, parse_periods},
        reconcile::reconcile,
    };

    fn date(s: &str) -> NaiveDate {
        NaiveDate::from_str(s).unwrap()
    }

    fn entries(json: &str) -> Vec<Value> {
        serde_json::from_str(json).unwrap()
    }

    /// Test whether school holidays are parsed and broken records are dropped.
    ///
    /// This test is offline.
    #[test]
    fn test_parse_school_holidays() {
        let json = include_str!("tests/openholidays_school_holidays.json");
        let periods = parse_periods::<OpenHolidaysRecord>(entries(json), "DE");
        assert_eq!(
            periods,
            vec![
                HolidayPeriod {
                    name: String::from("Sommerferien"),
                    start: date("2025-08-04"),
                    end: date("2025-09-15"),
                },
                HolidayPeriod {
                    name: String::from("Herbstferien"),
                    start: date("2025-11-03"),
                    end: date("2025-11-07"),
                },
                HolidayPeriod {
                    name: String::from("Weihnachtsferien"),
                    start: date("2025-12-22"),
                    end: date("2026-01-05"),
                },
            ]
        );
    }

    #[test]
    fn test_parse_public_holidays_all_kinds() {
        let json = include_str!("tests/openholidays_public_holidays.json");
        let days = parse_days::<OpenHolidaysRecord>(
            entries(json),
            Region::Bayern,
            HolidayKinds::National | HolidayKinds::Regional,
            "DE",
        );
        let summary: Vec<(&str, HolidayKind)> = days
            .iter()
            .map(|day| (day.name.as_str(), day.kind))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Neujahr", HolidayKind::National),
                ("Heilige Drei Könige", HolidayKind::Regional),
                ("Tag der Arbeit", HolidayKind::National),
                ("Tag der Deutschen Einheit", HolidayKind::National),
            ]
        );
    }

    #[test]
    fn test_parse_public_holidays_regional_only() {
        let json = include_str!("tests/openholidays_public_holidays.json");
        let days = parse_days::<OpenHolidaysRecord>(
            entries(json),
            Region::Bayern,
            HolidayKinds::Regional,
            "DE",
        );
        assert_eq!(
            days,
            vec![HolidayDay {
                name: String::from("Heilige Drei Könige"),
                date: date("2025-01-06"),
                kind: HolidayKind::Regional,
            }]
        );
    }

    #[test]
    fn test_classify() {
        let record: OpenHolidaysRecord = serde_json::from_str(
            r#"{"startDate":"2025-03-08","endDate":"2025-03-08","nationwide":false,"subdivisions":[{"code":"DE-BE"}]}"#,
        )
        .unwrap();
        assert_eq!(record.classify("DE-BE"), Some(HolidayKind::Regional));
        assert_eq!(record.classify("DE-BY"), None);
    }

    #[test]
    fn test_units() {
        let client = OpenHolidaysClient::new(
            HttpFetcher::new(std::time::Duration::from_secs(1)).unwrap(),
            "https://example.org/",
            "DE",
        );
        let window = RequestWindow {
            from: date("2025-08-01"),
            to: date("2026-09-30"),
        };
        let units = client.units("SchoolHolidays", Region::Hessen, &window);
        assert_eq!(units.len(), 2);
        assert_eq!(units[1].0, 2026);
        assert_eq!(
            units[1].1,
            "https://example.org/SchoolHolidays?countryIsoCode=DE&subdivisionCode=DE-HE&languageIsoCode=DE&validFrom=2026-01-01&validTo=2026-12-31"
        );
    }

    /// Serve canned responses on a local port and return the base URL.
    ///
    /// `respond` maps the request target to a status code and a body.
    async fn serve(respond: fn(&str) -> (u16, &'static str)) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buffer = [0u8; 1024];
                    while !request.windows(4).any(|window| window == b"\r\n\r\n") {
                        match stream.read(&mut buffer).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buffer[..n]),
                        }
                    }
                    let request = String::from_utf8_lossy(&request);
                    let target = request.split_whitespace().nth(1).unwrap_or_default();
                    let (status, body) = respond(target);
                    let response = format!(
                        "HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });
        format!("http://{addr}")
    }

    fn get_test_client(base_url: &str) -> OpenHolidaysClient {
        OpenHolidaysClient::new(
            HttpFetcher::new(std::time::Duration::from_secs(5)).unwrap(),
            base_url,
            "DE",
        )
    }

    fn respond_school_holidays(target: &str) -> (u16, &'static str) {
        if !target.starts_with("/SchoolHolidays?") {
            return (404, "[]");
        }
        if target.contains("validFrom=2025") {
            (200, include_str!("tests/openholidays_school_holidays.json"))
        } else if target.contains("validFrom=2026") {
            (500, "Internal Server Error")
        } else if target.contains("validFrom=2027") {
            (200, r#"{"a":1}"#)
        } else if target.contains("validFrom=2028") {
            (200, "[not json")
        } else {
            (404, "[]")
        }
    }

    /// Test whether failing yearly requests are recorded and do not stop the others.
    ///
    /// This test is offline.
    #[tokio::test]
    async fn test_fetch_periods_with_failing_years() {
        let client = get_test_client(&serve(respond_school_holidays).await);
        let window = RequestWindow {
            from: date("2025-08-01"),
            to: date("2029-09-30"),
        };
        let feed = client.fetch_periods(Region::Bayern, &window).await;
        let names: Vec<&str> = feed
            .records
            .iter()
            .map(|period| period.name.as_str())
            .collect();
        assert_eq!(names, vec!["Sommerferien", "Herbstferien", "Weihnachtsferien"]);
        assert_eq!(feed.failed_years, BTreeSet::from([2026, 2027, 2028, 2029]));
        assert_eq!(feed.observed_years, BTreeSet::from([2025, 2026]));

        let result = reconcile(&feed, None, &window);
        assert_eq!(result.periods.len(), 3);
        assert_eq!(
            result.missing_years_periods,
            BTreeSet::from([2026, 2027, 2028, 2029])
        );
    }

    fn respond_public_holidays(target: &str) -> (u16, &'static str) {
        if !target.starts_with("/PublicHolidays?") {
            return (404, "[]");
        }
        if target.contains("validFrom=2025") {
            (200, include_str!("tests/openholidays_public_holidays.json"))
        } else if target.contains("validFrom=2026") {
            (
                200,
                r#"[{"startDate":"2026-01-01","endDate":"2026-01-01","name":[{"language":"DE","text":"Neujahr"}],"nationwide":true}]"#,
            )
        } else {
            (404, "[]")
        }
    }

    /// Test whether a year with only excluded public holidays still counts as delivered.
    ///
    /// This test is offline.
    #[tokio::test]
    async fn test_fetch_days_regional_only() {
        let client = get_test_client(&serve(respond_public_holidays).await);
        let window = RequestWindow {
            from: date("2025-08-01"),
            to: date("2026-09-30"),
        };
        let feed = client
            .fetch_days(Region::Bayern, &window, HolidayKinds::Regional)
            .await;
        assert_eq!(
            feed.records,
            vec![HolidayDay {
                name: String::from("Heilige Drei Könige"),
                date: date("2025-01-06"),
                kind: HolidayKind::Regional,
            }]
        );
        assert!(feed.failed_years.is_empty());
        assert_eq!(feed.observed_years, BTreeSet::from([2025, 2026]));

        let periods = RawFeed::default();
        let result = reconcile(&periods, Some(&feed), &window);
        assert!(result.days.is_empty());
        assert!(result.missing_years_days.is_empty());
    }

    /// Test whether the live API delivers school holidays.
    ///
    /// This is an online test!
    #[tokio::test]
    #[ignore = "online"]
    async fn test_fetch_periods() {
        let client = OpenHolidaysClient::new(
            HttpFetcher::new(std::time::Duration::from_secs(15)).unwrap(),
            BASE_URL,
            "DE",
        );
        let window = RequestWindow {
            from: date("2025-08-01"),
            to: date("2026-09-30"),
        };
        let feed = client.fetch_periods(Region::Bayern, &window).await;
        assert!(!feed.records.is_empty());
    }
}
