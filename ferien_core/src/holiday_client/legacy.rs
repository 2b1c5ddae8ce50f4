//! Client for the older pair of feeds: <https://ferien-api.de> for school holidays and
//! <https://date.nager.at> for public holidays.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{
    holiday_client::{
        parse_iso_date, period, years, CalendarSource, DayRecord, HttpFetcher, PeriodRecord,
        RawFeed, RecordError,
    },
    model::{HolidayDay, HolidayKind, HolidayKinds, HolidayPeriod, RequestWindow},
    region::Region,
};

pub static FERIEN_API_URL: &str = "https://ferien-api.de/api/v1/holidays";
pub static NAGER_URL: &str = "https://date.nager.at/api/v3/PublicHolidays";

#[derive(Debug, Clone)]
pub struct LegacyClient {
    fetcher: HttpFetcher,
    ferien_api_url: String,
    nager_url: String,
    language: String,
}

impl LegacyClient {
    pub fn new(fetcher: HttpFetcher, ferien_api_url: &str, nager_url: &str, language: &str) -> Self {
        LegacyClient {
            fetcher,
            ferien_api_url: ferien_api_url.trim_end_matches('/').to_string(),
            nager_url: nager_url.trim_end_matches('/').to_string(),
            language: language.to_string(),
        }
    }
}

#[async_trait]
impl CalendarSource for LegacyClient {
    async fn fetch_periods(&self, region: Region, window: &RequestWindow) -> RawFeed<HolidayPeriod> {
        let units = years(window)
            .into_iter()
            .map(|year| (year, format!("{}/{}/{year}", self.ferien_api_url, region.code())))
            .collect();
        self.fetcher
            .collect_periods::<FerienApiRecord>(units, &self.language)
            .await
    }

    async fn fetch_days(
        &self,
        region: Region,
        window: &RequestWindow,
        kinds: HolidayKinds,
    ) -> RawFeed<HolidayDay> {
        let units = years(window)
            .into_iter()
            .map(|year| (year, format!("{}/{year}/DE", self.nager_url)))
            .collect();
        self.fetcher
            .collect_days::<NagerRecord>(units, region, kinds, &self.language)
            .await
    }
}

/// A ferien-api.de record, whose dates may carry a time and timezone.
#[derive(Debug, Clone, Deserialize)]
struct FerienApiRecord {
    start: String,
    end: String,
    name: Option<String>,
}

impl PeriodRecord for FerienApiRecord {
    fn to_period(&self, _language: &str) -> Result<HolidayPeriod, RecordError> {
        period(self.name.clone(), &self.start, &self.end)
    }
}

/// A date.nager.at record; `localName` is German, `name` is English.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NagerRecord {
    date: String,
    local_name: Option<String>,
    name: Option<String>,
    #[serde(default)]
    global: Option<bool>,
    #[serde(default)]
    counties: Option<Vec<String>>,
}

impl DayRecord for NagerRecord {
    fn date(&self) -> Result<NaiveDate, RecordError> {
        parse_iso_date(&self.date)
    }

    fn name(&self, language: &str) -> Option<String> {
        if language.eq_ignore_ascii_case("EN") {
            self.name.clone().or_else(|| self.local_name.clone())
        } else {
            self.local_name.clone().or_else(|| self.name.clone())
        }
    }

    fn classify(&self, subdivision_code: &str) -> Option<HolidayKind> {
        let counties = self.counties.as_deref().unwrap_or_default();
        if self.global == Some(true) || counties.is_empty() {
            return Some(HolidayKind::National);
        }
        counties
            .iter()
            .any(|county| county == subdivision_code)
            .then_some(HolidayKind::Regional)
    }
}
