//! Renders a reconciled calendar as iCalendar with all-day events.

use std::sync::OnceLock;

use chrono::{Days, NaiveDate, NaiveDateTime};
use ical::{
    generator::{IcalCalendar, IcalCalendarBuilder, IcalEvent, IcalEventBuilder, Property},
    ical_property,
};
use regex::Regex;

use crate::{model::ReconciledResult, region::Region};

static PROD_ID: [&str; 2] = ["Ferienkalender", "ferien_core"];
static TIMEZONE: &str = "Europe/Berlin";
static FORMAT: &str = "%Y%m%d";
static WHITESPACE: OnceLock<Regex> = OnceLock::new();

/// Build the calendar of all school holidays and public holidays of a region.
pub fn get_calendar(region: Region, result: &ReconciledResult, changed: NaiveDateTime) -> IcalCalendar {
    let changed = changed.format("%Y%m%dT%H%M%S").to_string();
    let mut calendar = IcalCalendarBuilder::version("2.0")
        .gregorian()
        .prodid(prod_id(region))
        .build();
    for period in &result.periods {
        calendar.events.push(get_event(
            region,
            &period.name,
            period.start,
            period.end,
            &changed,
        ));
    }
    for day in &result.days {
        calendar
            .events
            .push(get_event(region, &day.name, day.date, day.date, &changed));
    }
    calendar
}

/// Build an all-day event; `end` is inclusive.
fn get_event(
    region: Region,
    summary: &str,
    start: NaiveDate,
    end: NaiveDate,
    changed: &str,
) -> IcalEvent {
    let exclusive_end = end.checked_add_days(Days::new(1)).unwrap_or(end);
    IcalEventBuilder::tzid(TIMEZONE)
        .uid(uid(region, summary, start))
        .changed(changed)
        .start_day(start.format(FORMAT).to_string())
        .end_day(exclusive_end.format(FORMAT).to_string())
        .set(ical_property!("SUMMARY", summary))
        .set(ical_property!("LOCATION", region.name()))
        .set(ical_property!("TRANSP", "TRANSPARENT"))
        .build()
}

fn prod_id(region: Region) -> String {
    let mut strings: Vec<String> = Vec::from(PROD_ID).into_iter().map(String::from).collect();
    strings.splice(0..0, [String::from(region.code())]);
    strings.splice(0..0, [String::from("-")]);
    strings.join("//")
}

/// Get a unique id for a holiday in a region.
///
/// Changing this function is a breaking change!
fn uid(region: Region, summary: &str, start: NaiveDate) -> String {
    let whitespace_regex = WHITESPACE.get_or_init(|| Regex::new(r"\s+").unwrap());
    let summary = whitespace_regex.replace_all(summary, "-");
    format!(
        "Ferienkalender_{}_{summary}_{}@ferien_core",
        region.code(),
        start.format(FORMAT)
    )
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use ical::generator::Emitter;

    use super::*;
    use crate::model::{HolidayDay, HolidayKind, HolidayPeriod};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::from_str(s).unwrap()
    }

    fn get_test_result() -> ReconciledResult {
        ReconciledResult {
            periods: vec![HolidayPeriod {
                name: String::from("Weihnachtsferien"),
                start: date("2025-12-22"),
                end: date("2026-01-05"),
            }],
            days: vec![HolidayDay {
                name: String::from("Tag der Deutschen Einheit"),
                date: date("2025-10-03"),
                kind: HolidayKind::National,
            }],
            ..Default::default()
        }
    }

    fn get_property_value<'a>(event: &'a IcalEvent, property_name: &str) -> &'a str {
        event
            .properties
            .iter()
            .find(|property| property.name == property_name)
            .unwrap()
            .value
            .as_ref()
            .unwrap()
    }

    #[test]
    fn test_get_calendar() {
        let changed = date("2025-12-01").and_hms_opt(6, 0, 0).unwrap();
        let calendar = get_calendar(Region::Hessen, &get_test_result(), changed);
        assert_eq!(calendar.events.len(), 2);
        let period_event = &calendar.events[0];
        assert_eq!(get_property_value(period_event, "SUMMARY"), "Weihnachtsferien");
        assert_eq!(get_property_value(period_event, "DTEND"), "20260106");
        let day_event = &calendar.events[1];
        assert_eq!(get_property_value(day_event, "DTEND"), "20251004");
        for event in &calendar.events {
            for name in ["DTSTART", "DTEND"] {
                let properties: Vec<&Property> = event
                    .properties
                    .iter()
                    .filter(|property| property.name == name)
                    .collect();
                assert_eq!(properties.len(), 1, "{name}");
                assert_eq!(
                    properties[0].params,
                    Some(vec![(String::from("VALUE"), vec![String::from("DATE")])])
                );
            }
        }
        let ics = calendar.generate();
        assert!(ics.contains("Ferienkalender_HE_Tag-der-Deutschen-Einheit_20251003@ferien_core"));
        assert!(ics.contains("PRODID:-//HE//Ferienkalender//ferien_core"));
    }
}
