//! Merge raw feeds into one deduplicated calendar clipped to the request window.
//!
//! Nothing in here performs I/O, so the same feeds and window always give the same result.

use std::collections::{BTreeSet, HashSet};

use chrono::{Datelike, NaiveDate};

use crate::{
    holiday_client::RawFeed,
    model::{HolidayDay, HolidayPeriod, ReconciledResult, RequestWindow},
};

/// Reconcile the school holiday feed and the optional public holiday feed.
///
/// A `None` day feed means public holidays are disabled; no missing years are reported for it.
pub fn reconcile(
    raw_periods: &RawFeed<HolidayPeriod>,
    raw_days: Option<&RawFeed<HolidayDay>>,
    window: &RequestWindow,
) -> ReconciledResult {
    let periods = reconcile_periods(&raw_periods.records, window);
    warn_overlaps(&periods);
    let missing_years_periods = missing_years(
        window,
        raw_periods
            .records
            .iter()
            .flat_map(HolidayPeriod::years)
            .chain(raw_periods.observed_years.iter().copied()),
        &raw_periods.failed_years,
    );
    let (days, missing_years_days) = match raw_days {
        Some(raw_days) => (
            reconcile_days(&raw_days.records, window),
            missing_years(
                window,
                raw_days
                    .records
                    .iter()
                    .map(|day| day.date.year())
                    .chain(raw_days.observed_years.iter().copied()),
                &raw_days.failed_years,
            ),
        ),
        None => (vec![], BTreeSet::new()),
    };
    ReconciledResult {
        periods,
        days,
        missing_years_periods,
        missing_years_days,
    }
}

/// Clip periods to the window, drop the ones outside of it and remove duplicates.
fn reconcile_periods(records: &[HolidayPeriod], window: &RequestWindow) -> Vec<HolidayPeriod> {
    let mut seen: HashSet<(String, NaiveDate, NaiveDate)> = HashSet::new();
    let mut periods: Vec<HolidayPeriod> = records
        .iter()
        .filter_map(|period| clip(period, window))
        .filter(|period| seen.insert((period.name.clone(), period.start, period.end)))
        .collect();
    periods.sort_by_key(|period| period.start);
    periods
}

fn reconcile_days(records: &[HolidayDay], window: &RequestWindow) -> Vec<HolidayDay> {
    let mut seen: HashSet<(String, NaiveDate)> = HashSet::new();
    let mut days: Vec<HolidayDay> = records
        .iter()
        .filter(|day| window.contains(day.date))
        .filter(|day| seen.insert((day.name.clone(), day.date)))
        .cloned()
        .collect();
    days.sort_by_key(|day| day.date);
    days
}

fn clip(period: &HolidayPeriod, window: &RequestWindow) -> Option<HolidayPeriod> {
    if period.end < window.from || period.start > window.to {
        return None;
    }
    Some(HolidayPeriod {
        name: period.name.clone(),
        start: period.start.max(window.from),
        end: period.end.min(window.to),
    })
}

/// The window years without any record, plus the years whose request failed.
///
/// `observed` also covers records the adapter parsed but did not keep, e.g. public holidays of a
/// kind which is not included.
fn missing_years(
    window: &RequestWindow,
    observed: impl Iterator<Item = i32>,
    failed_years: &BTreeSet<i32>,
) -> BTreeSet<i32> {
    let observed: BTreeSet<i32> = observed.collect();
    window
        .years()
        .into_iter()
        .filter(|year| !observed.contains(year) || failed_years.contains(year))
        .collect()
}

fn warn_overlaps(periods: &[HolidayPeriod]) {
    for pair in periods.windows(2) {
        if pair[1].start <= pair[0].end {
            log::warn!(
                "school holidays overlap: {} ({} - {}) and {} ({} - {})",
                pair[0].name,
                pair[0].start,
                pair[0].end,
                pair[1].name,
                pair[1].start,
                pair[1].end,
            );
        }
    }
}
