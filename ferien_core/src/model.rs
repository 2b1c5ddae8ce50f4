//! The calendar model shared by all stages of a refresh.

use std::collections::BTreeSet;

use bitmask_enum::bitmask;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

static WEEKDAYS: [&str; 7] = [
    "Montag",
    "Dienstag",
    "Mittwoch",
    "Donnerstag",
    "Freitag",
    "Samstag",
    "Sonntag",
];

/// A school holiday span, both ends inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayPeriod {
    pub name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl HolidayPeriod {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Every calendar year the period touches.
    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.start.year()..=self.end.year()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HolidayKind {
    National,
    Regional,
}

impl HolidayKind {
    pub fn bit(&self) -> HolidayKinds {
        match self {
            HolidayKind::National => HolidayKinds::National,
            HolidayKind::Regional => HolidayKinds::Regional,
        }
    }
}

/// The kinds of public holidays which should be included.
#[bitmask(u8)]
pub enum HolidayKinds {
    National,
    Regional,
}

impl HolidayKinds {
    pub fn from_flags(national: bool, regional: bool) -> Self {
        let mut kinds = HolidayKinds::none();
        if national {
            kinds |= HolidayKinds::National;
        }
        if regional {
            kinds |= HolidayKinds::Regional;
        }
        kinds
    }
}

/// A single public holiday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayDay {
    pub name: String,
    pub date: NaiveDate,
    pub kind: HolidayKind,
}

/// The inclusive range of dates a refresh is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl RequestWindow {
    /// The window from the start of the current school year (1 August) up to the end of the
    /// summer holidays (30 September) `years_ahead` years from now.
    pub fn school_years(today: NaiveDate, years_ahead: u32) -> Option<Self> {
        let start_year = if today.month() >= 8 {
            today.year()
        } else {
            today.year() - 1
        };
        let end_year = today.year().checked_add(i32::try_from(years_ahead).ok()?)?;
        Some(RequestWindow {
            from: NaiveDate::from_ymd_opt(start_year, 8, 1)?,
            to: NaiveDate::from_ymd_opt(end_year, 9, 30)?,
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }

    /// Every calendar year spanned by the window.
    pub fn years(&self) -> BTreeSet<i32> {
        (self.from.year()..=self.to.year()).collect()
    }
}

/// The merged, deduplicated and clipped output of one refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciledResult {
    pub periods: Vec<HolidayPeriod>,
    pub days: Vec<HolidayDay>,
    pub missing_years_periods: BTreeSet<i32>,
    pub missing_years_days: BTreeSet<i32>,
}

impl ReconciledResult {
    pub fn is_complete(&self) -> bool {
        self.missing_years_periods.is_empty() && self.missing_years_days.is_empty()
    }

    /// The year up to which school holidays are known.
    pub fn last_period_year(&self) -> Option<i32> {
        self.periods.iter().map(|period| period.end.year()).max()
    }
}

pub fn weekday_name(date: NaiveDate) -> &'static str {
    WEEKDAYS[date.weekday().num_days_from_monday() as usize]
}
