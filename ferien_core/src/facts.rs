//! Facts about a reconciled calendar relative to today.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::ReconciledResult;

/// An upcoming holiday and how far away it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upcoming {
    pub name: String,
    pub date: NaiveDate,
    pub days_until: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedFacts {
    /// The school holidays today falls into.
    pub current_period: Option<String>,
    /// The first school holidays starting after today.
    pub next_period: Option<Upcoming>,
    /// The first public holiday today or later.
    pub next_day: Option<Upcoming>,
    pub today_is_free: bool,
    /// Why today is free, the school holidays win over a public holiday.
    pub today_reason: Option<String>,
}

pub fn derive(result: &ReconciledResult, today: NaiveDate) -> DerivedFacts {
    let current_period = result
        .periods
        .iter()
        .find(|period| period.contains(today))
        .map(|period| period.name.clone());
    let next_period = result
        .periods
        .iter()
        .find(|period| period.start > today)
        .map(|period| Upcoming {
            name: period.name.clone(),
            date: period.start,
            days_until: (period.start - today).num_days(),
        });
    let next_day = result
        .days
        .iter()
        .find(|day| day.date >= today)
        .map(|day| Upcoming {
            name: day.name.clone(),
            date: day.date,
            days_until: (day.date - today).num_days(),
        });
    let today_reason = result
        .periods
        .iter()
        .find(|period| period.contains(today))
        .map(|period| period.name.clone())
        .or_else(|| {
            result
                .days
                .iter()
                .find(|day| day.date == today)
                .map(|day| day.name.clone())
        });
    DerivedFacts {
        current_period,
        next_period,
        next_day,
        today_is_free: today_reason.is_some(),
        today_reason,
    }
}
