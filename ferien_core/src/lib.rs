//! This crate keeps the school holidays and public holidays of German states up to date.
//! A refresh fetches both feeds, merges them into one calendar, derives facts about today and
//! writes everything to `{REGION}_Ferien.yaml`.
//!
//! The dates are read from <https://openholidaysapi.org> or, alternatively, from
//! <https://ferien-api.de> and <https://date.nager.at>.

pub use ical;

pub mod calendar;
pub mod config;
pub mod export;
pub mod facts;
pub mod holiday_client;
pub mod model;
pub mod reconcile;
pub mod refresh;
pub mod region;
