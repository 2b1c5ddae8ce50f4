//! Writes the reconciled calendar to `{REGION}_Ferien.yaml`.
//!
//! Besides the school holidays and public holidays the document lists every free school day,
//! which is what most automations actually look up.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    model::{weekday_name, HolidayDay, HolidayKind, HolidayPeriod},
    region::Region,
};

static NOTICE: &str = "Automatisch generiert – nicht manuell bearbeiten";
static TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
static DATE_SCALAR: OnceLock<Regex> = OnceLock::new();

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot serialize document: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub info: Info,
    pub ferien: Vec<PeriodEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feiertage: Option<Vec<DayEntry>>,
    pub alle_freien_tage: Vec<FreeDayEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    pub bundesland: Region,
    pub erstellt: String,
    pub hinweis: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodEntry {
    pub name: String,
    pub von: NaiveDate,
    pub bis: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayEntry {
    pub name: String,
    pub datum: NaiveDate,
    pub wochentag: String,
    pub typ: HolidayKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeDayEntry {
    pub datum: NaiveDate,
    pub wochentag: String,
    pub grund: String,
}

pub fn file_name(region: Region) -> String {
    format!("{}_Ferien.yaml", region.code())
}

/// Build the document; `days` is `None` if public holidays are disabled.
pub fn document(
    region: Region,
    periods: &[HolidayPeriod],
    days: Option<&[HolidayDay]>,
    generated: NaiveDateTime,
) -> Document {
    Document {
        info: Info {
            bundesland: region,
            erstellt: generated.format(TIMESTAMP_FORMAT).to_string(),
            hinweis: String::from(NOTICE),
        },
        ferien: periods
            .iter()
            .map(|period| PeriodEntry {
                name: period.name.clone(),
                von: period.start,
                bis: period.end,
            })
            .collect(),
        feiertage: days.map(|days| {
            days.iter()
                .map(|day| DayEntry {
                    name: day.name.clone(),
                    datum: day.date,
                    wochentag: String::from(weekday_name(day.date)),
                    typ: day.kind,
                })
                .collect()
        }),
        alle_freien_tage: free_days(periods, days.unwrap_or_default()),
    }
}

/// Expand periods into their weekdays and add the public holidays.
///
/// A public holiday inside school holidays is listed once with both names.
pub fn free_days(periods: &[HolidayPeriod], days: &[HolidayDay]) -> Vec<FreeDayEntry> {
    let mut reasons: BTreeMap<NaiveDate, String> = BTreeMap::new();
    for period in periods {
        for date in period.start.iter_days().take_while(|date| *date <= period.end) {
            if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                reasons.entry(date).or_insert_with(|| period.name.clone());
            }
        }
    }
    for day in days {
        reasons
            .entry(day.date)
            .and_modify(|reason| *reason = format!("{reason} / {}", day.name))
            .or_insert_with(|| day.name.clone());
    }
    reasons
        .into_iter()
        .map(|(date, reason)| FreeDayEntry {
            datum: date,
            wochentag: String::from(weekday_name(date)),
            grund: reason,
        })
        .collect()
}

/// Serialize the document, with dates and timestamps in double quotes so YAML 1.1 readers keep
/// them as strings.
pub fn to_yaml(document: &Document) -> Result<String, ExportError> {
    let yaml = serde_yaml_ng::to_string(document)?;
    let date_scalar = DATE_SCALAR.get_or_init(|| {
        Regex::new(
            r#"(?mx)
                ^(?P<key>[\ ]*(?:-[\ ])?[a-z_]+:[\ ]) # the key, possibly opening a sequence item
                '?
                (?P<date>\d{4}-\d{2}-\d{2}(?:T\d{2}:\d{2}:\d{2})?) # the date with an optional time
                '?$
            "#,
        )
        .unwrap()
    });
    Ok(date_scalar
        .replace_all(&yaml, r#"${key}"${date}""#)
        .into_owned())
}

/// Write the document for a region into `dir` and return the absolute path of the file.
///
/// The file is first written next to the target and then renamed over it.
pub fn write(
    dir: &Path,
    region: Region,
    periods: &[HolidayPeriod],
    days: Option<&[HolidayDay]>,
    generated: NaiveDateTime,
) -> Result<PathBuf, ExportError> {
    fs::create_dir_all(dir).map_err(io_error(dir))?;
    let dir = dir.canonicalize().map_err(io_error(dir))?;
    let path = dir.join(file_name(region));
    let document = document(region, periods, days, generated);
    let yaml = to_yaml(&document)?;
    let temp_path = path.with_extension("yaml.tmp");
    fs::write(&temp_path, yaml).map_err(io_error(&temp_path))?;
    fs::rename(&temp_path, &path).map_err(io_error(&path))?;
    log::info!(
        "wrote {} ({} school holidays, {} public holidays, {} free days)",
        path.display(),
        document.ferien.len(),
        document.feiertage.as_ref().map_or(0, Vec::len),
        document.alle_freien_tage.len(),
    );
    Ok(path)
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ExportError {
    let path = path.to_path_buf();
    move |source| ExportError::Io { path, source }
}

/// Read a document written by [`write`].
pub fn read(path: &Path) -> Result<Document, ExportError> {
    let yaml = fs::read_to_string(path).map_err(io_error(path))?;
    Ok(serde_yaml_ng::from_str(&yaml)?)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::from_str(s).unwrap()
    }

    fn generated() -> NaiveDateTime {
        date("2025-12-01").and_hms_opt(6, 30, 0).unwrap()
    }

    fn get_test_periods() -> Vec<HolidayPeriod> {
        vec![
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
    }

    fn get_test_days() -> Vec<HolidayDay> {
        vec![
            HolidayDay {
                name: String::from("Allerheiligen"),
                date: date("2025-11-01"),
                kind: HolidayKind::Regional,
            },
            HolidayDay {
                name: String::from("1. Weihnachtstag"),
                date: date("2025-12-25"),
                kind: HolidayKind::National,
            },
            HolidayDay {
                name: String::from("Neujahr"),
                date: date("2026-01-01"),
                kind: HolidayKind::National,
            },
        ]
    }

    #[test]
    fn test_free_days() {
        let free_days = free_days(&get_test_periods(), &get_test_days());
        let dates: Vec<String> = free_days
            .iter()
            .map(|entry| entry.datum.to_string())
            .collect();
        assert_eq!(
            dates,
            vec![
                "2025-11-01",
                "2025-11-03",
                "2025-11-04",
                "2025-11-05",
                "2025-11-06",
                "2025-11-07",
                "2025-12-22",
                "2025-12-23",
                "2025-12-24",
                "2025-12-25",
                "2025-12-26",
                "2025-12-29",
                "2025-12-30",
                "2025-12-31",
                "2026-01-01",
                "2026-01-02",
                "2026-01-05",
            ]
        );
        assert_eq!(free_days[0].grund, "Allerheiligen");
        assert_eq!(free_days[0].wochentag, "Samstag");
        assert_eq!(free_days[9].grund, "Weihnachtsferien / 1. Weihnachtstag");
        assert_eq!(free_days[14].grund, "Weihnachtsferien / Neujahr");
        assert_eq!(free_days[16].wochentag, "Montag");
    }

    #[test]
    fn test_to_yaml_quotes_dates_and_keeps_order() {
        let document = document(
            Region::Bayern,
            &get_test_periods(),
            Some(&get_test_days()),
            generated(),
        );
        let yaml = to_yaml(&document).unwrap();
        assert!(yaml.contains(r#"erstellt: "2025-12-01T06:30:00""#));
        assert!(yaml.contains(r#"von: "2025-11-03""#));
        assert!(yaml.contains(r#"datum: "2025-12-25""#));
        assert!(yaml.contains("hinweis: Automatisch generiert – nicht manuell bearbeiten"));
        assert!(yaml.contains("wochentag: Donnerstag"));
        let positions: Vec<usize> = ["info:", "ferien:", "feiertage:", "alle_freien_tage:"]
            .iter()
            .map(|key| yaml.find(key).unwrap())
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(yaml.find("bundesland: BY").unwrap() < yaml.find("erstellt:").unwrap());
    }

    #[test]
    fn test_disabled_days_are_omitted() {
        let document = document(Region::Bayern, &get_test_periods(), None, generated());
        let yaml = to_yaml(&document).unwrap();
        assert!(!yaml.contains("feiertage:"));
        assert_eq!(document.alle_freien_tage.len(), 16);
    }

    #[test]
    fn test_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let periods = get_test_periods();
        let days = get_test_days();
        let path = write(
            &dir.path().join("config"),
            Region::Thueringen,
            &periods,
            Some(&days),
            generated(),
        )
        .unwrap();
        assert!(path.is_absolute());
        assert!(path.ends_with("TH_Ferien.yaml"));
        assert!(!path.with_extension("yaml.tmp").exists());
        let document = read(&path).unwrap();
        assert_eq!(document.info.bundesland, Region::Thueringen);
        let read_periods: Vec<HolidayPeriod> = document
            .ferien
            .iter()
            .map(|entry| HolidayPeriod {
                name: entry.name.clone(),
                start: entry.von,
                end: entry.bis,
            })
            .collect();
        assert_eq!(read_periods, periods);
        let read_days: Vec<HolidayDay> = document
            .feiertage
            .unwrap()
            .iter()
            .map(|entry| HolidayDay {
                name: entry.name.clone(),
                date: entry.datum,
                kind: entry.typ,
            })
            .collect();
        assert_eq!(read_days, days);
    }

    #[test]
    fn test_write_replaces_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let periods = get_test_periods();
        write(dir.path(), Region::Berlin, &periods, None, generated()).unwrap();
        let path = write(dir.path(), Region::Berlin, &periods[..1], None, generated()).unwrap();
        assert_eq!(read(&path).unwrap().ferien.len(), 1);
    }
}
