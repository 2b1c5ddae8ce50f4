//! The refresh cycle of one region: fetch, reconcile, derive, export, publish.
//!
//! Every successful cycle publishes a new [`Snapshot`] which replaces the previous one as a whole.
//! A failed cycle leaves the last snapshot in place and records the error in the
//! [`RefreshStatus`].

use std::{
    fmt,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use arc_swap::{ArcSwap, ArcSwapOption};
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::Serialize;
use thiserror::Error;
use tokio::{
    task::{JoinError, JoinHandle},
    time::MissedTickBehavior,
};

use crate::{
    config::{RegionSettings, Settings},
    export::{self, ExportError},
    facts::{derive, DerivedFacts},
    holiday_client::{fetch_all, CalendarSource},
    model::{HolidayKinds, ReconciledResult, RequestWindow},
    reconcile::reconcile,
    region::Region,
};

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("cannot compute a request window {0} years ahead")]
    Window(u32),
    #[error("export failed: {0}")]
    Export(#[from] ExportError),
    #[error("export task failed: {0}")]
    Task(#[from] JoinError),
    #[error("another refresh is running")]
    Busy,
}

/// Everything one successful refresh produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub region: Region,
    pub today: NaiveDate,
    pub window: RequestWindow,
    #[serde(flatten)]
    pub result: ReconciledResult,
    #[serde(flatten)]
    pub facts: DerivedFacts,
    pub days_enabled: bool,
    pub export_path: PathBuf,
    pub generated_at: NaiveDateTime,
}

impl Snapshot {
    pub fn is_complete(&self) -> bool {
        self.result.is_complete()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Fetching,
    Reconciling,
    Deriving,
    Exporting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    /// No refresh has succeeded yet.
    NoData,
    Fresh,
    /// The last refresh failed, an older snapshot is still published.
    Stale,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshStatus {
    pub phase: Phase,
    pub last_success: Option<NaiveDateTime>,
    pub last_error: Option<String>,
}

impl RefreshStatus {
    pub fn freshness(&self) -> Freshness {
        match (&self.last_success, &self.last_error) {
            (None, _) => Freshness::NoData,
            (Some(_), None) => Freshness::Fresh,
            (Some(_), Some(_)) => Freshness::Stale,
        }
    }
}

#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    Completed(Arc<Snapshot>),
    /// A refresh was already running, no second one was started.
    Coalesced,
}

/// Releases the in-flight flag when the cycle ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Refresher {
    region: Region,
    kinds: HolidayKinds,
    years_ahead: u32,
    output_dir: PathBuf,
    source: Arc<dyn CalendarSource>,
    snapshot: ArcSwapOption<Snapshot>,
    status: ArcSwap<RefreshStatus>,
    in_flight: AtomicBool,
}

impl fmt::Debug for Refresher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Refresher")
            .field("region", &self.region)
            .field("kinds", &self.kinds)
            .field("years_ahead", &self.years_ahead)
            .field("output_dir", &self.output_dir)
            .field("status", &self.status())
            .field("in_flight", &self.is_refreshing())
            .finish_non_exhaustive()
    }
}

impl Refresher {
    pub fn new(
        region_settings: &RegionSettings,
        settings: &Settings,
        source: Arc<dyn CalendarSource>,
    ) -> Self {
        log::info!(
            "initializing refresher for {} (national={}, regional={})",
            region_settings.code,
            region_settings.national,
            region_settings.regional,
        );
        Refresher {
            region: region_settings.code,
            kinds: region_settings.kinds(),
            years_ahead: settings.years_ahead,
            output_dir: settings.output_dir.clone(),
            source,
            snapshot: ArcSwapOption::empty(),
            status: ArcSwap::from_pointee(RefreshStatus::default()),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn region(&self) -> Region {
        self.region
    }

    /// The last published snapshot.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.load_full()
    }

    pub fn status(&self) -> Arc<RefreshStatus> {
        self.status.load_full()
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// The mandatory first refresh; the region cannot be served if it fails.
    pub async fn first_refresh(&self) -> Result<Arc<Snapshot>, RefreshError> {
        match self.refresh().await? {
            RefreshOutcome::Completed(snapshot) => Ok(snapshot),
            RefreshOutcome::Coalesced => Err(RefreshError::Busy),
        }
    }

    pub async fn refresh(&self) -> Result<RefreshOutcome, RefreshError> {
        self.refresh_on(Local::now().date_naive()).await
    }

    /// Run a cycle as if today was `today`, unless one is already running.
    pub async fn refresh_on(&self, today: NaiveDate) -> Result<RefreshOutcome, RefreshError> {
        let Some(_in_flight) = InFlight::acquire(&self.in_flight) else {
            log::info!("refresh of {} already running, not starting another", self.region);
            return Ok(RefreshOutcome::Coalesced);
        };
        match self.run_cycle(today).await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.snapshot.store(Some(Arc::clone(&snapshot)));
                self.status.store(Arc::new(RefreshStatus {
                    phase: Phase::Idle,
                    last_success: Some(snapshot.generated_at),
                    last_error: None,
                }));
                Ok(RefreshOutcome::Completed(snapshot))
            }
            Err(err) => {
                log::error!("error updating {}: {err}", self.region);
                self.status.rcu(|status| RefreshStatus {
                    phase: Phase::Idle,
                    last_error: Some(err.to_string()),
                    ..RefreshStatus::clone(status)
                });
                Err(err)
            }
        }
    }

    async fn run_cycle(&self, today: NaiveDate) -> Result<Snapshot, RefreshError> {
        self.set_phase(Phase::Fetching);
        let window = RequestWindow::school_years(today, self.years_ahead)
            .ok_or(RefreshError::Window(self.years_ahead))?;
        log::info!(
            "updating {} holidays: {} -> {}",
            self.region,
            window.from,
            window.to
        );
        let (raw_periods, raw_days) =
            fetch_all(self.source.as_ref(), self.region, &window, self.kinds).await;

        self.set_phase(Phase::Reconciling);
        let result = reconcile(&raw_periods, raw_days.as_ref(), &window);
        if !result.missing_years_periods.is_empty() {
            log::warn!(
                "school holidays missing for {}: years {:?} (data up to {})",
                self.region,
                result.missing_years_periods,
                result
                    .last_period_year()
                    .map_or_else(|| String::from("unknown"), |year| year.to_string()),
            );
        }
        if !result.missing_years_days.is_empty() {
            log::warn!(
                "public holidays missing for {}: years {:?}",
                self.region,
                result.missing_years_days
            );
        }

        self.set_phase(Phase::Deriving);
        let facts = derive(&result, today);

        self.set_phase(Phase::Exporting);
        let generated_at = Local::now().naive_local();
        let days_enabled = raw_days.is_some();
        let export_path = {
            let dir = self.output_dir.clone();
            let region = self.region;
            let periods = result.periods.clone();
            let days = days_enabled.then(|| result.days.clone());
            tokio::task::spawn_blocking(move || {
                export::write(&dir, region, &periods, days.as_deref(), generated_at)
            })
            .await??
        };

        log::info!(
            "update complete for {}: {} school holidays, {} public holidays, today free: {}, next: {}, complete: {}",
            self.region,
            result.periods.len(),
            result.days.len(),
            facts.today_is_free,
            facts
                .next_period
                .as_ref()
                .map_or("none", |next| next.name.as_str()),
            result.is_complete(),
        );
        Ok(Snapshot {
            region: self.region,
            today,
            window,
            result,
            facts,
            days_enabled,
            export_path,
            generated_at,
        })
    }

    fn set_phase(&self, phase: Phase) {
        self.status.rcu(|status| RefreshStatus {
            phase,
            ..RefreshStatus::clone(status)
        });
    }

    /// Refresh every `every`, starting one interval from now.
    pub fn spawn_periodic(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;
            loop {
                interval.tick().await;
                // failures are recorded in the status and logged by the cycle
                let _ = self.refresh().await;
            }
        })
    }
}

/// Refresh all regions one after another.
pub async fn refresh_all(
    refreshers: &[Arc<Refresher>],
) -> Vec<(Region, Result<RefreshOutcome, RefreshError>)> {
    let mut outcomes = Vec::with_capacity(refreshers.len());
    for refresher in refreshers {
        outcomes.push((refresher.region(), refresher.refresh().await));
    }
    outcomes
}
