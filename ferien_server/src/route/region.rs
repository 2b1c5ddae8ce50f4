use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDateTime;
use ferien_core::{
    refresh::{Freshness, Phase, Refresher, Snapshot},
    region::Region,
};
use serde::Serialize;

use crate::route::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct RegionSummary {
    pub code: Region,
    pub name: &'static str,
    pub freshness: Freshness,
    pub phase: Phase,
    pub last_success: Option<NaiveDateTime>,
    pub last_error: Option<String>,
    pub current_period: Option<String>,
    pub today_is_free: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionDetail {
    #[serde(flatten)]
    pub summary: RegionSummary,
    pub snapshot: Option<Snapshot>,
}

impl From<&Refresher> for RegionSummary {
    fn from(value: &Refresher) -> Self {
        let status = value.status();
        let snapshot = value.snapshot();
        RegionSummary {
            code: value.region(),
            name: value.region().name(),
            freshness: status.freshness(),
            phase: status.phase,
            last_success: status.last_success,
            last_error: status.last_error.clone(),
            current_period: snapshot
                .as_ref()
                .and_then(|snapshot| snapshot.facts.current_period.clone()),
            today_is_free: snapshot
                .as_ref()
                .map_or(false, |snapshot| snapshot.facts.today_is_free),
        }
    }
}

impl From<&Refresher> for RegionDetail {
    fn from(value: &Refresher) -> Self {
        RegionDetail {
            summary: RegionSummary::from(value),
            snapshot: value.snapshot().as_deref().cloned(),
        }
    }
}

/// List all served regions with their refresh status.
pub async fn list(State(state): State<AppState>) -> Json<Vec<RegionSummary>> {
    Json(
        state
            .refreshers()
            .iter()
            .map(|refresher| RegionSummary::from(refresher.as_ref()))
            .collect(),
    )
}

/// The published snapshot of a region.
pub async fn get(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<RegionDetail>, (StatusCode, String)> {
    let refresher = state.get(&code)?;
    Ok(Json(RegionDetail::from(refresher.as_ref())))
}
