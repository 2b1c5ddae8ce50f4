use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ferien_core::{
    refresh::{refresh_all, RefreshOutcome},
    region::Region,
};
use serde::Serialize;

use crate::route::{region::RegionDetail, AppState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Completed,
    Coalesced,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub code: Region,
    pub outcome: Outcome,
    pub error: Option<String>,
}

/// Refresh one region now.
///
/// Answers `202 Accepted` if a refresh of the region is already running.
pub async fn region(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Response, (StatusCode, String)> {
    let refresher = state.get(&code)?;
    let outcome = refresher
        .refresh()
        .await
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    let response = match outcome {
        RefreshOutcome::Completed(_) => {
            Json(RegionDetail::from(refresher.as_ref())).into_response()
        }
        RefreshOutcome::Coalesced => (
            StatusCode::ACCEPTED,
            format!("refresh of {} is already running", refresher.region()),
        )
            .into_response(),
    };
    Ok(response)
}

/// Refresh all regions one after another.
pub async fn all(State(state): State<AppState>) -> Json<Vec<RefreshReport>> {
    let reports = refresh_all(&state.refreshers())
        .await
        .into_iter()
        .map(|(code, outcome)| match outcome {
            Ok(RefreshOutcome::Completed(_)) => RefreshReport {
                code,
                outcome: Outcome::Completed,
                error: None,
            },
            Ok(RefreshOutcome::Coalesced) => RefreshReport {
                code,
                outcome: Outcome::Coalesced,
                error: None,
            },
            Err(err) => RefreshReport {
                code,
                outcome: Outcome::Failed,
                error: Some(err.to_string()),
            },
        })
        .collect();
    Json(reports)
}
