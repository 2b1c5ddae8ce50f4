use axum::{
    extract::{Path, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
};
use ferien_core::{calendar::get_calendar, ical::generator::Emitter};

use crate::route::AppState;

/// Handle calendar requests.
///
/// The calendar is rendered from the last published snapshot of the region.
pub async fn handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Response, (StatusCode, String)> {
    let refresher = state.get(&code)?;
    let snapshot = refresher.snapshot().ok_or_else(|| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("no data for {} yet", refresher.region()),
        )
    })?;
    let ical_calendar = get_calendar(snapshot.region, &snapshot.result, snapshot.generated_at);
    let response = ([(CONTENT_TYPE, "text/calendar")], ical_calendar.generate()).into_response();
    Ok(response)
}
