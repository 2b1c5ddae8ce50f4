pub mod calendar;
pub mod refresh;
pub mod region;

use std::{collections::BTreeMap, sync::Arc};

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use ferien_core::{refresh::Refresher, region::Region};
use tower_http::trace::TraceLayer;

/// The refreshers of all regions which passed their first refresh.
#[derive(Clone)]
pub struct AppState {
    refreshers: Arc<BTreeMap<Region, Arc<Refresher>>>,
}

impl AppState {
    pub fn new(refreshers: impl IntoIterator<Item = Arc<Refresher>>) -> Self {
        AppState {
            refreshers: Arc::new(
                refreshers
                    .into_iter()
                    .map(|refresher| (refresher.region(), refresher))
                    .collect(),
            ),
        }
    }

    pub fn refreshers(&self) -> Vec<Arc<Refresher>> {
        self.refreshers.values().cloned().collect()
    }

    /// Look up the refresher for a region code from the path.
    pub fn get(&self, code: &str) -> Result<Arc<Refresher>, (StatusCode, String)> {
        let region = code
            .parse::<Region>()
            .map_err(|err| (StatusCode::BAD_REQUEST, err.to_string()))?;
        self.refreshers.get(&region).cloned().ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                format!("region {region} is not configured"),
            )
        })
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/regions", get(region::list))
        .route("/regions/:code", get(region::get))
        .route("/regions/:code/refresh", post(refresh::region))
        .route("/regions/:code/calendar.ics", get(calendar::handler))
        .route("/refresh", post(refresh::all))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
