//! Keeps the configured regions up to date and serves them over HTTP.
//!
//! # Environment Variables
//!
//! - `FERIEN_CONFIG`: path of the settings file (default: ferien.toml)
//! - `HOST`: server host (default: 0.0.0.0)
//! - `PORT`: server port (default: 8008)
//! - `RUST_LOG`: log level (default: info)

use std::{env, net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{bail, Result};
use ferien_core::{config::Settings, refresh::Refresher};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

mod route;

#[tokio::main]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_target(true)
        .init();

    let config_path =
        PathBuf::from(env::var("FERIEN_CONFIG").unwrap_or_else(|_| "ferien.toml".to_string()));
    let settings = Settings::load(&config_path)?;
    let source = settings.source()?;

    let mut refreshers = Vec::with_capacity(settings.regions.len());
    for region_settings in &settings.regions {
        let refresher = Arc::new(Refresher::new(
            region_settings,
            &settings,
            Arc::clone(&source),
        ));
        match refresher.first_refresh().await {
            Ok(snapshot) => {
                info!("{} ready, exported to {}", refresher.region(), snapshot.export_path.display());
                refreshers.push(refresher);
            }
            Err(err) => error!("skipping {}, first refresh failed: {err}", refresher.region()),
        }
    }
    if refreshers.is_empty() {
        bail!("no region could be set up");
    }
    for refresher in &refreshers {
        Arc::clone(refresher).spawn_periodic(settings.interval());
    }

    let app = route::create_router(route::AppState::new(refreshers));
    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8008);
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("listening on http://{}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
