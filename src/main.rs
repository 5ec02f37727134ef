use std::sync::Arc;

use log::{info, trace};

mod commands;
mod config;
mod errors;
mod server;
mod services;

pub use errors::{GenericError, NearMeError};

use crate::{
    commands::Toolbox,
    config::Config,
    services::{
        overpass::{OverpassService, TRANSPORT_TIMEOUT},
        search::AmenitySearchEngine,
    },
};

#[tokio::main]
async fn main() -> Result<(), GenericError> {
    env_logger::builder()
        .filter_module("near_me", log::LevelFilter::Debug)
        .parse_default_env()
        .init();
    trace!("Logger init.");

    let config = Config::from_env()?;
    trace!("Read configuration from env.");

    let source = OverpassService::new(&config.overpass_url, TRANSPORT_TIMEOUT)?;
    let engine = AmenitySearchEngine::new(Box::new(source), config.max_results);
    let app = server::router(Arc::new(Toolbox::new(engine, &config)));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!(
        "Starting {} on port {} (backend {}).",
        config.server_id, config.port, config.overpass_url
    );
    axum::serve(listener, app).await?;

    Ok(())
}
