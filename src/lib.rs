pub mod actions;
pub mod api;
pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod forms;
pub mod hashing;
pub mod images;
pub mod models;
pub mod pages;
pub mod schema;
pub mod token;

use std::convert::Infallible;

use warp::{Filter, Reply};

use crate::filters::AppState;

/// Every route of the service: JSON API, HTML pages and uploaded images.
pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let static_files = warp::path("static").and(warp::fs::dir(state.images.root().to_path_buf()));

    api::routes(state.clone())
        .or(app::routes(state))
        .or(static_files)
        .recover(error::handle_rejection)
        .with(warp::log::custom(|info| {
            tracing::info!(
                method = %info.method(),
                path = info.path(),
                status = info.status().as_u16(),
                elapsed = ?info.elapsed(),
                "handled request"
            );
        }))
}
