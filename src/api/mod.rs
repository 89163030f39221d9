//! JSON API, mounted under `/api`.
//!
//! Registration and login are also reachable without the prefix.

pub mod plants;
pub mod users;

use warp::filters::BoxedFilter;
use warp::reply::Response;
use warp::Filter;

use crate::filters::AppState;

pub fn routes(state: AppState) -> BoxedFilter<(Response,)> {
    let api = warp::path("api").and(
        users::routes(state.clone())
            .or(plants::routes(state.clone()))
            .unify(),
    );

    api.or(users::routes(state)).unify().boxed()
}
