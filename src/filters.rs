use std::convert::Infallible;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use warp::{Filter, Rejection};

use crate::db::Database;
use crate::error::{AppError, TOKEN_INVALID};
use crate::hashing::Hasher;
use crate::images::ImageStore;
use crate::models::User;
use crate::pages::Pages;
use crate::token::{bearer_credentials, user_from_claims, TokenService};

pub const COOKIE_NAME: &str = "access_token";

const BODY_LIMIT: u64 = 16 * 1024;

/// Everything a handler needs, cloned into each request.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub tokens: TokenService,
    pub hasher: Hasher,
    pub images: ImageStore,
    pub pages: Arc<Pages>,
}

pub fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

pub fn json_body<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(BODY_LIMIT).and(warp::body::json())
}

pub fn form_body<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(BODY_LIMIT).and(warp::body::form())
}

/// Raw token from an `Authorization: Bearer ...` header; 403 when absent.
pub fn bearer_token() -> impl Filter<Extract = (String,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(|header: Option<String>| async move {
        header
            .as_deref()
            .and_then(bearer_credentials)
            .map(str::to_owned)
            .ok_or_else(|| Rejection::from(AppError::NotAuthenticated))
    })
}

/// User named by a valid bearer token.
pub fn bearer_user(state: AppState) -> impl Filter<Extract = (User,), Error = Rejection> + Clone {
    bearer_token()
        .and(with_state(state))
        .and_then(|token: String, state: AppState| async move {
            let claims = state
                .tokens
                .decode(&token)
                .ok_or_else(|| AppError::Unauthorized(TOKEN_INVALID.to_owned()))?;
            let user = state.db.run(move |conn| user_from_claims(conn, &claims)).await?;
            Ok::<_, Rejection>(user)
        })
}

/// User from the `access_token` cookie; a missing or stale cookie is anonymous.
pub fn cookie_user(state: AppState) -> impl Filter<Extract = (Option<User>,), Error = Rejection> + Clone {
    warp::cookie::optional::<String>(COOKIE_NAME)
        .and(with_state(state))
        .and_then(|cookie: Option<String>, state: AppState| async move {
            let Some(claims) = cookie
                .as_deref()
                .and_then(bearer_credentials)
                .and_then(|token| state.tokens.decode(token))
            else {
                return Ok::<_, Rejection>(None);
            };
            let user = state
                .db
                .run(move |conn| Ok(crate::actions::find_user_by_email(conn, &claims.email)?))
                .await?;
            Ok(user)
        })
}
