use std::convert::Infallible;

use serde_json::{json, Value};
use thiserror::Error;
use warp::filters::body::BodyDeserializeError;
use warp::http::StatusCode;
use warp::reject::{MethodNotAllowed, PayloadTooLarge, Reject, UnsupportedMediaType};
use warp::{Rejection, Reply};

pub const NOT_ALLOWED: &str = "You are not allowed to perform this action";
pub const TOKEN_INVALID: &str = "Token is either wrong or expired";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("{0}")]
    NotFound(String),
    #[error("validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("migration error: {0}")]
    Migration(String),
    #[error("password hashing error: {0}")]
    Hashing(#[from] bcrypt::BcryptError),
    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("template error: {0}")]
    Template(#[from] handlebars::RenderError),
    #[error("invalid header value: {0}")]
    Header(#[from] warp::http::header::InvalidHeaderValue),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("upload error: {0}")]
    Upload(#[from] warp::Error),
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Reject for AppError {}

impl AppError {
    pub fn forbidden() -> Self {
        AppError::Forbidden(NOT_ALLOWED.to_owned())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::NotAuthenticated => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing `detail`; internal failures are not described.
    pub fn detail(&self) -> Value {
        match self {
            AppError::Validation(errors) => json!(errors),
            err if err.status().is_server_error() => json!("Internal server error"),
            err => json!(err.to_string()),
        }
    }
}

fn detail_reply(status: StatusCode, detail: Value) -> warp::reply::Response {
    warp::reply::with_status(warp::reply::json(&json!({ "detail": detail })), status)
        .into_response()
}

/// Turns every rejection into a JSON `{"detail": ...}` response.
pub async fn handle_rejection(err: Rejection) -> Result<warp::reply::Response, Infallible> {
    if err.is_not_found() {
        return Ok(detail_reply(StatusCode::NOT_FOUND, json!("Not Found")));
    }

    if let Some(app_err) = err.find::<AppError>() {
        let status = app_err.status();
        if status.is_server_error() {
            tracing::error!(error = %app_err, "request failed");
        } else {
            tracing::debug!(error = %app_err, %status, "request rejected");
        }
        return Ok(detail_reply(status, app_err.detail()));
    }

    if let Some(body_err) = err.find::<BodyDeserializeError>() {
        return Ok(detail_reply(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!([body_err.to_string()]),
        ));
    }

    if err.find::<PayloadTooLarge>().is_some() {
        return Ok(detail_reply(
            StatusCode::PAYLOAD_TOO_LARGE,
            json!("Payload too large"),
        ));
    }

    if err.find::<UnsupportedMediaType>().is_some() {
        return Ok(detail_reply(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            json!("Unsupported media type"),
        ));
    }

    if err.find::<MethodNotAllowed>().is_some() {
        return Ok(detail_reply(
            StatusCode::METHOD_NOT_ALLOWED,
            json!("Method Not Allowed"),
        ));
    }

    tracing::warn!(rejection = ?err, "unhandled rejection");
    Ok(detail_reply(
        StatusCode::BAD_REQUEST,
        json!("Bad request"),
    ))
}
