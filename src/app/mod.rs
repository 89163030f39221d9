//! Server-rendered HTML pages.
//!
//! Visitors are identified by the `access_token` cookie. Handlers render a
//! page for every expected outcome, including the 403 and 404 pages; only
//! internal failures fall through to the JSON rejection handler.

pub mod plants;
pub mod users;

use std::collections::HashMap;

use futures::TryStreamExt;
use serde_json::Value;
use warp::filters::multipart::{FormData, Part};
use warp::filters::BoxedFilter;
use warp::reply::Response;
use warp::{Buf, Filter, Rejection};

use crate::error::AppError;
use crate::filters::{cookie_user, with_state, AppState};
use crate::images::Upload;
use crate::models::{Conditions, User};
use crate::pages::PageContext;

const UPLOAD_LIMIT: u64 = 10 * 1024 * 1024;

/// Name of the file field on plant forms.
const IMAGE_FIELD: &str = "image";

pub fn routes(state: AppState) -> BoxedFilter<(Response,)> {
    plants::routes(state.clone())
        .or(users::routes(state))
        .unify()
        .boxed()
}

/// Shared state together with the user behind the cookie, if any.
fn visitor(
    state: AppState,
) -> impl Filter<Extract = (AppState, Option<User>), Error = Rejection> + Clone {
    with_state(state.clone()).and(cookie_user(state))
}

/// Text fields and the optional image of a multipart form.
#[derive(Debug, Default)]
pub struct Submission {
    pub fields: HashMap<String, String>,
    pub image: Option<Upload>,
}

fn multipart() -> impl Filter<Extract = (Submission,), Error = Rejection> + Clone {
    warp::multipart::form()
        .max_length(UPLOAD_LIMIT)
        .and_then(|form: FormData| async move { collect(form).await.map_err(Rejection::from) })
}

async fn collect(form: FormData) -> Result<Submission, AppError> {
    let submission = form
        .try_fold(Submission::default(), |mut submission, part| async move {
            let name = part.name().to_owned();
            let file_name = part.filename().map(str::to_owned);
            let bytes = read_part(part).await?;

            match file_name {
                Some(file_name) if name == IMAGE_FIELD => {
                    submission.image = Some(Upload { file_name, bytes });
                }
                Some(_) => tracing::debug!(field = %name, "ignored unexpected file field"),
                None => {
                    let value = String::from_utf8_lossy(&bytes).into_owned();
                    submission.fields.insert(name, value);
                }
            }
            Ok(submission)
        })
        .await?;

    Ok(submission)
}

async fn read_part(part: Part) -> Result<Vec<u8>, warp::Error> {
    part.stream()
        .try_fold(Vec::new(), |mut bytes, mut chunk| async move {
            while chunk.has_remaining() {
                let piece = chunk.chunk();
                let len = piece.len();
                bytes.extend_from_slice(piece);
                chunk.advance(len);
            }
            Ok(bytes)
        })
        .await
}

fn conditions() -> Value {
    Value::from(
        Conditions::ALL
            .iter()
            .map(|conditions| conditions.as_str())
            .collect::<Vec<_>>(),
    )
}

/// Renders the 403 and 404 pages for the matching errors.
fn error_page(state: &AppState, context: &PageContext, err: AppError) -> Result<Response, Rejection> {
    match err {
        AppError::NotFound(_) => Ok(state.pages.not_found(context)?),
        AppError::Forbidden(_) | AppError::NotAuthenticated => Ok(state.pages.forbidden(context)?),
        err => Err(err.into()),
    }
}
