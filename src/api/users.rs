use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::actions;
use crate::error::AppError;
use crate::filters::{bearer_token, json_body, with_state, AppState};
use crate::forms::users::{Credentials, CredentialsForm};
use crate::forms::CreateForm;
use crate::hashing::Hasher;

pub fn routes(state: AppState) -> BoxedFilter<(Response,)> {
    let register = warp::path!("users" / "register")
        .and(warp::post())
        .and(json_body::<Credentials>())
        .and(with_state(state.clone()))
        .and_then(register);

    let login = warp::path!("users" / "login")
        .and(warp::post())
        .and(json_body::<Credentials>())
        .and(with_state(state.clone()))
        .and_then(login);

    let refresh = warp::path!("users" / "refresh")
        .and(warp::get())
        .and(bearer_token())
        .and(with_state(state))
        .and_then(refresh);

    register.or(login).unify().or(refresh).unify().boxed()
}

async fn register(credentials: Credentials, state: AppState) -> Result<Response, Rejection> {
    let hasher = state.hasher;
    let user = state
        .db
        .run(move |conn| CredentialsForm::new(credentials, hasher).submit(conn))
        .await?;

    let token = state.tokens.encode(&user.email)?;
    Ok(warp::reply::with_status(warp::reply::json(&token), StatusCode::CREATED).into_response())
}

async fn login(credentials: Credentials, state: AppState) -> Result<Response, Rejection> {
    let email = credentials.email.clone();
    state
        .db
        .run(move |conn| {
            let user = actions::find_user_by_email(conn, &credentials.email)?
                .ok_or_else(|| AppError::Unauthorized("User does not exist".to_owned()))?;
            if Hasher::verify(&credentials.password, &user.hashed_password) {
                Ok(())
            } else {
                Err(AppError::Unauthorized("Wrong email or password".to_owned()))
            }
        })
        .await?;

    tracing::debug!(%email, "issued access token");
    let token = state.tokens.encode(&email)?;
    Ok(warp::reply::json(&token).into_response())
}

async fn refresh(token: String, state: AppState) -> Result<Response, Rejection> {
    let tokens = state.tokens.clone();
    let token = state.db.run(move |conn| tokens.refresh(&token, conn)).await?;
    Ok(warp::reply::json(&token).into_response())
}
