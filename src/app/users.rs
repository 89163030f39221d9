use serde_json::json;
use warp::filters::BoxedFilter;
use warp::http::header::SET_COOKIE;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection};

use super::{error_page, visitor};
use crate::actions::{self, PlantFilter};
use crate::error::AppError;
use crate::filters::{form_body, with_state, AppState};
use crate::forms::users::{
    Credentials, LoginForm, PasswordChangeFields, PasswordChangeForm, RegisterData, RegisterForm,
};
use crate::forms::{CreateForm, Form, UpdateForm};
use crate::models::{CreatorView, PlantModel, User};
use crate::pages::{redirect, session_cookie, PageContext};

pub fn routes(state: AppState) -> BoxedFilter<(Response,)> {
    let register_page = warp::path!("register")
        .and(warp::get())
        .and(visitor(state.clone()))
        .and_then(register_page);

    let register = warp::path!("register")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(form_body::<RegisterData>())
        .and_then(register);

    let login_page = warp::path!("login")
        .and(warp::get())
        .and(visitor(state.clone()))
        .and_then(login_page);

    let login = warp::path!("login")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(form_body::<Credentials>())
        .and_then(login);

    let logout = warp::path!("logout")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(logout);

    let profile = warp::path!("profile" / String)
        .and(warp::get())
        .and(visitor(state.clone()))
        .and_then(profile);

    let delete_account = warp::path!("profile" / String)
        .and(warp::post())
        .and(visitor(state.clone()))
        .and_then(delete_account);

    let change_password_page = warp::path!("change_password" / String)
        .and(warp::get())
        .and(visitor(state.clone()))
        .and_then(change_password_page);

    let change_password = warp::path!("change_password" / String)
        .and(warp::post())
        .and(visitor(state))
        .and(form_body::<PasswordChangeFields>())
        .and_then(change_password);

    register_page
        .or(register)
        .unify()
        .or(login_page)
        .unify()
        .or(login)
        .unify()
        .or(logout)
        .unify()
        .or(profile)
        .unify()
        .or(delete_account)
        .unify()
        .or(change_password_page)
        .unify()
        .or(change_password)
        .unify()
        .boxed()
}

fn user_not_found() -> AppError {
    AppError::NotFound("User does not exist".to_owned())
}

/// The account at `uid`, provided it belongs to the visitor.
fn own_account(
    conn: &mut diesel::SqliteConnection,
    uid: &str,
    visitor: Option<&User>,
) -> Result<User, AppError> {
    let account = actions::find_user_by_uid(conn, uid)?.ok_or_else(user_not_found)?;
    if visitor.map(|user| user.id.as_str()) != Some(account.id.as_str()) {
        return Err(AppError::forbidden());
    }
    Ok(account)
}

async fn register_page(state: AppState, user: Option<User>) -> Result<Response, Rejection> {
    if user.is_some() {
        return Ok(redirect("/")?);
    }
    Ok(state
        .pages
        .render("users/register", &PageContext::anonymous(), StatusCode::OK)?)
}

async fn register(state: AppState, data: RegisterData) -> Result<Response, Rejection> {
    let email = data.email.clone();
    let form = RegisterForm::new(data, state.hasher);

    match state.db.run(move |conn| form.submit(conn)).await {
        Ok(_) => {
            let context = PageContext::anonymous().message("You can now login into our app");
            Ok(state
                .pages
                .render("users/login", &context, StatusCode::CREATED)?)
        }
        Err(AppError::Validation(errors)) => {
            let context = PageContext::anonymous()
                .errors(errors)
                .with("form", json!({ "email": email }))?;
            Ok(state
                .pages
                .render("users/register", &context, StatusCode::UNPROCESSABLE_ENTITY)?)
        }
        Err(err) => Err(err.into()),
    }
}

async fn login_page(state: AppState, user: Option<User>) -> Result<Response, Rejection> {
    if user.is_some() {
        return Ok(redirect("/")?);
    }
    Ok(state
        .pages
        .render("users/login", &PageContext::anonymous(), StatusCode::OK)?)
}

async fn login(state: AppState, credentials: Credentials) -> Result<Response, Rejection> {
    let email = credentials.email.clone();
    let form = LoginForm::new(credentials);
    let errors = state.db.run(move |conn| form.validate(conn)).await?;

    if !errors.is_empty() {
        let context = PageContext::anonymous()
            .errors(errors)
            .with("form", json!({ "email": email }))?;
        return Ok(state
            .pages
            .render("users/login", &context, StatusCode::UNPROCESSABLE_ENTITY)?);
    }

    let token = state.tokens.encode(&email)?;
    let cookie = session_cookie(&token.access_token, state.tokens.lifetime().as_secs())?;
    let mut response = redirect("/")?;
    response.headers_mut().insert(SET_COOKIE, cookie);
    tracing::debug!(%email, "logged in");
    Ok(response)
}

async fn logout(state: AppState) -> Result<Response, Rejection> {
    let context = PageContext::anonymous().message("You have been logged out successfully");
    Ok(state.pages.render("users/login", &context, StatusCode::OK)?)
}

async fn profile(uid: String, state: AppState, user: Option<User>) -> Result<Response, Rejection> {
    let context = PageContext::new(user.as_ref());
    let found = state
        .db
        .run(move |conn| {
            let Some(account) = actions::find_user_by_uid(conn, &uid)? else {
                return Ok(None);
            };
            let plants = actions::list_plants(conn, PlantFilter::CreatedBy(&account.id))?;
            Ok(Some((account, plants)))
        })
        .await?;
    let Some((account, plants)) = found else {
        return Ok(state.pages.not_found(&context)?);
    };

    let plants: Vec<PlantModel> = plants.into_iter().map(PlantModel::from).collect();
    let context = context
        .with("profile_user", CreatorView::from(&account))?
        .with("days_since_join", account.days_since_join())?
        .with("plants", plants)?;
    Ok(state.pages.render("users/profile", &context, StatusCode::OK)?)
}

async fn delete_account(uid: String, state: AppState, user: Option<User>) -> Result<Response, Rejection> {
    let context = PageContext::new(user.as_ref());
    let images = state.images.clone();
    let deleted = state
        .db
        .run(move |conn| {
            let account = own_account(conn, &uid, user.as_ref())?;
            for path in actions::delete_user(conn, &account.id)? {
                images.discard(&path);
            }
            tracing::info!(user = %account.id, "deleted user");
            Ok(())
        })
        .await;

    match deleted {
        Ok(()) => {
            let context = PageContext::anonymous().message("User has been deleted successfully.");
            Ok(state.pages.render("users/login", &context, StatusCode::OK)?)
        }
        Err(err) => error_page(&state, &context, err),
    }
}

async fn change_password_page(
    uid: String,
    state: AppState,
    user: Option<User>,
) -> Result<Response, Rejection> {
    let context = PageContext::new(user.as_ref());
    let found = state
        .db
        .run(move |conn| own_account(conn, &uid, user.as_ref()))
        .await;

    match found {
        Ok(_) => Ok(state
            .pages
            .render("users/change_password", &context, StatusCode::OK)?),
        Err(err) => error_page(&state, &context, err),
    }
}

async fn change_password(
    uid: String,
    state: AppState,
    user: Option<User>,
    fields: PasswordChangeFields,
) -> Result<Response, Rejection> {
    let context = PageContext::new(user.as_ref());
    let hasher = state.hasher;
    let changed = state
        .db
        .run(move |conn| {
            let account = own_account(conn, &uid, user.as_ref())?;
            PasswordChangeForm::new(fields, account.clone(), hasher).submit(&account, conn)
        })
        .await;

    match changed {
        Ok(()) => {
            let context = context.message("Password has been changed successfully!");
            Ok(state
                .pages
                .render("users/change_password", &context, StatusCode::OK)?)
        }
        Err(AppError::Validation(errors)) => {
            let context = context.errors(errors);
            Ok(state.pages.render(
                "users/change_password",
                &context,
                StatusCode::UNPROCESSABLE_ENTITY,
            )?)
        }
        Err(err) => error_page(&state, &context, err),
    }
}
