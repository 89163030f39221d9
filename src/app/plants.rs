use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection};

use super::{conditions, error_page, multipart, visitor, Submission};
use crate::actions::{self, PlantFilter};
use crate::error::AppError;
use crate::filters::AppState;
use crate::forms::plants::{PlantCreateForm, PlantEditForm, PlantInput};
use crate::forms::{CreateForm, UpdateForm};
use crate::models::{Conditions, PlantDetails, PlantModel, User};
use crate::pages::{redirect, PageContext};

pub fn routes(state: AppState) -> BoxedFilter<(Response,)> {
    let dashboard = warp::path::end()
        .and(warp::get())
        .and(visitor(state.clone()))
        .and_then(dashboard);

    let details = warp::path!("plants" / String)
        .and(warp::get())
        .and(visitor(state.clone()))
        .and_then(details);

    let create_page = warp::path!("plant" / "create")
        .and(warp::get())
        .and(visitor(state.clone()))
        .and_then(create_page);

    let create = warp::path!("plant" / "create")
        .and(warp::post())
        .and(visitor(state.clone()))
        .and(multipart())
        .and_then(create);

    let edit_page = warp::path!("plant" / "edit" / String)
        .and(warp::get())
        .and(visitor(state.clone()))
        .and_then(edit_page);

    let edit = warp::path!("plant" / "edit" / String)
        .and(warp::post())
        .and(visitor(state.clone()))
        .and(multipart())
        .and_then(edit);

    let delete = warp::path!("plant" / "delete" / String)
        .and(warp::post())
        .and(visitor(state))
        .and_then(delete);

    dashboard
        .or(details)
        .unify()
        .or(create_page)
        .unify()
        .or(create)
        .unify()
        .or(edit_page)
        .unify()
        .or(edit)
        .unify()
        .or(delete)
        .unify()
        .boxed()
}

fn plant_not_found() -> AppError {
    AppError::NotFound("Plant does not exist".to_owned())
}

/// Accepted plants; superusers also see the ones waiting for acceptance.
async fn dashboard_page(
    state: &AppState,
    user: Option<User>,
    message: Option<&str>,
) -> Result<Response, AppError> {
    let filter = match &user {
        Some(user) if user.is_superuser => PlantFilter::All,
        _ => PlantFilter::Accepted,
    };
    let plants = state
        .db
        .run(move |conn| Ok(actions::list_plants(conn, filter)?))
        .await?;
    let plants: Vec<PlantModel> = plants.into_iter().map(PlantModel::from).collect();

    let mut context = PageContext::new(user.as_ref()).with("plants", plants)?;
    if let Some(message) = message {
        context = context.message(message);
    }
    state
        .pages
        .render("plants/dashboard", &context, StatusCode::OK)
}

async fn dashboard(state: AppState, user: Option<User>) -> Result<Response, Rejection> {
    Ok(dashboard_page(&state, user, None).await?)
}

async fn details(uid: String, state: AppState, user: Option<User>) -> Result<Response, Rejection> {
    let context = PageContext::new(user.as_ref());
    let found = state
        .db
        .run(move |conn| Ok(actions::find_plant_details(conn, &uid)?))
        .await?;
    let Some(details) = found else {
        return Ok(state.pages.not_found(&context)?);
    };

    let editable = user
        .as_ref()
        .is_some_and(|user| details.plant.is_editable_by(user));
    let context = context
        .with("plant", PlantModel::from(details))?
        .with("editable", editable)?;
    Ok(state.pages.render("plants/details", &context, StatusCode::OK)?)
}

async fn create_page(state: AppState, user: Option<User>) -> Result<Response, Rejection> {
    let context = PageContext::new(user.as_ref()).with("conditions", conditions())?;
    if user.is_none() {
        return Ok(state.pages.forbidden(&context)?);
    }

    let defaults = PlantInput {
        temperature: Some(Conditions::default().to_string()),
        humidity: Some(Conditions::default().to_string()),
        ..PlantInput::default()
    };
    let context = context.with("form", defaults)?;
    Ok(state.pages.render("plants/create", &context, StatusCode::OK)?)
}

async fn create(
    state: AppState,
    user: Option<User>,
    submission: Submission,
) -> Result<Response, Rejection> {
    let context = PageContext::new(user.as_ref()).with("conditions", conditions())?;
    if user.is_none() {
        return Ok(state.pages.forbidden(&context)?);
    }

    let input = PlantInput::from_fields(submission.fields);
    let submitted = input.clone();
    let form = PlantCreateForm::with_image(
        input.into_data(user, submission.image),
        state.images.clone(),
    );

    match state.db.run(move |conn| form.submit(conn)).await {
        Ok(details) => Ok(redirect(&format!("/plants/{}", details.plant.id))?),
        Err(AppError::Validation(errors)) => {
            let context = context.errors(errors).with("form", submitted)?;
            Ok(state
                .pages
                .render("plants/create", &context, StatusCode::UNPROCESSABLE_ENTITY)?)
        }
        Err(err) => error_page(&state, &context, err),
    }
}

/// Plant details, provided `user` may change the plant.
fn editable_details(
    conn: &mut diesel::SqliteConnection,
    uid: &str,
    user: Option<&User>,
) -> Result<PlantDetails, AppError> {
    let details = actions::find_plant_details(conn, uid)?.ok_or_else(plant_not_found)?;
    if !user.is_some_and(|user| details.plant.is_editable_by(user)) {
        return Err(AppError::forbidden());
    }
    Ok(details)
}

async fn edit_page(uid: String, state: AppState, user: Option<User>) -> Result<Response, Rejection> {
    let context = PageContext::new(user.as_ref()).with("conditions", conditions())?;
    let visitor = user.clone();
    let found = state
        .db
        .run(move |conn| editable_details(conn, &uid, visitor.as_ref()))
        .await;

    match found {
        Ok(details) => {
            let context = context.with("plant", PlantModel::from(details))?;
            Ok(state.pages.render("plants/edit", &context, StatusCode::OK)?)
        }
        Err(err) => error_page(&state, &context, err),
    }
}

enum EditOutcome {
    Saved(PlantDetails),
    Rejected(Vec<String>, PlantDetails),
}

async fn edit(
    uid: String,
    state: AppState,
    user: Option<User>,
    submission: Submission,
) -> Result<Response, Rejection> {
    let context = PageContext::new(user.as_ref()).with("conditions", conditions())?;
    let images = state.images.clone();
    let data = PlantInput::from_fields(submission.fields).into_data(user, submission.image);

    let outcome = state
        .db
        .run(move |conn| {
            let current = editable_details(conn, &uid, data.creator.as_ref())?;
            match PlantEditForm::new(data, images).submit(&current.plant, conn) {
                Ok(details) => Ok(EditOutcome::Saved(details)),
                Err(AppError::Validation(errors)) => Ok(EditOutcome::Rejected(errors, current)),
                Err(err) => Err(err),
            }
        })
        .await;

    match outcome {
        Ok(EditOutcome::Saved(details)) => {
            let context = context
                .message("Plant has been edited successfully")
                .with("plant", PlantModel::from(details))?;
            Ok(state.pages.render("plants/edit", &context, StatusCode::OK)?)
        }
        Ok(EditOutcome::Rejected(errors, current)) => {
            let context = context
                .errors(errors)
                .with("plant", PlantModel::from(current))?;
            Ok(state
                .pages
                .render("plants/edit", &context, StatusCode::UNPROCESSABLE_ENTITY)?)
        }
        Err(err) => error_page(&state, &context, err),
    }
}

async fn delete(uid: String, state: AppState, user: Option<User>) -> Result<Response, Rejection> {
    let context = PageContext::new(user.as_ref());
    let images = state.images.clone();
    let visitor = user.clone();
    let deleted = state
        .db
        .run(move |conn| {
            let details = editable_details(conn, &uid, visitor.as_ref())?;
            if let Some(image) = actions::delete_plant(conn, &details.plant.id)? {
                images.discard(&image.path);
            }
            tracing::info!(plant = %details.plant.id, "deleted plant");
            Ok(())
        })
        .await;

    match deleted {
        Ok(()) => Ok(dashboard_page(&state, user, Some("Plant has been deleted successfully")).await?),
        Err(err) => error_page(&state, &context, err),
    }
}
