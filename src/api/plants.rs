use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::actions::{self, PlantFilter};
use crate::error::AppError;
use crate::filters::{bearer_user, json_body, with_state, AppState};
use crate::forms::plants::{PlantCreateForm, PlantEditForm, PlantInput};
use crate::forms::{CreateForm, UpdateForm};
use crate::models::{Plant, PlantListItem, PlantModel, User};

const PLANT_MISSING: &str = "Plant does not exist";

pub fn routes(state: AppState) -> BoxedFilter<(Response,)> {
    let list = warp::path!("plants")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(list_plants);

    let create = warp::path!("plants")
        .and(warp::post())
        .and(bearer_user(state.clone()))
        .and(json_body::<PlantInput>())
        .and(with_state(state.clone()))
        .and_then(create_plant);

    let details = warp::path!("plants" / String)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(plant_details);

    let edit = warp::path!("plants" / String)
        .and(warp::put())
        .and(bearer_user(state.clone()))
        .and(json_body::<PlantInput>())
        .and(with_state(state.clone()))
        .and_then(edit_plant);

    let delete = warp::path!("plants" / String)
        .and(warp::delete())
        .and(bearer_user(state.clone()))
        .and(with_state(state.clone()))
        .and_then(delete_plant);

    let accept = warp::path!("plants" / String / "accept")
        .and(warp::post())
        .and(bearer_user(state.clone()))
        .and(with_state(state))
        .and_then(accept_plant);

    list.or(create)
        .unify()
        .or(details)
        .unify()
        .or(edit)
        .unify()
        .or(delete)
        .unify()
        .or(accept)
        .unify()
        .boxed()
}

fn missing() -> AppError {
    AppError::NotFound(PLANT_MISSING.to_owned())
}

/// Loads a plant the user may change: 404 when missing, 403 for strangers.
fn editable_plant(
    conn: &mut diesel::SqliteConnection,
    uid: &str,
    user: &User,
) -> Result<Plant, AppError> {
    let plant = actions::find_plant_by_uid(conn, uid)?.ok_or_else(missing)?;
    if !plant.is_editable_by(user) {
        return Err(AppError::forbidden());
    }
    Ok(plant)
}

async fn list_plants(state: AppState) -> Result<Response, Rejection> {
    let plants = state
        .db
        .run(|conn| Ok(actions::list_plants(conn, PlantFilter::Accepted)?))
        .await?;

    let items: Vec<PlantListItem> = plants.into_iter().map(PlantListItem::from).collect();
    Ok(warp::reply::json(&items).into_response())
}

async fn create_plant(user: User, input: PlantInput, state: AppState) -> Result<Response, Rejection> {
    let form = PlantCreateForm::without_image(input.into_data(Some(user), None), state.images.clone());
    let details = state.db.run(move |conn| form.submit(conn)).await?;

    Ok(warp::reply::with_status(
        warp::reply::json(&PlantModel::from(details)),
        StatusCode::CREATED,
    )
    .into_response())
}

async fn plant_details(uid: String, state: AppState) -> Result<Response, Rejection> {
    let details = state
        .db
        .run(move |conn| actions::find_plant_details(conn, &uid)?.ok_or_else(missing))
        .await?;

    Ok(warp::reply::json(&PlantModel::from(details)).into_response())
}

async fn edit_plant(
    uid: String,
    user: User,
    input: PlantInput,
    state: AppState,
) -> Result<Response, Rejection> {
    let images = state.images.clone();
    let details = state
        .db
        .run(move |conn| {
            let plant = editable_plant(conn, &uid, &user)?;
            PlantEditForm::new(input.into_data(Some(user), None), images).submit(&plant, conn)
        })
        .await?;

    Ok(warp::reply::json(&PlantModel::from(details)).into_response())
}

async fn delete_plant(uid: String, user: User, state: AppState) -> Result<Response, Rejection> {
    let images = state.images.clone();
    state
        .db
        .run(move |conn| {
            let plant = editable_plant(conn, &uid, &user)?;
            if let Some(image) = actions::delete_plant(conn, &plant.id)? {
                images.discard(&image.path);
            }
            Ok(())
        })
        .await?;

    Ok(warp::reply::json(&true).into_response())
}

async fn accept_plant(uid: String, user: User, state: AppState) -> Result<Response, Rejection> {
    if !user.is_superuser {
        return Err(AppError::forbidden().into());
    }

    let details = state
        .db
        .run(move |conn| {
            actions::find_plant_by_uid(conn, &uid)?.ok_or_else(missing)?;
            actions::set_plant_accepted(conn, &uid, true)?;
            actions::find_plant_details(conn, &uid)?.ok_or_else(missing)
        })
        .await?;

    tracing::info!(plant = %details.plant.id, by = %user.id, "accepted plant");
    Ok(warp::reply::json(&PlantModel::from(details)).into_response())
}
