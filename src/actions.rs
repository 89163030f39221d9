use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use crate::models::{self, Conditions, PlantChanges, PlantDetails};
use crate::schema::{images, plants, users};

/// Which plants a listing should contain.
#[derive(Debug, Clone, Copy)]
pub enum PlantFilter<'a> {
    Accepted,
    All,
    CreatedBy(&'a str),
}

fn new_uid() -> String {
    Uuid::new_v4().to_string()
}

/// Run query using Diesel to find user by uid and return it.
pub fn find_user_by_uid(
    conn: &mut SqliteConnection,
    uid: &str,
) -> QueryResult<Option<models::User>> {
    users::table
        .filter(users::id.eq(uid))
        .first::<models::User>(conn)
        .optional()
}

pub fn find_user_by_email(
    conn: &mut SqliteConnection,
    address: &str,
) -> QueryResult<Option<models::User>> {
    users::table
        .filter(users::email.eq(address))
        .first::<models::User>(conn)
        .optional()
}

pub fn insert_new_user(
    conn: &mut SqliteConnection,
    address: &str,
    password_hash: &str,
    superuser: bool,
) -> QueryResult<models::User> {
    let new_user = models::User {
        id: new_uid(),
        email: address.to_owned(),
        hashed_password: password_hash.to_owned(),
        is_superuser: superuser,
        created_at: Utc::now().naive_utc(),
    };

    diesel::insert_into(users::table)
        .values(&new_user)
        .execute(conn)?;

    Ok(new_user)
}

pub fn update_user_password(
    conn: &mut SqliteConnection,
    uid: &str,
    password_hash: &str,
) -> QueryResult<()> {
    diesel::update(users::table.filter(users::id.eq(uid)))
        .set(users::hashed_password.eq(password_hash))
        .execute(conn)?;

    Ok(())
}

/// Creates the superuser account or promotes an existing account with that email.
pub fn upsert_superuser(
    conn: &mut SqliteConnection,
    address: &str,
    password_hash: &str,
) -> QueryResult<models::User> {
    conn.transaction(|conn| match find_user_by_email(conn, address)? {
        Some(user) => {
            diesel::update(&user)
                .set(users::is_superuser.eq(true))
                .execute(conn)?;
            Ok(models::User {
                is_superuser: true,
                ..user
            })
        }
        None => insert_new_user(conn, address, password_hash, true),
    })
}

/// Deletes a user together with their plants and images.
///
/// Returns the storage paths of the removed images so the files can be deleted.
pub fn delete_user(conn: &mut SqliteConnection, uid: &str) -> QueryResult<Vec<String>> {
    conn.transaction(|conn| {
        let owned_images = plants::table
            .inner_join(images::table)
            .filter(plants::creator_id.eq(uid))
            .select((images::id, images::path))
            .load::<(String, String)>(conn)?;

        let (image_ids, paths): (Vec<_>, Vec<_>) = owned_images.into_iter().unzip();

        diesel::delete(plants::table.filter(plants::creator_id.eq(uid))).execute(conn)?;
        diesel::delete(images::table.filter(images::id.eq_any(&image_ids))).execute(conn)?;
        diesel::delete(users::table.filter(users::id.eq(uid))).execute(conn)?;

        Ok(paths)
    })
}

pub fn insert_new_image(
    conn: &mut SqliteConnection,
    file_name: &str,
    storage_path: &str,
) -> QueryResult<models::Image> {
    let new_image = models::Image {
        id: new_uid(),
        name: file_name.to_owned(),
        path: storage_path.to_owned(),
        created_at: Utc::now().naive_utc(),
    };

    diesel::insert_into(images::table)
        .values(&new_image)
        .execute(conn)?;

    Ok(new_image)
}

pub fn find_image_by_uid(
    conn: &mut SqliteConnection,
    uid: &str,
) -> QueryResult<Option<models::Image>> {
    images::table
        .filter(images::id.eq(uid))
        .first::<models::Image>(conn)
        .optional()
}

pub fn delete_image(conn: &mut SqliteConnection, uid: &str) -> QueryResult<()> {
    diesel::delete(images::table.filter(images::id.eq(uid))).execute(conn)?;

    Ok(())
}

/// New plant details.
#[derive(Debug, Clone)]
pub struct NewPlant<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub temperature: Conditions,
    pub humidity: Conditions,
    pub creator_id: &'a str,
    pub image_id: Option<&'a str>,
    pub is_accepted: bool,
}

/// Run query using Diesel to insert a new database row and return the result.
pub fn insert_new_plant(
    conn: &mut SqliteConnection,
    new: NewPlant<'_>,
) -> QueryResult<models::Plant> {
    let new_plant = models::Plant {
        id: new_uid(),
        name: new.name.to_owned(),
        description: new.description.to_owned(),
        temperature: new.temperature,
        humidity: new.humidity,
        is_accepted: new.is_accepted,
        creator_id: new.creator_id.to_owned(),
        image_id: new.image_id.map(str::to_owned),
        created_at: Utc::now().naive_utc(),
    };

    diesel::insert_into(plants::table)
        .values(&new_plant)
        .execute(conn)?;

    Ok(new_plant)
}

/// Run query using Diesel to find plant by uid and return it.
pub fn find_plant_by_uid(
    conn: &mut SqliteConnection,
    uid: &str,
) -> QueryResult<Option<models::Plant>> {
    plants::table
        .filter(plants::id.eq(uid))
        .first::<models::Plant>(conn)
        .optional()
}

/// Finds a plant with its creator and image.
pub fn find_plant_details(
    conn: &mut SqliteConnection,
    uid: &str,
) -> QueryResult<Option<PlantDetails>> {
    let row = plants::table
        .inner_join(users::table)
        .left_join(images::table)
        .filter(plants::id.eq(uid))
        .first::<(models::Plant, models::User, Option<models::Image>)>(conn)
        .optional()?;

    Ok(row.map(PlantDetails::from))
}

pub fn list_plants(
    conn: &mut SqliteConnection,
    filter: PlantFilter<'_>,
) -> QueryResult<Vec<PlantDetails>> {
    let mut query = plants::table
        .inner_join(users::table)
        .left_join(images::table)
        .order(plants::created_at.desc())
        .into_boxed();

    query = match filter {
        PlantFilter::Accepted => query.filter(plants::is_accepted.eq(true)),
        PlantFilter::All => query,
        PlantFilter::CreatedBy(uid) => query.filter(plants::creator_id.eq(uid.to_owned())),
    };

    let rows = query.load::<(models::Plant, models::User, Option<models::Image>)>(conn)?;

    Ok(rows.into_iter().map(PlantDetails::from).collect())
}

pub fn update_plant(
    conn: &mut SqliteConnection,
    uid: &str,
    changes: &PlantChanges,
) -> QueryResult<()> {
    diesel::update(plants::table.filter(plants::id.eq(uid)))
        .set(changes)
        .execute(conn)?;

    Ok(())
}

pub fn set_plant_image(
    conn: &mut SqliteConnection,
    uid: &str,
    image_uid: Option<&str>,
) -> QueryResult<()> {
    diesel::update(plants::table.filter(plants::id.eq(uid)))
        .set(plants::image_id.eq(image_uid))
        .execute(conn)?;

    Ok(())
}

pub fn set_plant_accepted(
    conn: &mut SqliteConnection,
    uid: &str,
    accepted: bool,
) -> QueryResult<()> {
    diesel::update(plants::table.filter(plants::id.eq(uid)))
        .set(plants::is_accepted.eq(accepted))
        .execute(conn)?;

    Ok(())
}

/// Deletes a plant and its image row, returning the removed image.
pub fn delete_plant(
    conn: &mut SqliteConnection,
    uid: &str,
) -> QueryResult<Option<models::Image>> {
    conn.transaction(|conn| {
        let image = plants::table
            .inner_join(images::table)
            .filter(plants::id.eq(uid))
            .select(images::all_columns)
            .first::<models::Image>(conn)
            .optional()?;

        diesel::delete(plants::table.filter(plants::id.eq(uid))).execute(conn)?;
        if let Some(image) = &image {
            delete_image(conn, &image.id)?;
        }

        Ok(image)
    })
}
