#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use tempfile::TempDir;
use warp::http::Response;
use warp::hyper::body::Bytes;

use check_my_plants::actions::{self, NewPlant};
use check_my_plants::db::Database;
use check_my_plants::filters::AppState;
use check_my_plants::hashing::Hasher;
use check_my_plants::images::{ImageStore, Upload};
use check_my_plants::models::{Conditions, Image, Plant, User};
use check_my_plants::pages::Pages;
use check_my_plants::token::TokenService;

pub const PASSWORD: &str = "pytest-auth-user";
pub const BOUNDARY: &str = "check-my-plants-boundary";

/// A migrated database and static dir living as long as the test.
pub struct TestApp {
    pub state: AppState,
    _dir: TempDir,
}

pub fn setup() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let database = dir.path().join("plants.db");
    let db = Database::connect(database.to_str().unwrap(), 4).unwrap();
    db.migrate().unwrap();

    let state = AppState {
        db,
        tokens: TokenService::new(b"test-secret", Algorithm::HS256, Duration::from_secs(1800)),
        hasher: Hasher::new(4),
        images: ImageStore::new(dir.path().join("static")),
        pages: Arc::new(Pages::new().unwrap()),
    };

    TestApp { state, _dir: dir }
}

impl TestApp {
    pub async fn request(&self, request: warp::test::RequestBuilder) -> Response<Bytes> {
        request
            .reply(&check_my_plants::routes(self.state.clone()))
            .await
    }

    pub async fn user(&self, email: &str, superuser: bool) -> User {
        let hashed = self.state.hasher.hash(PASSWORD).unwrap();
        let email = email.to_owned();
        self.state
            .db
            .run(move |conn| Ok(actions::insert_new_user(conn, &email, &hashed, superuser)?))
            .await
            .unwrap()
    }

    pub fn bearer(&self, user: &User) -> String {
        format!("Bearer {}", self.state.tokens.encode(&user.email).unwrap().access_token)
    }

    pub fn cookie(&self, user: &User) -> String {
        format!(
            "access_token=\"Bearer {}\"",
            self.state.tokens.encode(&user.email).unwrap().access_token
        )
    }

    /// Inserts a plant with a stored image file.
    pub async fn plant(&self, creator: &User, name: &str, accepted: bool) -> Plant {
        let images = self.state.images.clone();
        let creator_id = creator.id.clone();
        let name = name.to_owned();
        self.state
            .db
            .run(move |conn| {
                let stored = images.write(&Upload {
                    file_name: "plant.jpg".into(),
                    bytes: b"jpeg-bytes".to_vec(),
                })?;
                let image = actions::insert_new_image(conn, &stored.name, &stored.path)?;
                Ok(actions::insert_new_plant(
                    conn,
                    NewPlant {
                        name: &name,
                        description: "Some Description about Some Plant",
                        temperature: Conditions::Low,
                        humidity: Conditions::High,
                        creator_id: &creator_id,
                        image_id: Some(&image.id),
                        is_accepted: accepted,
                    },
                )?)
            })
            .await
            .unwrap()
    }

    pub async fn find_plant(&self, uid: &str) -> Option<Plant> {
        let uid = uid.to_owned();
        self.state
            .db
            .run(move |conn| Ok(actions::find_plant_by_uid(conn, &uid)?))
            .await
            .unwrap()
    }

    pub async fn find_image(&self, uid: &str) -> Option<Image> {
        let uid = uid.to_owned();
        self.state
            .db
            .run(move |conn| Ok(actions::find_image_by_uid(conn, &uid)?))
            .await
            .unwrap()
    }

    /// Image row of `plant` and the location of its file.
    pub async fn stored_image(&self, plant: &Plant) -> (Image, PathBuf) {
        let image = self
            .find_image(plant.image_id.as_deref().unwrap())
            .await
            .unwrap();
        let file = self.state.images.location(&image.path);
        assert!(file.exists());
        (image, file)
    }

    pub async fn find_user(&self, email: &str) -> Option<User> {
        let email = email.to_owned();
        self.state
            .db
            .run(move |conn| Ok(actions::find_user_by_email(conn, &email)?))
            .await
            .unwrap()
    }
}

/// `multipart/form-data` body with text fields and an optional `image` file.
pub fn multipart(fields: &[(&str, &str)], image: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, bytes)) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}

pub fn text(response: &Response<Bytes>) -> String {
    String::from_utf8_lossy(response.body()).into_owned()
}

pub fn json(response: &Response<Bytes>) -> serde_json::Value {
    serde_json::from_slice(response.body()).unwrap()
}

/// Whether the response tells the browser to drop the access token cookie.
pub fn clears_cookie(response: &Response<Bytes>) -> bool {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .any(|value| value.to_str().is_ok_and(|value| value.starts_with("access_token=;")))
}
