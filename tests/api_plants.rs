mod common;

use serde_json::json;
use warp::http::StatusCode;

use common::{json, setup};

fn plant_payload() -> serde_json::Value {
    json!({
        "name": "Some Plant",
        "description": "Some Description about Some Plant",
        "temperature": "low",
        "humidity": "high",
    })
}

#[tokio::test]
async fn list_contains_only_accepted_plants() {
    let app = setup();
    let user = app.user("pytest@auth.com", false).await;
    let accepted = app.plant(&user, "Accepted Plant", true).await;
    app.plant(&user, "Pending Plant", false).await;

    let response = app.request(warp::test::request().path("/api/plants")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json(&response);
    let plants = body.as_array().unwrap();
    assert_eq!(plants.len(), 1);
    assert_eq!(plants[0]["id"], accepted.id.as_str());
    assert_eq!(plants[0]["creator"]["email"], "pytest@auth.com");
    assert!(plants[0].get("description").is_none());
    assert!(plants[0]["image"]["url"]
        .as_str()
        .unwrap()
        .starts_with("/static/plant_images/"));
}

#[tokio::test]
async fn create_requires_authentication() {
    let app = setup();
    let response = app
        .request(
            warp::test::request()
                .method("POST")
                .path("/api/plants")
                .json(&plant_payload()),
        )
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json(&response)["detail"], "Not authenticated");
}

#[tokio::test]
async fn create_returns_pending_plant() {
    let app = setup();
    let user = app.user("pytest@auth.com", false).await;

    let response = app
        .request(
            warp::test::request()
                .method("POST")
                .path("/api/plants")
                .header("authorization", app.bearer(&user))
                .json(&plant_payload()),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json(&response);
    assert_eq!(body["name"], "Some Plant");
    assert_eq!(body["temperature"], "low");
    assert_eq!(body["humidity"], "high");
    assert_eq!(body["is_accepted"], false);
    assert_eq!(body["creator"]["id"], user.id.as_str());
    assert!(body["image"].is_null());
}

#[tokio::test]
async fn create_defaults_conditions_to_average() {
    let app = setup();
    let user = app.user("pytest@auth.com", false).await;

    let response = app
        .request(
            warp::test::request()
                .method("POST")
                .path("/api/plants")
                .header("authorization", app.bearer(&user))
                .json(&json!({"name": "Fern", "description": "Green and happy"})),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json(&response);
    assert_eq!(body["temperature"], "average");
    assert_eq!(body["humidity"], "average");
}

#[tokio::test]
async fn create_with_wrong_values_is_unprocessable() {
    let app = setup();
    let user = app.user("pytest@auth.com", false).await;

    let response = app
        .request(
            warp::test::request()
                .method("POST")
                .path("/api/plants")
                .header("authorization", app.bearer(&user))
                .json(&json!({
                    "name": "",
                    "description": "Some Description",
                    "temperature": "wrong",
                    "humidity": "high",
                })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        json(&response)["detail"],
        json!(["Name cannot be empty", "Wrong temperature value"])
    );
}

#[tokio::test]
async fn details_of_existing_plant() {
    let app = setup();
    let user = app.user("pytest@auth.com", false).await;
    let plant = app.plant(&user, "Some Plant", false).await;

    let response = app
        .request(warp::test::request().path(&format!("/api/plants/{}", plant.id)))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json(&response);
    assert_eq!(body["name"], "Some Plant");
    assert_eq!(body["description"], "Some Description about Some Plant");
    assert_eq!(body["image"]["name"], "plant.jpg");
}

#[tokio::test]
async fn details_of_missing_plant_is_not_found() {
    let app = setup();
    let response = app
        .request(warp::test::request().path("/api/plants/9c3a2d1e-0000-4000-8000-000000000000"))
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json(&response)["detail"], "Plant does not exist");
}

#[tokio::test]
async fn owner_can_edit_plant() {
    let app = setup();
    let user = app.user("pytest@auth.com", false).await;
    let plant = app.plant(&user, "Some Plant", true).await;

    let response = app
        .request(
            warp::test::request()
                .method("PUT")
                .path(&format!("/api/plants/{}", plant.id))
                .header("authorization", app.bearer(&user))
                .json(&json!({
                    "name": "New Plant",
                    "description": "New description",
                    "temperature": "high",
                    "humidity": "low",
                })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json(&response);
    assert_eq!(body["name"], "New Plant");
    assert_eq!(body["temperature"], "high");
    assert_eq!(body["image"]["name"], "plant.jpg");
}

#[tokio::test]
async fn stranger_cannot_edit_plant() {
    let app = setup();
    let owner = app.user("pytest@auth.com", false).await;
    let stranger = app.user("stranger@auth.com", false).await;
    let plant = app.plant(&owner, "Some Plant", true).await;

    let response = app
        .request(
            warp::test::request()
                .method("PUT")
                .path(&format!("/api/plants/{}", plant.id))
                .header("authorization", app.bearer(&stranger))
                .json(&plant_payload()),
        )
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.find_plant(&plant.id).await.unwrap().name, "Some Plant");
}

#[tokio::test]
async fn owner_can_delete_plant() {
    let app = setup();
    let user = app.user("pytest@auth.com", false).await;
    let plant = app.plant(&user, "Some Plant", true).await;
    let (image, file) = app.stored_image(&plant).await;

    let response = app
        .request(
            warp::test::request()
                .method("DELETE")
                .path(&format!("/api/plants/{}", plant.id))
                .header("authorization", app.bearer(&user)),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(&response), json!(true));
    assert!(app.find_plant(&plant.id).await.is_none());
    assert!(app.find_image(&image.id).await.is_none());
    assert!(!file.exists());
}

#[tokio::test]
async fn stranger_cannot_delete_plant() {
    let app = setup();
    let owner = app.user("pytest@auth.com", false).await;
    let stranger = app.user("stranger@auth.com", false).await;
    let plant = app.plant(&owner, "Some Plant", true).await;

    let response = app
        .request(
            warp::test::request()
                .method("DELETE")
                .path(&format!("/api/plants/{}", plant.id))
                .header("authorization", app.bearer(&stranger)),
        )
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        json(&response)["detail"],
        "You are not allowed to perform this action"
    );
    assert!(app.find_plant(&plant.id).await.is_some());
}

#[tokio::test]
async fn superuser_can_delete_any_plant() {
    let app = setup();
    let owner = app.user("pytest@auth.com", false).await;
    let admin = app.user("admin@auth.com", true).await;
    let plant = app.plant(&owner, "Some Plant", true).await;

    let response = app
        .request(
            warp::test::request()
                .method("DELETE")
                .path(&format!("/api/plants/{}", plant.id))
                .header("authorization", app.bearer(&admin)),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.find_plant(&plant.id).await.is_none());
}

#[tokio::test]
async fn deleting_missing_plant_is_not_found() {
    let app = setup();
    let user = app.user("pytest@auth.com", false).await;

    let response = app
        .request(
            warp::test::request()
                .method("DELETE")
                .path("/api/plants/missing")
                .header("authorization", app.bearer(&user)),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_superuser_can_accept_plant() {
    let app = setup();
    let owner = app.user("pytest@auth.com", false).await;
    let admin = app.user("admin@auth.com", true).await;
    let plant = app.plant(&owner, "Some Plant", false).await;
    let path = format!("/api/plants/{}/accept", plant.id);

    let refused = app
        .request(
            warp::test::request()
                .method("POST")
                .path(&path)
                .header("authorization", app.bearer(&owner)),
        )
        .await;
    assert_eq!(refused.status(), StatusCode::FORBIDDEN);

    let accepted = app
        .request(
            warp::test::request()
                .method("POST")
                .path(&path)
                .header("authorization", app.bearer(&admin)),
        )
        .await;
    assert_eq!(accepted.status(), StatusCode::OK);
    assert_eq!(json(&accepted)["is_accepted"], true);
    assert!(app.find_plant(&plant.id).await.unwrap().is_accepted);
}
