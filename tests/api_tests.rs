mod common;

use std::sync::Arc;

use common::{MockAuth, MockRepo, admin, bearer, member, profile_for, test_state, trek};
use reqwest::{StatusCode, redirect::Policy};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use trektrail::create_router;

pub struct TestApp {
    pub address: String,
    pub repo: Arc<MockRepo>,
    pub client: reqwest::Client,
}

async fn spawn_app() -> TestApp {
    let repo = Arc::new(MockRepo::with_profiles(vec![
        profile_for(&member()),
        profile_for(&admin()),
    ]));
    let auth = Arc::new(MockAuth::with_account(
        "hiker@trektrail.com",
        "correct-horse",
        member(),
    ));
    let router = create_router(test_state(repo.clone(), auth));

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    // Redirects are part of what is under test.
    let client = reqwest::Client::builder()
        .redirect(Policy::none())
        .build()
        .unwrap();

    TestApp {
        address,
        repo,
        client,
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let response = app
        .client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("req fail");
    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_visitor_journey() {
    let app = spawn_app().await;
    let trek_id = app
        .repo
        .add_trek(trek("Annapurna Circuit", "Annapurna", "hard", "autumn"));

    // Browse the catalogue.
    let treks: Vec<Value> = app
        .client
        .get(format!("{}/treks?difficulty=hard", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(treks.len(), 1);

    // The admin area bounces a signed-out visitor to the login page.
    let response = app
        .client
        .get(format!("{}/admin/dashboard", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers()["location"],
        "/auth/login?redirectTo=/admin/dashboard"
    );

    // Sign in; the session comes back as cookies.
    let response = app
        .client
        .post(format!(
            "{}/auth/login?redirectTo=/admin/dashboard",
            app.address
        ))
        .json(&json!({"email": "hiker@trektrail.com", "password": "correct-horse"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|c| c.starts_with("sb-access-token="))
        .and_then(|c| c.split(';').next())
        .unwrap()
        .to_string();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["redirect_to"], "/admin/dashboard");

    // A regular user following that redirect lands on their own dashboard.
    let response = app
        .client
        .get(format!("{}/admin/dashboard", app.address))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers()["location"], "/users/dashboard");

    // Send an inquiry and a review with the same session.
    let response = app
        .client
        .post(format!("{}/treks/{}/inquiries", app.address, trek_id))
        .header("cookie", &cookie)
        .json(&json!({
            "name": "Pema Sherpa",
            "email": "hiker@trektrail.com",
            "message": "Space for two in October?"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .client
        .post(format!("{}/treks/{}/reviews", app.address, trek_id))
        .header("cookie", &cookie)
        .json(&json!({"rating": 5, "comment": "Thorong La at dawn"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let dashboard: Value = app
        .client
        .get(format!("{}/users/dashboard", app.address))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(dashboard["inquiries"].as_array().map(Vec::len), Some(1));
    assert_eq!(dashboard["reviews"].as_array().map(Vec::len), Some(1));

    let details: Value = app
        .client
        .get(format!("{}/treks/{}", app.address, trek_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(details["reviews"][0]["full_name"], "Pema Sherpa");
}

#[tokio::test]
async fn test_admin_token_reaches_back_office() {
    let app = spawn_app().await;
    let response = app
        .client
        .get(format!("{}/admin/users", app.address))
        .header("authorization", bearer(&admin()))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let users: Vec<Value> = response.json().await.unwrap();
    assert_eq!(users.len(), 2);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = spawn_app().await;
    let doc: Value = app
        .client
        .get(format!("{}/api-docs/openapi.json", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(doc["paths"]["/treks"].is_object());
    assert!(doc["paths"]["/auth/login"].is_object());
}
