// tests/api_tests.rs

use chrono::{Duration, Utc};
use quiz_backend::{
    config::{Config, QuizPolicy},
    routes,
    state::AppState,
};
use reqwest::Client;
use serde_json::{Value, json};

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app() -> String {
    // 1. Create test configuration and an in-memory state
    let config = Config {
        database_url: None,
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        cors_origin: "http://localhost:3000".to_string(),
        password_min_length: 6,
        quiz: QuizPolicy::default(),
    };
    let state = AppState::in_memory(config);

    // 2. Create the router with the app state
    let app = routes::create_router(state);

    // 3. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // 4. Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

async fn register(client: &Client, address: &str, username: &str) -> Value {
    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": "passw0rd1",
            "first_name": "Test",
            "last_name": username,
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 201);
    response.json().await.unwrap()
}

async fn login(client: &Client, address: &str, username: &str) -> String {
    let response = client
        .post(format!("{}/api/auth/login", address))
        .json(&json!({ "username": username, "password": "passw0rd1" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    body["token"].as_str().unwrap().to_string()
}

struct Classroom {
    professor_token: String,
    quiz_id: i64,
    class_code: String,
    true_option: i64,
    question_id: i64,
}

/// Admin promotes a professor, who builds an active one-question quiz.
async fn classroom(client: &Client, address: &str) -> Classroom {
    register(client, address, "admin").await;
    let prof = register(client, address, "prof").await;
    let admin_token = login(client, address, "admin").await;

    let response = client
        .put(format!("{}/api/admin/users/{}/role", address, prof["id"]))
        .bearer_auth(&admin_token)
        .json(&json!({ "role": "professor" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let professor_token = login(client, address, "prof").await;
    let class: Value = client
        .post(format!("{}/api/classes", address))
        .bearer_auth(&professor_token)
        .json(&json!({ "name": "Logic 101" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let quiz: Value = client
        .post(format!("{}/api/classes/{}/quizzes", address, class["id"]))
        .bearer_auth(&professor_token)
        .json(&json!({
            "title": "Week 1",
            "deadline": (Utc::now() + Duration::days(1)).to_rfc3339(),
            "time_limit_minutes": 10,
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let quiz_id = quiz["id"].as_i64().unwrap();

    let question: Value = client
        .post(format!("{}/api/quizzes/{}/questions", address, quiz_id))
        .bearer_auth(&professor_token)
        .json(&json!({
            "question_text": "2 + 2 = 4",
            "question_type": "true_false",
            "options": [
                { "option_text": "True", "is_correct": true },
                { "option_text": "False", "is_correct": false }
            ]
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let true_option = question["options"]
        .as_array()
        .unwrap()
        .iter()
        .find(|o| o["is_correct"] == true)
        .and_then(|o| o["id"].as_i64())
        .unwrap();

    let response = client
        .post(format!("{}/api/quizzes/{}/activate", address, quiz_id))
        .bearer_auth(&professor_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    Classroom {
        professor_token,
        quiz_id,
        class_code: class["class_code"].as_str().unwrap().to_string(),
        true_option,
        question_id: question["id"].as_i64().unwrap(),
    }
}

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let address = spawn_app().await;
    let client = Client::new();

    // Act
    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn first_user_is_admin_second_is_student() {
    let address = spawn_app().await;
    let client = Client::new();

    let first = register(&client, &address, "alice").await;
    let second = register(&client, &address, "bob").await;

    assert_eq!(first["role"], "admin");
    assert_eq!(second["role"], "student");
    assert!(first.get("password_hash").is_none());
}

#[tokio::test]
async fn duplicate_username_conflicts() {
    let address = spawn_app().await;
    let client = Client::new();
    register(&client, &address, "alice").await;

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&json!({
            "username": "Alice",
            "email": "other@example.com",
            "password": "passw0rd1",
            "first_name": "A",
            "last_name": "B",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn protected_routes_need_a_token() {
    let address = spawn_app().await;
    let client = Client::new();

    let response = client
        .get(format!("{}/api/auth/me", address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    register(&client, &address, "alice").await;
    let token = login(&client, &address, "alice").await;
    let me: Value = client
        .get(format!("{}/api/auth/me", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["username"], "alice");
    assert!(me["last_login"].is_string());
}

#[tokio::test]
async fn students_cannot_reach_admin_routes() {
    let address = spawn_app().await;
    let client = Client::new();
    register(&client, &address, "admin").await;
    register(&client, &address, "student").await;
    let token = login(&client, &address, "student").await;

    let response = client
        .get(format!("{}/api/admin/users", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "forbidden");
}

#[tokio::test]
async fn non_enrolled_student_is_not_eligible() {
    let address = spawn_app().await;
    let client = Client::new();
    let room = classroom(&client, &address).await;

    register(&client, &address, "student").await;
    let token = login(&client, &address, "student").await;

    let response = client
        .post(format!("{}/api/quizzes/{}/start", address, room.quiz_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 422);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "not_eligible");
}

#[tokio::test]
async fn student_takes_a_quiz_end_to_end() {
    let address = spawn_app().await;
    let client = Client::new();
    let room = classroom(&client, &address).await;

    register(&client, &address, "student").await;
    let token = login(&client, &address, "student").await;

    let response = client
        .post(format!("{}/api/classes/enroll", address))
        .bearer_auth(&token)
        .json(&json!({ "class_code": room.class_code.to_lowercase() }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    // The student view must not leak the answer key.
    let view = client
        .get(format!("{}/api/quizzes/{}", address, room.quiz_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(view.contains("2 + 2 = 4"));
    assert!(!view.contains("is_correct"));

    let response = client
        .post(format!("{}/api/quizzes/{}/start", address, room.quiz_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let started: Value = response.json().await.unwrap();
    let submission_id = started["id"].as_i64().unwrap();
    assert_eq!(started["max_score"], 1);

    let response = client
        .post(format!("{}/api/quizzes/{}/start", address, room.quiz_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let resumed: Value = response.json().await.unwrap();
    assert_eq!(resumed["id"], submission_id);

    let response = client
        .put(format!(
            "{}/api/submissions/{}/answers/{}",
            address, submission_id, room.question_id
        ))
        .bearer_auth(&token)
        .json(&json!({ "selected_option_ids": [room.true_option] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let response = client
        .post(format!("{}/api/submissions/{}/complete", address, submission_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let done: Value = response.json().await.unwrap();
    assert_eq!(done["total_score"], 1);
    assert_eq!(done["is_completed"], true);

    let response = client
        .post(format!("{}/api/submissions/{}/complete", address, submission_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);
    let again: Value = response.json().await.unwrap();
    assert_eq!(again["code"], "already_completed");
    assert_eq!(again["submission"]["submitted_at"], done["submitted_at"]);

    let summary: Value = client
        .get(format!("{}/api/quizzes/{}/results", address, room.quiz_id))
        .bearer_auth(&room.professor_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["completed_count"], 1);
    assert_eq!(summary["mean_percentage"], 100.0);
}

#[tokio::test]
async fn profile_and_dashboard_routes() {
    let address = spawn_app().await;
    let client = Client::new();
    register(&client, &address, "admin").await;
    register(&client, &address, "student").await;
    let admin_token = login(&client, &address, "admin").await;
    let student_token = login(&client, &address, "student").await;

    let profile = |email: &str| {
        json!({ "first_name": "Stu", "last_name": "Dent", "email": email })
    };
    let response = client
        .put(format!("{}/api/auth/profile", address))
        .bearer_auth(&student_token)
        .json(&profile("admin@example.com"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    let response = client
        .put(format!("{}/api/auth/profile", address))
        .bearer_auth(&student_token)
        .json(&profile("Stu@Example.com"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["email"], "stu@example.com");

    let response = client
        .get(format!("{}/api/admin/dashboard", address))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let board: Value = response.json().await.unwrap();
    assert_eq!(board["stats"]["total_users"], 2);
    assert_eq!(board["stats"]["active_last_week"], 2);

    let professors: Value = client
        .get(format!("{}/api/admin/users/professors", address))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(professors.as_array().map(Vec::len), Some(0));

    let response = client
        .get(format!("{}/api/admin/dashboard", address))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
}
