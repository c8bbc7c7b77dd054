// tests/admin_tests.rs

use std::{collections::HashMap, sync::Arc};

use placement_engine::{
    PlacementService, config::Config, routes, state::AppState, store::MemoryStore,
    utils::jwt::sign_jwt,
};
use serde_json::{Value, json};

const SECRET: &str = "admin_test_secret";

async fn spawn_app() -> String {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("JWT_SECRET", SECRET),
        ("PLACEMENT_EASY_COUNT", "5"),
        ("PLACEMENT_MEDIUM_COUNT", "0"),
        ("PLACEMENT_HARD_COUNT", "0"),
    ]);
    let config = Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
        .expect("Failed to build test configuration");

    let service = PlacementService::new(Arc::new(MemoryStore::new()), config.placement.clone());
    let app = routes::create_router(AppState { service, config });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let address = format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

fn admin() -> String {
    sign_jwt(1, "admin", SECRET, 600).unwrap()
}

fn user(id: i64) -> String {
    sign_jwt(id, "user", SECRET, 600).unwrap()
}

fn choice_question(category: &str) -> Value {
    json!({
        "questionType": "definition-choice",
        "prompt": "What is a primary key?",
        "category": category,
        "difficulty": "easy",
        "points": 2,
        "timeAllocation": 30,
        "skillsTested": ["definition"],
        "options": [
            {"label": "A", "text": "A unique row identifier"},
            {"label": "B", "text": "An encryption key"}
        ],
        "correctAnswer": "A"
    })
}

async fn create(client: &reqwest::Client, address: &str, body: &Value) -> reqwest::Response {
    client
        .post(format!("{}/api/admin/questions", address))
        .bearer_auth(admin())
        .json(body)
        .send()
        .await
        .expect("Failed to execute request")
}

#[tokio::test]
async fn non_admin_cannot_manage_questions() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/admin/questions", address))
        .bearer_auth(user(5))
        .json(&choice_question("database"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn question_crud() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Create
    let response = create(&client, &address, &choice_question("database")).await;
    assert_eq!(response.status().as_u16(), 201);
    let created: Value = response.json().await.unwrap();
    let id = created["id"].as_i64().unwrap();
    assert_eq!(created["questionType"], "definition-choice");
    assert_eq!(created["correctAnswer"], "A");
    assert_eq!(created["isActive"], true);

    // Update
    let mut body = choice_question("security");
    body["isActive"] = json!(false);
    let response = client
        .put(format!("{}/api/admin/questions/{}", address, id))
        .bearer_auth(admin())
        .json(&body)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["category"], "security");
    assert_eq!(updated["isActive"], false);

    // List with filter
    let page: Value = client
        .get(format!("{}/api/admin/questions?category=security&isActive=false", address))
        .bearer_auth(admin())
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["id"], id);

    // Delete
    let response = client
        .delete(format!("{}/api/admin/questions/{}", address, id))
        .bearer_auth(admin())
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 204);

    let response = client
        .get(format!("{}/api/admin/questions/{}", address, id))
        .bearer_auth(admin())
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn inconsistent_answer_key_is_rejected() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let mut body = choice_question("database");
    body["correctAnswer"] = json!("Z");
    let response = create(&client, &address, &body).await;
    assert_eq!(response.status().as_u16(), 400);
    let error: Value = response.json().await.unwrap();
    assert!(error["fields"].get("kind").is_some());

    let matching = json!({
        "questionType": "acronym-matching",
        "prompt": "Match each acronym",
        "category": "networking",
        "difficulty": "medium",
        "points": 3,
        "timeAllocation": 60,
        "leftColumn": [{"id": "1", "text": "TCP"}, {"id": "2", "text": "DNS"}],
        "rightColumn": [{"id": "a", "text": "Transmission Control Protocol"}],
        "correctMatches": [{"leftId": "1", "rightId": "a"}, {"leftId": "2", "rightId": "b"}]
    });
    let response = create(&client, &address, &matching).await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn retake_resets_placement_and_statistics_track_sessions() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    for category in ["programming", "database", "networking", "security", "algorithms"] {
        assert_eq!(create(&client, &address, &choice_question(category)).await.status().as_u16(), 201);
    }
    let taker = user(42);

    // Complete one perfect session
    let started: Value = client
        .post(format!("{}/api/placement/sessions", address))
        .bearer_auth(&taker)
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    let session_id = started["sessionId"].as_i64().unwrap();
    for q in started["questions"].as_array().unwrap() {
        client
            .post(format!("{}/api/placement/sessions/{}/answers", address, session_id))
            .bearer_auth(&taker)
            .json(&json!({ "questionId": q["id"], "answer": "A" }))
            .send()
            .await
            .expect("Failed to execute request");
    }
    let completed = client
        .post(format!("{}/api/placement/sessions/{}/complete", address, session_id))
        .bearer_auth(&taker)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(completed.status().as_u16(), 200);

    let stats: Value = client
        .get(format!("{}/api/admin/statistics", address))
        .bearer_auth(admin())
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    assert_eq!(stats["completedSessions"], 1);
    assert_eq!(stats["averageScore"], 100.0);
    assert_eq!(stats["levelDistribution"]["advanced"], 1);

    // Retake twice: second call is a no-op
    for expected in [1, 0] {
        let body: Value = client
            .post(format!("{}/api/admin/users/42/retake", address))
            .bearer_auth(admin())
            .send()
            .await
            .expect("Failed to execute request")
            .json()
            .await
            .unwrap();
        assert_eq!(body["abandonedSessions"], expected);
    }

    let placement: Value = client
        .get(format!("{}/api/placement/me", address))
        .bearer_auth(&taker)
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    assert_eq!(placement["placementTestCompleted"], false);
    assert!(placement["assignedLevel"].is_null());

    // The old session still exists, now abandoned
    let old: Value = client
        .get(format!("{}/api/placement/sessions/{}", address, session_id))
        .bearer_auth(&taker)
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    assert_eq!(old["status"], "abandoned");
    assert_eq!(old["percentageScore"], 100);
}
