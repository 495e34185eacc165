//! Integration tests for flashcards and the SM-2 review endpoint.

mod common;

use common::{TestClient, TestServer};
use serde_json::{Value, json};

async fn create_card(client: &TestClient, front: &str, back: &str) -> Value {
    let resp = client
        .post_json("/api/flashcards", &json!({ "front": front, "back": back }))
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    resp.json().await.unwrap()
}

#[tokio::test]
async fn new_card_is_due_and_perfect_recall_schedules_tomorrow() {
    let server = TestServer::spawn().await.expect("spawn server");
    let client = TestClient::register_and_login(&server.base_url(), "alice")
        .await
        .unwrap();

    let card = create_card(&client, "mitochondria", "powerhouse of the cell").await;
    let id = card["id"].as_i64().unwrap();
    assert_eq!(card["repetition"], 0);
    assert_eq!(card["interval_days"], 0);
    assert!((card["ease_factor"].as_f64().unwrap() - 2.5).abs() < 1e-9);

    let due = client.get_ok("/api/flashcards?due=true").await.unwrap();
    assert_eq!(due.as_array().unwrap().len(), 1);

    let before = chrono_now();
    let resp = client
        .post_json(&format!("/api/flashcards/{id}/review"), &json!({ "quality": 5 }))
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let reviewed: Value = resp.json().await.unwrap();

    assert_eq!(reviewed["repetition"], 1);
    assert_eq!(reviewed["interval_days"], 1);
    assert!((reviewed["ease_factor"].as_f64().unwrap() - 2.6).abs() < 1e-9);

    // due_at is about one day out
    let due_at = reviewed["due_at"].as_i64().unwrap();
    assert!(due_at >= before + 86_000 && due_at <= before + 87_000);

    // No longer in the due queue
    let due = client.get_ok("/api/flashcards?due=true").await.unwrap();
    assert!(due.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn interval_schedule_over_consecutive_reviews() {
    let server = TestServer::spawn().await.expect("spawn server");
    let client = TestClient::register_and_login(&server.base_url(), "bob")
        .await
        .unwrap();

    let card = create_card(&client, "front", "back").await;
    let id = card["id"].as_i64().unwrap();
    let review_path = format!("/api/flashcards/{id}/review");

    let first: Value = client
        .post_json(&review_path, &json!({ "quality": 4 }))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first["interval_days"], 1);

    let second: Value = client
        .post_json(&review_path, &json!({ "quality": 4 }))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second["interval_days"], 6);
    assert_eq!(second["repetition"], 2);

    let third: Value = client
        .post_json(&review_path, &json!({ "quality": 4 }))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let ef = third["ease_factor"].as_f64().unwrap();
    let expected = (6.0 * ef).round() as i64;
    assert_eq!(third["interval_days"].as_i64().unwrap(), expected);
}

#[tokio::test]
async fn failed_recall_resets_card() {
    let server = TestServer::spawn().await.expect("spawn server");
    let client = TestClient::register_and_login(&server.base_url(), "carol")
        .await
        .unwrap();

    let card = create_card(&client, "front", "back").await;
    let id = card["id"].as_i64().unwrap();
    let review_path = format!("/api/flashcards/{id}/review");

    // Build up some history first
    for _ in 0..3 {
        client
            .post_json(&review_path, &json!({ "quality": 5 }))
            .await
            .unwrap();
    }

    let failed: Value = client
        .post_json(&review_path, &json!({ "quality": 1 }))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(failed["repetition"], 0);
    assert_eq!(failed["interval_days"], 0);

    // Due again right now
    let due = client.get_ok("/api/flashcards?due=true").await.unwrap();
    assert_eq!(due.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_quality_rejected() {
    let server = TestServer::spawn().await.expect("spawn server");
    let client = TestClient::register_and_login(&server.base_url(), "dave")
        .await
        .unwrap();

    let card = create_card(&client, "front", "back").await;
    let id = card["id"].as_i64().unwrap();

    let resp = client
        .post_json(&format!("/api/flashcards/{id}/review"), &json!({ "quality": 6 }))
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "validation");
}

#[tokio::test]
async fn review_bumps_subject_progress() {
    let server = TestServer::spawn().await.expect("spawn server");
    let client = TestClient::register_and_login(&server.base_url(), "erin")
        .await
        .unwrap();

    let subject: Value = client
        .post_json("/api/subjects", &json!({ "name": "Anatomy" }))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let subject_id = subject["id"].as_i64().unwrap();

    let resp = client
        .post_json(
            "/api/flashcards",
            &json!({ "front": "femur", "back": "thigh bone", "subject_id": subject_id }),
        )
        .await
        .unwrap();
    let card: Value = resp.json().await.unwrap();
    let id = card["id"].as_i64().unwrap();

    for quality in [5, 4] {
        client
            .post_json(
                &format!("/api/flashcards/{id}/review"),
                &json!({ "quality": quality }),
            )
            .await
            .unwrap();
    }

    let progress = client.get_ok("/api/progress").await.unwrap();
    let progress = progress.as_array().unwrap();
    assert_eq!(progress.len(), 1);
    assert_eq!(progress[0]["subject"], "Anatomy");
    assert_eq!(progress[0]["cards_reviewed"], 2);
}

#[tokio::test]
async fn foreign_card_cannot_be_reviewed() {
    let server = TestServer::spawn().await.expect("spawn server");
    let owner = TestClient::register_and_login(&server.base_url(), "frank")
        .await
        .unwrap();
    let intruder = TestClient::register_and_login(&server.base_url(), "grace")
        .await
        .unwrap();

    let card = create_card(&owner, "front", "back").await;
    let id = card["id"].as_i64().unwrap();

    let resp = intruder
        .post_json(&format!("/api/flashcards/{id}/review"), &json!({ "quality": 5 }))
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

fn chrono_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}
