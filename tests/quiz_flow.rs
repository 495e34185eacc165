//! Integration tests for practice questions, quiz building and grading.

mod common;

use common::{TestClient, TestServer};
use serde_json::{Value, json};

async fn seed_questions(client: &TestClient, subject_id: i64, count: usize) -> Vec<i64> {
    let mut ids = Vec::new();
    for i in 0..count {
        let resp = client
            .post_json(
                "/api/questions",
                &json!({
                    "prompt": format!("Question {i}?"),
                    "options": ["wrong", "right", "also wrong"],
                    "correct_index": 1,
                    "subject_id": subject_id,
                }),
            )
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 201);
        let question: Value = resp.json().await.unwrap();
        ids.push(question["id"].as_i64().unwrap());
    }
    ids
}

#[tokio::test]
async fn question_validation() {
    let server = TestServer::spawn().await.expect("spawn server");
    let client = TestClient::register_and_login(&server.base_url(), "alice")
        .await
        .unwrap();

    // Too few options
    let resp = client
        .post_json(
            "/api/questions",
            &json!({ "prompt": "?", "options": ["only one"], "correct_index": 0 }),
        )
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);

    // correct_index out of range
    let resp = client
        .post_json(
            "/api/questions",
            &json!({ "prompt": "?", "options": ["a", "b"], "correct_index": 2 }),
        )
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
}

#[tokio::test]
async fn quiz_payload_withholds_answers() {
    let server = TestServer::spawn().await.expect("spawn server");
    let client = TestClient::register_and_login(&server.base_url(), "bob")
        .await
        .unwrap();

    let subject: Value = client
        .post_json("/api/subjects", &json!({ "name": "Geography" }))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let subject_id = subject["id"].as_i64().unwrap();
    seed_questions(&client, subject_id, 8).await;

    let quiz = client
        .get_ok(&format!("/api/quiz?subject={subject_id}&count=5"))
        .await
        .unwrap();
    let quiz = quiz.as_array().unwrap();
    assert_eq!(quiz.len(), 5);

    for question in quiz {
        assert!(question.get("correct_index").is_none());
        assert!(question["options"].as_array().unwrap().len() >= 2);
    }
}

#[tokio::test]
async fn grading_and_attempt_history() {
    let server = TestServer::spawn().await.expect("spawn server");
    let client = TestClient::register_and_login(&server.base_url(), "carol")
        .await
        .unwrap();

    let subject: Value = client
        .post_json("/api/subjects", &json!({ "name": "History" }))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let subject_id = subject["id"].as_i64().unwrap();
    let ids = seed_questions(&client, subject_id, 4).await;

    // Two right (choice 1), two wrong
    let answers: Vec<Value> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| json!({ "question_id": id, "choice": if i < 2 { 1 } else { 0 } }))
        .collect();

    let resp = client
        .post_json(
            "/api/quiz",
            &json!({ "subject_id": subject_id, "answers": answers }),
        )
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let result: Value = resp.json().await.unwrap();

    assert_eq!(result["total"], 4);
    assert_eq!(result["correct"], 2);
    assert!((result["score_percent"].as_f64().unwrap() - 50.0).abs() < 1e-9);

    let verdicts = result["results"].as_array().unwrap();
    assert_eq!(verdicts.len(), 4);
    assert_eq!(verdicts[0]["correct"], true);
    assert_eq!(verdicts[0]["correct_index"], 1);
    assert_eq!(verdicts[3]["correct"], false);

    // Attempt shows up in history
    let attempts = client.get_ok("/api/quiz/attempts").await.unwrap();
    let attempts = attempts.as_array().unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0]["total"], 4);
    assert_eq!(attempts[0]["correct"], 2);

    // And in the progress summary
    let progress = client.get_ok("/api/progress").await.unwrap();
    let progress = progress.as_array().unwrap();
    assert_eq!(progress.len(), 1);
    assert_eq!(progress[0]["quizzes_taken"], 1);
    assert_eq!(progress[0]["questions_answered"], 4);
    assert_eq!(progress[0]["correct_answers"], 2);
    assert!((progress[0]["accuracy"].as_f64().unwrap() - 0.5).abs() < 1e-9);
}

#[tokio::test]
async fn empty_submission_rejected() {
    let server = TestServer::spawn().await.expect("spawn server");
    let client = TestClient::register_and_login(&server.base_url(), "dave")
        .await
        .unwrap();

    let resp = client
        .post_json("/api/quiz", &json!({ "answers": [] }))
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
}

#[tokio::test]
async fn answers_to_foreign_questions_rejected() {
    let server = TestServer::spawn().await.expect("spawn server");
    let owner = TestClient::register_and_login(&server.base_url(), "erin")
        .await
        .unwrap();
    let intruder = TestClient::register_and_login(&server.base_url(), "frank")
        .await
        .unwrap();

    let subject: Value = owner
        .post_json("/api/subjects", &json!({ "name": "Music" }))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let ids = seed_questions(&owner, subject["id"].as_i64().unwrap(), 1).await;

    let resp = intruder
        .post_json(
            "/api/quiz",
            &json!({ "answers": [{ "question_id": ids[0], "choice": 1 }] }),
        )
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}
