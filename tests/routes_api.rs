#![cfg(feature = "inmem-store")]

use std::sync::{Arc, Mutex};

use actix_web::{test, App};
use chrono::Utc;
use serial_test::serial;
use uuid::Uuid;

use telloo_notify::auth::create_jwt;
use telloo_notify::directory::inmem::InMemDirectory;
use telloo_notify::dispatch::Dispatcher;
use telloo_notify::mailer::{Email, Mailer, MailerError};
use telloo_notify::models::*;
use telloo_notify::repo::inmem::InMemRepo;
use telloo_notify::routes::{config, AppState};

// Helper to ensure JWT secret present for MaybeAuth / create_jwt
fn setup_env() {
    std::env::set_var("JWT_SECRET", "test-secret-must-be-32-bytes-long!!");
}

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
}

#[async_trait::async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<(), MailerError> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

struct Seeded {
    state: AppState,
    mailer: Arc<RecordingMailer>,
    post_id: Uuid,
    commenter: Uuid,
}

/// One board, one authored post, one prior commenter, emails for both.
fn seed() -> Seeded {
    let repo = InMemRepo::new();
    let directory = InMemDirectory::new();

    let author = Uuid::new_v4();
    let commenter = Uuid::new_v4();
    let owner = Uuid::new_v4();
    directory.insert(author, "author@example.com");
    directory.insert(commenter, "commenter@example.com");
    directory.insert(owner, "owner@example.com");

    let board =
        Board { id: Uuid::new_v4(), slug: "acme".into(), title: "Acme".into(), owner_id: owner };
    repo.insert_board(board.clone());

    let post = Post {
        id: Uuid::new_v4(),
        board_id: board.id,
        user_id: Some(author),
        title: "Dark <mode>".into(),
        description: "please".into(),
        status: "open".into(),
        created_at: Utc::now(),
    };
    repo.insert_post(post.clone());
    repo.insert_comment(Comment {
        id: Uuid::new_v4(),
        post_id: post.id,
        user_id: Some(commenter),
        content: "me too".into(),
        created_at: Utc::now(),
    });

    let mailer = Arc::new(RecordingMailer::default());
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(repo),
        Arc::new(directory),
        mailer.clone(),
        "https://telloo.app",
    ));
    Seeded { state: AppState { dispatcher }, mailer, post_id: post.id, commenter }
}

#[actix_web::test]
#[serial]
async fn dispatch_returns_sent_count() {
    setup_env();
    let seeded = seed();
    let app = test::init_service(
        App::new()
            .app_data(actix_web::web::Data::new(seeded.state.clone()))
            .configure(config),
    )
    .await;

    // commenter comments again: only the author is left to notify
    let req = test::TestRequest::post()
        .uri("/api/v1/notifications")
        .set_json(serde_json::json!({
            "type": "new_comment",
            "postId": seeded.post_id,
            "triggeredBy": seeded.commenter,
            "commentContent": "bump"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(body["sent"], 1);

    let sent = seeded.mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "author@example.com");
}

#[actix_web::test]
#[serial]
async fn user_markup_is_escaped_in_delivered_email() {
    setup_env();
    let seeded = seed();
    let app = test::init_service(
        App::new()
            .app_data(actix_web::web::Data::new(seeded.state.clone()))
            .configure(config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/notifications")
        .set_json(serde_json::json!({
            "type": "new_comment",
            "postId": seeded.post_id,
            "triggeredBy": seeded.commenter,
            "commentContent": "<script>alert(1)</script>"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let sent = seeded.mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
    assert!(!sent[0].html.contains("<script>alert(1)"));
    // post title markup is escaped too
    assert!(sent[0].html.contains("Dark &lt;mode&gt;"));
}

#[actix_web::test]
#[serial]
async fn malformed_json_is_a_400() {
    setup_env();
    let seeded = seed();
    let app = test::init_service(
        App::new()
            .app_data(actix_web::web::Data::new(seeded.state.clone()))
            .configure(config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/notifications")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
#[serial]
async fn missing_event_field_is_a_400() {
    setup_env();
    let seeded = seed();
    let app = test::init_service(
        App::new()
            .app_data(actix_web::web::Data::new(seeded.state.clone()))
            .configure(config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/notifications")
        .set_json(serde_json::json!({
            "type": "status_change",
            "postId": seeded.post_id
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert!(body["error"].as_str().unwrap().contains("newStatus"));
}

#[actix_web::test]
#[serial]
async fn unknown_event_type_is_accepted_with_zero_sent() {
    setup_env();
    let seeded = seed();
    let app = test::init_service(
        App::new()
            .app_data(actix_web::web::Data::new(seeded.state.clone()))
            .configure(config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/notifications")
        .set_json(serde_json::json!({
            "type": "new_vote",
            "postId": seeded.post_id
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(body["sent"], 0);
}

#[actix_web::test]
#[serial]
async fn missing_post_is_a_500_with_error_body() {
    setup_env();
    let seeded = seed();
    let app = test::init_service(
        App::new()
            .app_data(actix_web::web::Data::new(seeded.state.clone()))
            .configure(config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/notifications")
        .set_json(serde_json::json!({
            "type": "status_change",
            "postId": Uuid::new_v4(),
            "newStatus": "done"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(body["error"], "post not found");
}

#[actix_web::test]
#[serial]
async fn invalid_bearer_is_rejected_but_anonymous_callers_pass() {
    setup_env();
    let seeded = seed();
    let app = test::init_service(
        App::new()
            .app_data(actix_web::web::Data::new(seeded.state.clone()))
            .configure(config),
    )
    .await;

    let payload = serde_json::json!({
        "type": "status_change",
        "postId": seeded.post_id,
        "newStatus": "planned"
    });

    // forged token → 401, nothing dispatched
    let req = test::TestRequest::post()
        .uri("/api/v1/notifications")
        .insert_header(("Authorization", "Bearer not-a-jwt"))
        .set_json(&payload)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
    assert!(seeded.mailer.sent.lock().unwrap().is_empty());

    // valid token → 200
    let token = create_jwt("comment-service").unwrap();
    let req = test::TestRequest::post()
        .uri("/api/v1/notifications")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(&payload)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    // no header at all → 200 as well
    let req = test::TestRequest::post()
        .uri("/api/v1/notifications")
        .set_json(&payload)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
}
