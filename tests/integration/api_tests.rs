//! API integration tests
//!
//! These drive a running server with its database and Redis:
//! `cargo test --test api_tests -- --ignored`

use reqwest::{multipart, Client, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

const BASE_URL: &str = "http://localhost:8080/api/v1";

/// Smallest byte sequence accepted as a PNG upload
const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

struct TestUser {
    id: String,
    token: String,
}

/// Register a fresh account and return its id and token
async fn register(client: &Client, name: &str) -> TestUser {
    let email = format!("{}-{}@example.test", name.to_lowercase(), Uuid::new_v4());
    let response = client
        .post(format!("{}/auth/register", BASE_URL))
        .json(&json!({
            "email": email,
            "name": name,
            "password": "correct horse battery"
        }))
        .send()
        .await
        .expect("Failed to send register request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = response.json().await.expect("Failed to parse register response");
    TestUser {
        id: body["user"]["id"].as_str().expect("No user id").to_string(),
        token: body["token"].as_str().expect("No token in response").to_string(),
    }
}

async fn create_book(client: &Client, user: &TestUser, title: &str) -> Value {
    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(&user.token)
        .json(&json!({
            "title": title,
            "author": "Frank Herbert",
            "isbn": "0-441-17271-7"
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.expect("Failed to parse response")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_ready_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/ready", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore]
async fn test_register_login_and_me() {
    let client = Client::new();
    let email = format!("reader-{}@example.test", Uuid::new_v4());

    let response = client
        .post(format!("{}/auth/register", BASE_URL))
        .json(&json!({ "email": email, "name": "Reader", "password": "long enough" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let duplicate = client
        .post(format!("{}/auth/register", BASE_URL))
        .json(&json!({ "email": email.to_uppercase(), "name": "Again", "password": "long enough" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let login = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({ "email": email, "password": "long enough" }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(login.status().is_success());
    let body: Value = login.json().await.expect("Failed to parse response");
    assert_eq!(body["token_type"], "Bearer");
    assert!(body["user"].get("password_hash").is_none());

    let token = body["token"].as_str().expect("No token");
    let me: Value = client
        .get(format!("{}/auth/me", BASE_URL))
        .bearer_auth(token)
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(me["email"], email);
}

#[tokio::test]
#[ignore]
async fn test_bad_credentials() {
    let client = Client::new();

    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({ "email": "nobody@example.test", "password": "wrong password" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_unauthorized_access() {
    let client = Client::new();

    let response = client
        .get(format!("{}/books", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["code"], 2);
}

#[tokio::test]
#[ignore]
async fn test_public_profile_hides_email() {
    let client = Client::new();
    let alice = register(&client, "Alice").await;
    let bob = register(&client, "Bob").await;

    let profile: Value = client
        .get(format!("{}/users/{}", BASE_URL, alice.id))
        .bearer_auth(&bob.token)
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");

    assert_eq!(profile["name"], "Alice");
    assert!(profile.get("email").is_none());
}

#[tokio::test]
#[ignore]
async fn test_book_isbn_is_normalized() {
    let client = Client::new();
    let owner = register(&client, "Owner").await;

    let book = create_book(&client, &owner, "Dune").await;
    assert_eq!(book["isbn10"], "0441172717");
    assert_eq!(book["isbn13"], "9780441172719");
    assert_eq!(book["status"], "available");
    assert_eq!(book["metadata_source"], "manual");

    let list: Value = client
        .get(format!("{}/books?owner_id={}&search=dune", BASE_URL, owner.id))
        .bearer_auth(&owner.token)
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(list["total"], 1);
    assert_eq!(list["page"], 1);
}

#[tokio::test]
#[ignore]
async fn test_invalid_isbn_rejected() {
    let client = Client::new();
    let owner = register(&client, "Owner").await;

    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(&owner.token)
        .json(&json!({ "title": "Broken", "author": "Nobody", "isbn": "978-0-441-17271-0" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore]
async fn test_lend_and_return_flow() {
    let client = Client::new();
    let owner = register(&client, "Owner").await;
    let borrower = register(&client, "Borrower").await;
    let book = create_book(&client, &owner, "Children of Dune").await;
    let book_id = book["id"].as_str().expect("No book id");

    let lent = client
        .post(format!("{}/books/{}/lend", BASE_URL, book_id))
        .bearer_auth(&owner.token)
        .json(&json!({ "borrower_id": borrower.id }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(lent.status().is_success());
    let lent: Value = lent.json().await.expect("Failed to parse response");
    assert_eq!(lent["status"], "borrowed");

    let again = client
        .post(format!("{}/books/{}/lend", BASE_URL, book_id))
        .bearer_auth(&owner.token)
        .json(&json!({ "borrower_id": borrower.id }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(again.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let delete = client
        .delete(format!("{}/books/{}", BASE_URL, book_id))
        .bearer_auth(&owner.token)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(delete.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let unread: Value = client
        .get(format!("{}/notifications?unread_only=true", BASE_URL))
        .bearer_auth(&borrower.token)
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(unread["items"][0]["kind"], "book_lent");

    let returned: Value = client
        .post(format!("{}/books/{}/return", BASE_URL, book_id))
        .bearer_auth(&borrower.token)
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(returned["status"], "available");
    assert!(returned["borrower_id"].is_null());
}

#[tokio::test]
#[ignore]
async fn test_private_club_join_request() {
    let client = Client::new();
    let admin = register(&client, "Admin").await;
    let member = register(&client, "Member").await;

    let club: Value = client
        .post(format!("{}/clubs", BASE_URL))
        .bearer_auth(&admin.token)
        .json(&json!({ "name": "Night Readers", "is_private": true }))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    let club_id = club["id"].as_str().expect("No club id");
    let code = club["invite_code"].as_str().expect("Admin sees the invite code");

    let joined: Value = client
        .post(format!("{}/clubs/join", BASE_URL))
        .bearer_auth(&member.token)
        .json(&json!({ "invite_code": code.to_lowercase() }))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(joined["status"], "pending");

    let hidden = client
        .get(format!("{}/clubs/{}", BASE_URL, club_id))
        .bearer_auth(&member.token)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(hidden.status(), StatusCode::NOT_FOUND);

    let approve = client
        .post(format!("{}/clubs/{}/requests/{}/approve", BASE_URL, club_id, member.id))
        .bearer_auth(&admin.token)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(approve.status(), StatusCode::NO_CONTENT);

    let visible: Value = client
        .get(format!("{}/clubs/{}", BASE_URL, club_id))
        .bearer_auth(&member.token)
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(visible["member_count"], 2);
    assert!(visible["invite_code"].is_null());

    let admin_leaves = client
        .delete(format!("{}/clubs/{}/members/{}", BASE_URL, club_id, admin.id))
        .bearer_auth(&admin.token)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(admin_leaves.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
#[ignore]
async fn test_direct_messages() {
    let client = Client::new();
    let alice = register(&client, "Alice").await;
    let bob = register(&client, "Bob").await;

    let conversation: Value = client
        .post(format!("{}/messages/conversations", BASE_URL))
        .bearer_auth(&alice.token)
        .json(&json!({ "user_id": bob.id }))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    let conversation_id = conversation["id"].as_str().expect("No conversation id");

    let same: Value = client
        .post(format!("{}/messages/conversations", BASE_URL))
        .bearer_auth(&bob.token)
        .json(&json!({ "user_id": alice.id }))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(same["id"], conversation["id"]);

    let sent = client
        .post(format!("{}/messages/conversations/{}/messages", BASE_URL, conversation_id))
        .bearer_auth(&alice.token)
        .json(&json!({ "content": "  Have you finished Dune yet?  " }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(sent.status(), StatusCode::CREATED);

    let conversations: Value = client
        .get(format!("{}/messages/conversations", BASE_URL))
        .bearer_auth(&bob.token)
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(conversations[0]["unread_count"], 1);
    assert_eq!(conversations[0]["last_message_preview"], "Have you finished Dune yet?");

    let marked: Value = client
        .post(format!("{}/messages/conversations/{}/read", BASE_URL, conversation_id))
        .bearer_auth(&bob.token)
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(marked["marked"], 1);

    let self_talk = client
        .post(format!("{}/messages/conversations", BASE_URL))
        .bearer_auth(&alice.token)
        .json(&json!({ "user_id": alice.id }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(self_talk.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore]
async fn test_ocr_candidates() {
    let client = Client::new();
    let user = register(&client, "Reader").await;

    let body: Value = client
        .post(format!("{}/ocr/candidates", BASE_URL))
        .bearer_auth(&user.token)
        .json(&json!({
            "lines": [
                { "text": "GOOD OMENS", "confidence": 0.97, "bbox": [[0,0],[400,0],[400,120],[0,120]] },
                { "text": "Neil Gaiman & Terry Pratchett", "confidence": 0.91, "bbox": [[0,0],[300,0],[300,40],[0,40]] }
            ]
        }))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");

    assert_eq!(body["title_candidates"][0]["value"], "GOOD OMENS");
    assert_eq!(body["author_candidates"][0]["value"], "Neil Gaiman & Terry Pratchett");
    assert_eq!(body["language_guess"], "en");
}

#[tokio::test]
#[ignore]
async fn test_analyze_cover_degrades_without_readings() {
    let client = Client::new();
    let user = register(&client, "Reader").await;

    let form = multipart::Form::new().part(
        "image",
        multipart::Part::bytes(PNG_BYTES.to_vec())
            .file_name("cover.png")
            .mime_str("image/png")
            .expect("valid mime"),
    );

    let response = client
        .post(format!("{}/books/analyze-cover", BASE_URL))
        .bearer_auth(&user.token)
        .multipart(form)
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    // A blank image yields no metadata from any configured provider
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["strands"].is_array());
    assert!(body["book"].is_null());
}

#[tokio::test]
#[ignore]
async fn test_cover_upload_rejects_non_images() {
    let client = Client::new();
    let owner = register(&client, "Owner").await;
    let book = create_book(&client, &owner, "Dune Messiah").await;

    let form = multipart::Form::new().part(
        "image",
        multipart::Part::bytes(b"plain text, not an image".to_vec()).file_name("cover.txt"),
    );

    let response = client
        .post(format!("{}/books/{}/cover", BASE_URL, book["id"].as_str().expect("No id")))
        .bearer_auth(&owner.token)
        .multipart(form)
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
