mod common;

use axum::http::{Method, StatusCode, header};
use common::*;
use edulibrary::{
    AppConfig, MockNotifier, MockStorageService,
    models::{Category, FileFilter},
    repository::Repository,
    storage::StorageService,
};
use serde_json::json;
use tokio::test;

// --- Registration & Login ---

#[test]
async fn test_register_then_login_sets_session_cookie() {
    let ctx = context().await;

    let response = send(
        &ctx.app,
        json_request(
            Method::POST,
            "/register",
            None,
            json!({"username": " alice ", "email": "a@x.com", "password": "pw1"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Registration successful");
    assert_eq!(body["invitation_accepted"], false);

    let response = send(
        &ctx.app,
        json_request(
            Method::POST,
            "/login",
            None,
            json!({"username": "alice", "password": "pw1"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("edulibrary_session="));
    assert!(cookie.contains("HttpOnly"));

    let body = body_json(response).await;
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["user"]["is_admin"], false);
    assert!(body["user"].get("password_hash").is_none());
}

#[test]
async fn test_register_validation_errors() {
    let ctx = context().await;
    seed_user(&ctx.repo, "alice", "a@x.com", "pw1", false).await;

    let cases = [
        (json!({"username": "  ", "email": "b@x.com", "password": "p"}), "All fields are required"),
        (json!({"username": "bob", "email": "b@x.com"}), "All fields are required"),
        (json!({"username": "alice", "email": "b@x.com", "password": "p"}), "Username already exists"),
        (json!({"username": "bob", "email": "a@x.com", "password": "p"}), "Email already exists"),
    ];

    for (payload, expected) in cases {
        let response = send(&ctx.app, json_request(Method::POST, "/register", None, payload)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], expected);
    }
}

#[test]
async fn test_unreadable_json_bodies_are_bad_requests() {
    let ctx = context().await;

    let cases = [
        ("/register", Some("application/json"), "{not json"),
        ("/register", None, r#"{"username": "bob", "email": "b@x.com", "password": "p"}"#),
        ("/login", Some("application/json"), r#"{"username": null, "password": "p"}"#),
        ("/login", Some("application/json"), r#"{"username": 42, "password": "p"}"#),
    ];

    for (uri, content_type, payload) in cases {
        let response = send(&ctx.app, raw_request(Method::POST, uri, content_type, payload)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{} {:?}", uri, payload);
        let body = body_json(response).await;
        assert!(body["error"].is_string(), "{} {:?}", uri, payload);
    }

    assert!(ctx.repo.find_user_by_login("bob").await.unwrap().is_none());
}

#[test]
async fn test_login_by_email_and_uniform_failures() {
    let ctx = context().await;
    let bob = seed_user(&ctx.repo, "bob", "b@x.com", "pw2", false).await;

    // Email works as identifier, under either alias.
    login(&ctx.app, "b@x.com", "pw2").await;
    let response = send(
        &ctx.app,
        json_request(Method::POST, "/login", None, json!({"identifier": "bob", "password": "pw2"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        &ctx.app,
        json_request(Method::POST, "/login", None, json!({"username": "", "password": "x"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    ctx.repo.toggle_user_active(bob.id).await.unwrap();

    for (username, password) in [("bob", "pw2"), ("bob", "wrong"), ("ghost", "pw2")] {
        let response = send(
            &ctx.app,
            json_request(
                Method::POST,
                "/login",
                None,
                json!({"username": username, "password": password}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "Invalid credentials");
    }
}

#[test]
async fn test_user_info_and_logout() {
    let ctx = context().await;
    seed_user(&ctx.repo, "alice", "a@x.com", "pw1", false).await;

    let response = send(&ctx.app, empty_request(Method::GET, "/user-info", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["logged_in"], false);
    assert!(body.get("user").is_none());

    let token = login(&ctx.app, "alice", "pw1").await;
    let body = body_json(send(&ctx.app, empty_request(Method::GET, "/user-info", Some(&token))).await).await;
    assert_eq!(body["logged_in"], true);
    assert_eq!(body["user"]["username"], "alice");

    let response = send(&ctx.app, empty_request(Method::POST, "/logout", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .contains("Max-Age=0")
    );

    let body = body_json(send(&ctx.app, empty_request(Method::GET, "/user-info", Some(&token))).await).await;
    assert_eq!(body["logged_in"], false);

    // Logging out twice is fine.
    let response = send(&ctx.app, empty_request(Method::POST, "/logout", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// --- Invitations ---

#[test]
async fn test_invite_then_register_accepts_invitation() {
    let ctx = context().await;
    seed_user(&ctx.repo, "alice", "a@x.com", "pw1", false).await;
    let token = login(&ctx.app, "alice", "pw1").await;

    let response = send(
        &ctx.app,
        json_request(
            Method::POST,
            "/send-invite",
            Some(&token),
            json!({"email": "bob@x.com", "message": "Come read"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Invitation sent successfully!");
    let link = body["invite_link"].as_str().unwrap().to_string();
    assert!(link.starts_with("http://localhost:5000/?invite="));
    assert!(link.ends_with("&email=bob%40x.com"));

    let code = link
        .split("invite=")
        .nth(1)
        .and_then(|rest| rest.split('&').next())
        .unwrap()
        .to_string();
    assert_eq!(code.len(), 32);

    let sent = ctx.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "bob@x.com");
    assert!(sent[0].body.contains("alice has invited you"));
    assert!(sent[0].body.contains("Come read"));

    let response = send(
        &ctx.app,
        json_request(
            Method::POST,
            "/register",
            None,
            json!({"username": "bob", "email": "bob@x.com", "password": "pw2", "invite_code": code}),
        ),
    )
    .await;
    assert_eq!(body_json(response).await["invitation_accepted"], true);

    let invitation = ctx.repo.get_invitation(&code).await.unwrap().unwrap();
    assert!(invitation.used);
    assert_eq!(invitation.invited_by, "alice");
}

#[test]
async fn test_invite_survives_mail_failure() {
    let ctx = context_with(
        AppConfig::default(),
        MockStorageService::new(),
        MockNotifier::new_failing(),
    )
    .await;
    seed_user(&ctx.repo, "alice", "a@x.com", "pw1", false).await;
    let token = login(&ctx.app, "alice", "pw1").await;

    let response = send(
        &ctx.app,
        json_request(Method::POST, "/send-invite", Some(&token), json!({"email": "bob@x.com"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("email could not be sent"));
    assert!(body["invite_link"].as_str().unwrap().contains("invite="));

    let response = send(
        &ctx.app,
        json_request(Method::POST, "/send-invite", Some(&token), json!({"email": " "})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Email is required");
}

// --- Files ---

#[test]
async fn test_upload_list_download_preview() {
    let ctx = context().await;
    seed_user(&ctx.repo, "alice", "a@x.com", "pw1", false).await;
    let bob = seed_user(&ctx.repo, "bob", "b@x.com", "pw2", false).await;
    let alice_token = login(&ctx.app, "alice", "pw1").await;

    let file_id = upload(
        &ctx,
        &alice_token,
        "Calculus Notes.pdf",
        &[("category", "Science"), ("description", "Limits"), ("tags", "math, exam")],
    )
    .await;

    let response = send(&ctx.app, empty_request(Method::GET, "/files?category=Science", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let files = body["files"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["original_name"], "Calculus_Notes.pdf");
    assert_eq!(files[0]["uploaded_by"], "alice");
    assert_eq!(files[0]["tags"], json!(["math", "exam"]));
    assert!(files[0].get("filepath").is_none());
    assert_eq!(body["categories"].as_array().unwrap().len(), Category::ALL.len());

    let body = body_json(send(&ctx.app, empty_request(Method::GET, "/files?category=History", None)).await).await;
    assert!(body["files"].as_array().unwrap().is_empty());

    // Preview is public and leaves the counters alone.
    let response = send(&ctx.app, empty_request(Method::GET, &format!("/preview/{}", file_id), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_DISPOSITION], "inline; filename=\"Calculus_Notes.pdf\"");
    assert_eq!(body_bytes(response).await, b"%PDF-1.4 test");

    // Download requires a session.
    let response = send(&ctx.app, empty_request(Method::GET, &format!("/download/{}", file_id), None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let bob_token = login(&ctx.app, "bob", "pw2").await;
    let response = send(
        &ctx.app,
        empty_request(Method::GET, &format!("/download/{}", file_id), Some(&bob_token)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"Calculus_Notes.pdf\""
    );

    let file = ctx.repo.get_file(file_id).await.unwrap().unwrap();
    assert_eq!(file.download_count, 1);
    let bob = ctx.repo.get_user(bob.id).await.unwrap().unwrap();
    assert_eq!(bob.downloads_count, 1);
}

#[test]
async fn test_upload_rejections() {
    let ctx = context().await;
    seed_user(&ctx.repo, "alice", "a@x.com", "pw1", false).await;
    let token = login(&ctx.app, "alice", "pw1").await;

    let response = send(&ctx.app, multipart_request("/upload", None, Some(("a.pdf", b"x".as_slice())), &[])).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let cases: [(Option<(&str, &[u8])>, &str); 5] = [
        (None, "No file provided"),
        (Some(("report.docx", b"x".as_slice())), "Only PDF files are allowed"),
        (Some(("__.pdf", b"x".as_slice())), "Invalid filename"),
        (Some(("日本語.pdf", b"x".as_slice())), "Invalid filename"),
        (Some(("..pdf", b"x".as_slice())), "Invalid filename"),
    ];
    for (file, expected) in cases {
        let response = send(&ctx.app, multipart_request("/upload", Some(&token), file, &[])).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], expected);
    }

    assert!(ctx.storage.is_empty());
    assert!(ctx.repo.list_files(&FileFilter::default()).await.unwrap().is_empty());
}

#[test]
async fn test_upload_keeps_extension_after_sanitizing() {
    let ctx = context().await;
    seed_user(&ctx.repo, "alice", "a@x.com", "pw1", false).await;
    let token = login(&ctx.app, "alice", "pw1").await;

    let response = send(
        &ctx.app,
        multipart_request("/upload", Some(&token), Some(("Ü ber notes.pdf", b"%PDF".as_slice())), &[]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["original_name"], "ber_notes.pdf");
    assert!(body["filename"].as_str().unwrap().ends_with("_ber_notes.pdf"));
}

#[test]
async fn test_upload_with_two_files_is_rejected() {
    let ctx = context().await;
    seed_user(&ctx.repo, "alice", "a@x.com", "pw1", false).await;
    let token = login(&ctx.app, "alice", "pw1").await;

    let files: [(&str, &[u8]); 2] = [("a.pdf", b"one".as_slice()), ("b.pdf", b"two".as_slice())];
    let response = send(&ctx.app, multipart_files_request("/upload", Some(&token), &files, &[])).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"],
        "Only one file can be uploaded per request"
    );

    assert!(ctx.storage.is_empty());
    assert!(ctx.repo.list_files(&FileFilter::default()).await.unwrap().is_empty());
}

#[test]
async fn test_upload_over_limit_is_rejected() {
    let config = AppConfig {
        max_upload_bytes: 1024,
        ..AppConfig::default()
    };
    let ctx = context_with(config, MockStorageService::new(), MockNotifier::new()).await;
    seed_user(&ctx.repo, "alice", "a@x.com", "pw1", false).await;
    let token = login(&ctx.app, "alice", "pw1").await;

    let big = vec![b'x'; 4096];
    let response = send(
        &ctx.app,
        multipart_request("/upload", Some(&token), Some(("big.pdf", big.as_slice())), &[]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(ctx.storage.is_empty());
}

#[test]
async fn test_unknown_category_is_filed_under_other() {
    let ctx = context().await;
    seed_user(&ctx.repo, "alice", "a@x.com", "pw1", false).await;
    let token = login(&ctx.app, "alice", "pw1").await;

    let id = upload(&ctx, &token, "a.pdf", &[("category", "Cooking")]).await;
    let file = ctx.repo.get_file(id).await.unwrap().unwrap();
    assert_eq!(file.category, Category::Other);

    let alice = ctx.repo.find_user_by_login("alice").await.unwrap().unwrap();
    assert_eq!(alice.uploads_count, 1);
}

#[test]
async fn test_same_name_uploads_get_distinct_storage_names() {
    let ctx = context().await;
    seed_user(&ctx.repo, "alice", "a@x.com", "pw1", false).await;
    let token = login(&ctx.app, "alice", "pw1").await;

    let first = upload(&ctx, &token, "notes.pdf", &[]).await;
    let second = upload(&ctx, &token, "notes.pdf", &[]).await;

    let first = ctx.repo.get_file(first).await.unwrap().unwrap();
    let second = ctx.repo.get_file(second).await.unwrap().unwrap();
    assert_ne!(first.filename, second.filename);
    assert_eq!(ctx.storage.len(), 2);
}

#[test]
async fn test_upload_with_failing_storage_creates_no_record() {
    let ctx = context_with(
        AppConfig::default(),
        MockStorageService::new_failing(),
        MockNotifier::new(),
    )
    .await;
    seed_user(&ctx.repo, "alice", "a@x.com", "pw1", false).await;
    let token = login(&ctx.app, "alice", "pw1").await;

    let response = send(
        &ctx.app,
        multipart_request("/upload", Some(&token), Some(("a.pdf", b"x".as_slice())), &[]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "File storage error occurred");
    assert!(ctx.repo.list_files(&FileFilter::default()).await.unwrap().is_empty());
}

#[test]
async fn test_missing_blob_is_reported_as_not_found() {
    let ctx = context().await;
    seed_user(&ctx.repo, "alice", "a@x.com", "pw1", false).await;
    let token = login(&ctx.app, "alice", "pw1").await;
    let id = upload(&ctx, &token, "a.pdf", &[]).await;

    let file = ctx.repo.get_file(id).await.unwrap().unwrap();
    ctx.storage.delete(&file.filename).await.unwrap();

    let response = send(&ctx.app, empty_request(Method::GET, &format!("/download/{}", id), Some(&token))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "File not found on disk");

    let file = ctx.repo.get_file(id).await.unwrap().unwrap();
    assert_eq!(file.download_count, 0);

    let response = send(&ctx.app, empty_request(Method::GET, "/download/9999", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[test]
async fn test_delete_permissions() {
    let ctx = context().await;
    seed_user(&ctx.repo, "alice", "a@x.com", "pw1", false).await;
    seed_user(&ctx.repo, "bob", "b@x.com", "pw2", false).await;
    seed_user(&ctx.repo, "admin", "admin@x.com", "pw3", true).await;
    let alice_token = login(&ctx.app, "alice", "pw1").await;
    let bob_token = login(&ctx.app, "bob", "pw2").await;
    let admin_token = login(&ctx.app, "admin", "pw3").await;

    let first = upload(&ctx, &alice_token, "one.pdf", &[]).await;
    let second = upload(&ctx, &alice_token, "two.pdf", &[]).await;

    let response = send(&ctx.app, empty_request(Method::DELETE, &format!("/delete/{}", first), Some(&bob_token))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "You can only delete your own files");
    assert!(ctx.repo.get_file(first).await.unwrap().is_some());

    let response = send(&ctx.app, empty_request(Method::DELETE, &format!("/delete/{}", first), Some(&alice_token))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "File deleted successfully");

    let response = send(&ctx.app, empty_request(Method::DELETE, &format!("/delete/{}", second), Some(&admin_token))).await;
    assert_eq!(response.status(), StatusCode::OK);

    assert!(ctx.storage.is_empty());
    let alice = ctx.repo.find_user_by_login("alice").await.unwrap().unwrap();
    assert_eq!(alice.uploads_count, 0);

    let response = send(&ctx.app, empty_request(Method::DELETE, &format!("/delete/{}", first), Some(&alice_token))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// --- Support Tickets ---

#[test]
async fn test_ticket_flow() {
    let ctx = context().await;
    seed_user(&ctx.repo, "alice", "a@x.com", "pw1", false).await;
    seed_user(&ctx.repo, "bob", "b@x.com", "pw2", false).await;
    seed_user(&ctx.repo, "admin", "admin@x.com", "pw3", true).await;
    let alice_token = login(&ctx.app, "alice", "pw1").await;
    let bob_token = login(&ctx.app, "bob", "pw2").await;
    let admin_token = login(&ctx.app, "admin", "pw3").await;

    let response = send(
        &ctx.app,
        json_request(
            Method::POST,
            "/support/tickets",
            Some(&alice_token),
            json!({"title": "Broken", "description": "Preview fails"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ticket"]["priority"], "medium");
    assert_eq!(body["ticket"]["status"], "open");
    assert_eq!(body["ticket"]["user"], "alice");
    let ticket_id = body["ticket"]["id"].as_i64().unwrap();

    // The admin address was notified.
    let sent = ctx.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, ctx.config.admin_email);

    let body = body_json(send(&ctx.app, empty_request(Method::GET, "/support/tickets", Some(&bob_token))).await).await;
    assert!(body["tickets"].as_array().unwrap().is_empty());
    let body = body_json(send(&ctx.app, empty_request(Method::GET, "/support/tickets", Some(&admin_token))).await).await;
    assert_eq!(body["tickets"].as_array().unwrap().len(), 1);

    // Regular users cannot answer tickets.
    let response = send(
        &ctx.app,
        json_request(
            Method::POST,
            &format!("/admin/tickets/{}/respond", ticket_id),
            Some(&alice_token),
            json!({"response": "Self-service", "status": "resolved"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &ctx.app,
        json_request(
            Method::POST,
            &format!("/admin/tickets/{}/respond", ticket_id),
            Some(&admin_token),
            json!({"response": "Fixed", "status": "resolved"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ticket"]["status"], "resolved");
    assert_eq!(body["ticket"]["admin_response"], "Fixed");
    assert!(body["ticket"]["resolved_date"].is_string());

    let sent = ctx.notifier.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].to, "a@x.com");
    assert!(sent[1].body.contains("Admin Response: Fixed"));
}

#[test]
async fn test_ticket_validation() {
    let ctx = context().await;
    seed_user(&ctx.repo, "alice", "a@x.com", "pw1", false).await;
    seed_user(&ctx.repo, "admin", "admin@x.com", "pw3", true).await;
    let alice_token = login(&ctx.app, "alice", "pw1").await;
    let admin_token = login(&ctx.app, "admin", "pw3").await;

    let cases = [
        (json!({"title": " ", "description": "d"}), "Title and description are required"),
        (json!({"title": "t", "description": "d", "priority": "urgent"}), "Invalid priority"),
    ];
    for (payload, expected) in cases {
        let response = send(
            &ctx.app,
            json_request(Method::POST, "/support/tickets", Some(&alice_token), payload),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], expected);
    }

    let response = send(
        &ctx.app,
        json_request(Method::POST, "/admin/tickets/9999/respond", Some(&admin_token), json!({"response": "x"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(
        &ctx.app,
        json_request(Method::POST, "/admin/tickets/1/respond", Some(&admin_token), json!({"response": ""})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Response is required");

    let response = send(
        &ctx.app,
        json_request(
            Method::POST,
            "/admin/tickets/1/respond",
            Some(&admin_token),
            json!({"response": "x", "status": "closed"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid status");
}

// --- Admin ---

#[test]
async fn test_admin_routes_require_session_then_admin() {
    let ctx = context().await;
    seed_user(&ctx.repo, "alice", "a@x.com", "pw1", false).await;
    let token = login(&ctx.app, "alice", "pw1").await;

    for uri in ["/admin/users", "/analytics"] {
        let response = send(&ctx.app, empty_request(Method::GET, uri, None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);

        let response = send(&ctx.app, empty_request(Method::GET, uri, Some(&token))).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", uri);
        assert_eq!(body_json(response).await["error"], "Admin access required");
    }
}

#[test]
async fn test_admin_toggles_user_status() {
    let ctx = context().await;
    let admin = seed_user(&ctx.repo, "admin", "admin@x.com", "pw3", true).await;
    let bob = seed_user(&ctx.repo, "bob", "b@x.com", "pw2", false).await;
    let admin_token = login(&ctx.app, "admin", "pw3").await;

    let uri = format!("/admin/users/{}/toggle-status", bob.id);
    let response = send(&ctx.app, empty_request(Method::POST, &uri, Some(&admin_token))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "User deactivated successfully");
    assert_eq!(body["user"]["is_active"], false);

    // Deactivated users cannot log in.
    let response = send(
        &ctx.app,
        json_request(Method::POST, "/login", None, json!({"username": "bob", "password": "pw2"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(send(&ctx.app, empty_request(Method::POST, &uri, Some(&admin_token))).await).await;
    assert_eq!(body["message"], "User activated successfully");

    let uri = format!("/admin/users/{}/toggle-status", admin.id);
    let response = send(&ctx.app, empty_request(Method::POST, &uri, Some(&admin_token))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Cannot modify admin user");

    let response = send(&ctx.app, empty_request(Method::POST, "/admin/users/9999/toggle-status", Some(&admin_token))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(send(&ctx.app, empty_request(Method::GET, "/admin/users", Some(&admin_token))).await).await;
    let users = body["users"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0]["username"], "bob");
}

#[test]
async fn test_admin_features_file_and_reads_analytics() {
    let ctx = context().await;
    seed_user(&ctx.repo, "alice", "a@x.com", "pw1", false).await;
    seed_user(&ctx.repo, "admin", "admin@x.com", "pw3", true).await;
    let alice_token = login(&ctx.app, "alice", "pw1").await;
    let admin_token = login(&ctx.app, "admin", "pw3").await;

    let id = upload(&ctx, &alice_token, "a.pdf", &[("category", "Science")]).await;
    upload(&ctx, &alice_token, "b.pdf", &[]).await;

    let response = send(
        &ctx.app,
        empty_request(Method::POST, &format!("/admin/files/featured/{}", id), Some(&admin_token)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "File featured successfully");
    assert_eq!(body["file"]["is_featured"], true);

    let body = body_json(send(&ctx.app, empty_request(Method::GET, "/files?featured=true", None)).await).await;
    assert_eq!(body["files"].as_array().unwrap().len(), 1);

    let response = send(&ctx.app, empty_request(Method::POST, "/admin/files/featured/9999", Some(&admin_token))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&ctx.app, empty_request(Method::GET, "/analytics", Some(&admin_token))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["stats"]["total_users"], 2);
    assert_eq!(body["stats"]["active_users"], 2);
    assert_eq!(body["stats"]["total_files"], 2);
    assert_eq!(body["stats"]["total_downloads"], 0);
    assert_eq!(body["categories"].as_array().unwrap().len(), 2);
    assert_eq!(body["recent_uploads"].as_array().unwrap().len(), 2);
}

// --- Misc ---

#[test]
async fn test_health_and_request_id() {
    let ctx = context().await;
    let response = send(&ctx.app, empty_request(Method::GET, "/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(body_bytes(response).await, b"ok");
}
