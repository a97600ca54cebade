//! End-to-end API tests against a real database
//!
//! Each test creates its own users with unique emails and removes them at the
//! end, so tests can share one database and run in parallel. Without
//! `DATABASE_URL` they return early.

mod common;

use axum::http::StatusCode;
use common::{TestContext, PASSWORD};
use dailytask_shared::models::user::UserRole;
use serde_json::json;
use uuid::Uuid;

const PNG: &[u8] = b"\x89PNG\r\n\x1a\nnot-really-a-png";

#[tokio::test]
async fn test_register_login_and_submit() {
    let Some(ctx) = TestContext::new().await else { return };

    let email = format!("Scenario1-{}@Example.com", Uuid::new_v4());

    let (status, body) = ctx
        .json(
            "POST",
            "/api/users/register",
            None,
            Some(json!({ "email": email, "password": PASSWORD, "name": "Ada" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["user"]["role"], "user");
    assert_eq!(body["user"]["email"], email.to_lowercase());
    assert!(body["user"].get("passwordHash").is_none());

    let (status, _) = ctx
        .json(
            "POST",
            "/api/users/register",
            None,
            Some(json!({ "email": email, "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "duplicate email");

    let (status, _) = ctx
        .json(
            "POST",
            "/api/users/login",
            None,
            Some(json!({ "email": email, "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, login) = ctx
        .json(
            "POST",
            "/api/users/login",
            None,
            Some(json!({ "email": email, "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let user = common::TestUser {
        user: serde_json::from_value(login["user"].clone()).unwrap(),
        token: login["token"].as_str().unwrap().to_string(),
    };

    let (status, submitted) = ctx
        .submit(&user, "Read about ownership", &[("shot.png", "image/png", PNG.to_vec())])
        .await;
    assert_eq!(status, StatusCode::CREATED, "{submitted}");
    assert_eq!(submitted["task"]["status"], "pending");
    assert_eq!(submitted["task"]["attachments"].as_array().unwrap().len(), 1);

    let (status, mine) = ctx
        .json(
            "GET",
            &format!("/api/tasks/my-tasks/{}", email.to_uppercase()),
            Some(&user),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine["tasks"].as_array().unwrap().len(), 1);

    let (status, refreshed) = ctx
        .json(
            "POST",
            "/api/users/refresh",
            None,
            Some(json!({ "refreshToken": login["refreshToken"] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(refreshed["token"].is_string());

    ctx.cleanup_users(&[&user]).await;
}

#[tokio::test]
async fn test_admin_approval_and_owner_checks() {
    let Some(ctx) = TestContext::new().await else { return };

    let owner = ctx.create_user(UserRole::User).await;
    let other = ctx.create_user(UserRole::User).await;
    let admin = ctx.create_user(UserRole::Admin).await;

    let (_, submitted) = ctx.submit(&owner, "Daily notes", &[]).await;
    let task_id = submitted["task"]["id"].as_str().unwrap().to_string();

    let (status, _) = ctx
        .json(
            "PATCH",
            &format!("/api/tasks/{task_id}/status"),
            Some(&other),
            Some(json!({ "status": "review" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "non-owner status change");

    let (status, _) = ctx
        .json(
            "PATCH",
            &format!("/api/tasks/{task_id}/status"),
            Some(&owner),
            Some(json!({ "status": "done" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "unknown status");

    let (status, _) = ctx
        .json(
            "PATCH",
            &format!("/api/tasks/{task_id}/status"),
            Some(&owner),
            Some(json!({ "status": "completed" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "owner self-approval");

    let (status, _) = ctx
        .json("POST", &format!("/api/tasks/{task_id}/approve"), Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, current) = ctx
        .json("GET", &format!("/api/tasks/{task_id}"), Some(&owner), None)
        .await;
    assert_eq!(current["task"]["status"], "pending", "status unchanged after denial");

    let (status, approved) = ctx
        .json("POST", &format!("/api/tasks/{task_id}/approve"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["task"]["status"], "completed");

    let (status, rejected) = ctx
        .json("POST", &format!("/api/tasks/{task_id}/reject"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["task"]["status"], "review");

    let (status, reverted) = ctx
        .json("POST", &format!("/api/tasks/{task_id}/revert"), Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reverted["task"]["status"], "pending");

    let (status, _) = ctx
        .json("POST", &format!("/api/tasks/{task_id}/revert"), Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "revert from pending");

    let (status, _) = ctx
        .json("GET", &format!("/api/tasks/{}", Uuid::new_v4()), Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    ctx.cleanup_users(&[&owner, &other, &admin]).await;
}

#[tokio::test]
async fn test_supporter_stats() {
    let Some(ctx) = TestContext::new().await else { return };

    let owner = ctx.create_user(UserRole::User).await;
    let supporter = ctx.create_user(UserRole::Supporter).await;

    ctx.submit(&owner, "First", &[]).await;
    ctx.submit(&owner, "Second", &[]).await;

    let (status, _) = ctx.json("GET", "/api/tasks/stats", Some(&owner), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, report) = ctx.json("GET", "/api/tasks/stats", Some(&supporter), None).await;
    assert_eq!(status, StatusCode::OK);

    let stats = &report["stats"];
    let total = stats["totalTasks"].as_i64().unwrap();
    let parts = stats["completedTasks"].as_i64().unwrap()
        + stats["pendingTasks"].as_i64().unwrap()
        + stats["reviewTasks"].as_i64().unwrap();
    assert_eq!(total, parts);
    assert!(total >= 2);
    assert!(stats["activeUsers"].as_i64().unwrap() >= 1);
    assert!(report["recentTasks"].as_array().unwrap().len() <= 5);

    let (status, all) = ctx.json("GET", "/api/tasks/all", Some(&supporter), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(all["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .any(|t| t["ownerEmail"] == owner.user.email));

    ctx.cleanup_users(&[&owner, &supporter]).await;
}

#[tokio::test]
async fn test_comment_visibility() {
    let Some(ctx) = TestContext::new().await else { return };

    let owner = ctx.create_user(UserRole::User).await;
    let supporter = ctx.create_user(UserRole::Supporter).await;
    let stranger = ctx.create_user(UserRole::User).await;

    let (_, submitted) = ctx.submit(&owner, "Commented task", &[]).await;
    let task_id = submitted["task"]["id"].as_str().unwrap().to_string();
    let comments_uri = format!("/api/comments/{task_id}");

    let (status, added) = ctx
        .json("POST", &comments_uri, Some(&supporter), Some(json!({ "content": "Nice work" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let comment_id = added["comment"]["id"].as_str().unwrap().to_string();

    let (status, listed) = ctx.json("GET", &comments_uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["comments"].as_array().unwrap().len(), 1);

    let (status, _) = ctx.json("GET", &comments_uri, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx
        .json("POST", &comments_uri, Some(&stranger), Some(json!({ "content": "Hi" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx
        .json(
            "PUT",
            &format!("/api/comments/{comment_id}"),
            Some(&owner),
            Some(json!({ "content": "Edited by someone else" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "only author or admin edits");

    let (status, edited) = ctx
        .json(
            "PUT",
            &format!("/api/comments/{comment_id}"),
            Some(&supporter),
            Some(json!({ "content": "Very nice work" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["comment"]["content"], "Very nice work");

    let (status, _) = ctx
        .json("DELETE", &format!("/api/comments/{comment_id}"), Some(&supporter), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    ctx.cleanup_users(&[&owner, &supporter, &stranger]).await;
}

#[tokio::test]
async fn test_task_deletion() {
    let Some(ctx) = TestContext::new().await else { return };

    let owner = ctx.create_user(UserRole::User).await;
    let stranger = ctx.create_user(UserRole::User).await;
    let supporter = ctx.create_user(UserRole::Supporter).await;
    let admin = ctx.create_user(UserRole::Admin).await;

    let (status, submitted) = ctx
        .submit(&owner, "Doomed task", &[("shot.png", "image/png", PNG.to_vec())])
        .await;
    assert_eq!(status, StatusCode::CREATED, "{submitted}");
    let task_id = submitted["task"]["id"].as_str().unwrap().to_string();
    let task_uuid = Uuid::parse_str(&task_id).unwrap();
    let file = submitted["task"]["attachments"][0]["providerId"]
        .as_str()
        .unwrap()
        .to_string();
    let stored = ctx.upload_dir().join(&file);
    assert!(stored.exists());

    let (status, added) = ctx
        .json(
            "POST",
            &format!("/api/comments/{task_id}"),
            Some(&supporter),
            Some(json!({ "content": "Looks good" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(added["comment"]["authorName"], "Test supporter");
    assert_eq!(ctx.comment_count(task_uuid).await, 1);

    let task_uri = format!("/api/tasks/{task_id}");

    let (status, _) = ctx.json("DELETE", &task_uri, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx.json("DELETE", &task_uri, Some(&supporter), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "supporters review but do not delete");

    let (status, _) = ctx.json("DELETE", &task_uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = ctx.json("GET", &task_uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = ctx
        .json("GET", &format!("/api/comments/{task_id}"), Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(ctx.comment_count(task_uuid).await, 0);
    assert!(!stored.exists(), "attachment removed with its task");

    let (_, other) = ctx.submit(&owner, "Second task", &[]).await;
    let other_uri = format!("/api/tasks/{}", other["task"]["id"].as_str().unwrap());

    let (status, _) = ctx.json("DELETE", &other_uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK, "admins delete any task");

    let (status, _) = ctx.json("DELETE", &other_uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    ctx.cleanup_users(&[&owner, &stranger, &supporter, &admin]).await;
}

#[tokio::test]
async fn test_download_follows_task_visibility() {
    let Some(ctx) = TestContext::new().await else { return };

    let owner = ctx.create_user(UserRole::User).await;
    let stranger = ctx.create_user(UserRole::User).await;
    let supporter = ctx.create_user(UserRole::Supporter).await;

    let (_, submitted) = ctx
        .submit(&owner, "With a file", &[("shot.png", "image/png", PNG.to_vec())])
        .await;
    let file = submitted["task"]["attachments"][0]["providerId"]
        .as_str()
        .unwrap()
        .to_string();
    let download_uri = format!("/download/{file}");

    for (user, expected) in [
        (&owner, StatusCode::OK),
        (&supporter, StatusCode::OK),
        (&stranger, StatusCode::FORBIDDEN),
    ] {
        let (status, _) = ctx.json("GET", &download_uri, Some(user), None).await;
        assert_eq!(status, expected, "{}", user.user.role);
    }

    let (status, _) = ctx
        .json("GET", "/download/not-attached.png", Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    ctx.cleanup_users(&[&owner, &stranger, &supporter]).await;
}

#[tokio::test]
async fn test_user_deletion_removes_uploads() {
    let Some(ctx) = TestContext::new().await else { return };

    let admin = ctx.create_user(UserRole::Admin).await;
    let member = ctx.create_user(UserRole::User).await;

    let (status, submitted) = ctx
        .submit(&member, "Leaving soon", &[("shot.png", "image/png", PNG.to_vec())])
        .await;
    assert_eq!(status, StatusCode::CREATED, "{submitted}");
    let task_uuid = Uuid::parse_str(submitted["task"]["id"].as_str().unwrap()).unwrap();
    let stored = ctx.upload_dir().join(
        submitted["task"]["attachments"][0]["providerId"]
            .as_str()
            .unwrap(),
    );
    assert!(stored.exists());

    let (status, _) = ctx
        .json(
            "POST",
            &format!("/api/users/{}/delete", member.user.id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = ctx
        .json("GET", &format!("/api/tasks/{task_uuid}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(!stored.exists(), "uploads go with the deleted user");

    ctx.cleanup_users(&[&admin]).await;
}

#[tokio::test]
async fn test_oversized_upload_leaves_no_task() {
    let Some(ctx) = TestContext::with_max_file_size(1024).await else { return };

    let owner = ctx.create_user(UserRole::User).await;

    let (status, body) = ctx
        .submit(
            &owner,
            "Too big",
            &[
                ("small.png", "image/png", PNG.to_vec()),
                ("large.pdf", "application/pdf", vec![b'x'; 4096]),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, body) = ctx
        .submit(&owner, "Wrong type", &[("run.exe", "application/x-msdownload", b"MZ".to_vec())])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (_, mine) = ctx
        .json(
            "GET",
            &format!("/api/tasks/my-tasks/{}", owner.user.email),
            Some(&owner),
            None,
        )
        .await;
    assert!(mine["tasks"].as_array().unwrap().is_empty());

    ctx.cleanup_users(&[&owner]).await;
}

#[tokio::test]
async fn test_user_administration() {
    let Some(ctx) = TestContext::new().await else { return };

    let admin = ctx.create_user(UserRole::Admin).await;
    let other_admin = ctx.create_user(UserRole::Admin).await;
    let member = ctx.create_user(UserRole::User).await;

    let (status, _) = ctx.json("GET", "/api/users", Some(&member), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, listed) = ctx.json("GET", "/api/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!listed["users"].as_array().unwrap().is_empty());

    let member_uri = |action: &str| format!("/api/users/{}/{}", member.user.id, action);

    let (status, promoted) = ctx
        .json("POST", &member_uri("promote-supporter"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(promoted["user"]["role"], "supporter");

    let (status, _) = ctx
        .json("POST", &member_uri("promote-supporter"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "already a supporter");

    let (status, demoted) = ctx.json("POST", &member_uri("demote"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(demoted["user"]["role"], "user");

    let (status, _) = ctx.json("POST", &member_uri("demote"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "nothing to demote");

    let (status, _) = ctx
        .json(
            "POST",
            &format!("/api/users/{}/delete", other_admin.user.id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "admins cannot be deleted");

    let (status, _) = ctx.json("POST", &member_uri("delete"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = ctx.json("GET", "/api/users/me", Some(&member), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "deleted user's token is dead");

    ctx.cleanup_users(&[&admin, &other_admin]).await;
}

#[tokio::test]
async fn test_health() {
    let Some(ctx) = TestContext::new().await else { return };

    let (status, body) = ctx.json("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "connected");
}
