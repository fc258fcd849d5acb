//! API Integration Tests
//!
//! Every test runs a real HTTP server over in-memory fakes, except the
//! PostgreSQL test at the end, which requires `DATABASE_URL`.
//!
//! Run with: cargo test -p integration-tests --test api_tests

use std::sync::Arc;

use integration_tests::{
    assert_json, assert_status, check_test_env, fixtures::*, TestServer,
};
use modmail_core::{MessageTarget, Snowflake, SnowflakeGenerator};
use modmail_db::{create_pool, run_migrations, DatabaseConfig, PgThreadRepository};
use modmail_service::testing::{test_settings, MemoryAuditSink, RecordingTransport};
use modmail_service::ThreadRegistry;
use reqwest::StatusCode;

async fn open_thread(server: &TestServer, user_id: i64, content: &str) -> DeliveryResponse {
    let response = server
        .post_auth("/api/v1/events/direct-message", &DirectMessage::new(user_id, content))
        .await
        .unwrap();
    assert_json(response, StatusCode::OK).await.unwrap()
}

async fn command(server: &TestServer, event: &StaffCommand) -> CommandReply {
    let response = server
        .post_auth("/api/v1/events/staff-command", event)
        .await
        .unwrap();
    assert_json(response, StatusCode::OK).await.unwrap()
}

// ============================================================================
// Health Check Tests
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::start().await.expect("Failed to start server");
    let response = server.get("/health").await.expect("Request failed");
    assert_status(response, StatusCode::OK).await.unwrap();
}

#[tokio::test]
async fn test_health_ready() {
    let server = TestServer::start().await.expect("Failed to start server");
    let response = server.get("/health/ready").await.expect("Request failed");
    assert_status(response, StatusCode::OK).await.unwrap();
}

// ============================================================================
// Auth Tests
// ============================================================================

#[tokio::test]
async fn test_ingress_requires_token() {
    let server = TestServer::start().await.expect("Failed to start server");

    let response = server
        .post("/api/v1/events/direct-message", &DirectMessage::new(unique_user_id(), "hi"))
        .await
        .unwrap();
    let body: ErrorResponse = assert_json(response, StatusCode::UNAUTHORIZED).await.unwrap();
    assert_eq!(body.error.code, "MISSING_AUTHORIZATION");
    assert_eq!(server.transport().create_count(), 0);
}

// ============================================================================
// Thread Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_full_thread_lifecycle() {
    let server = TestServer::start().await.expect("Failed to start server");
    let user_id = unique_user_id();

    // First DM opens a thread
    let first = open_thread(&server, user_id, "I need help").await;
    assert!(first.opened);
    assert_eq!(first.thread.status, "active");
    assert_eq!(first.thread.user_id, user_id.to_string());
    let channel_id = first.thread.channel_id.clone();

    // A second DM lands in the same thread
    let again = open_thread(&server, user_id, "Anyone there?").await;
    assert!(!again.opened);
    assert_eq!(again.thread.channel_id, channel_id);

    // Staff claim it
    let reply = command(&server, &StaffCommand::new("claim", &channel_id)).await;
    assert!(reply.success, "{}", reply.message);
    assert_eq!(reply.message, format!("Thread claimed by <@{STAFF_ID}>."));

    // A second claim by someone else is refused
    let reply = command(&server, &StaffCommand::new("claim", &channel_id).by(8)).await;
    assert!(!reply.success);
    assert!(reply.message.contains("already claimed"));

    // Reply reaches the user
    let reply = command(
        &server,
        &StaffCommand::new("reply", &channel_id).arg("Looking").arg("now"),
    )
    .await;
    assert!(reply.success, "{}", reply.message);
    let dms = server
        .transport()
        .messages_to(MessageTarget::User(Snowflake::new(user_id)));
    assert!(dms.iter().any(|m| m.ends_with("Looking now")));

    // Close through a raw staff message
    let response = server
        .post_auth("/api/v1/events/staff-message", &StaffMessage::new(&channel_id, "?close"))
        .await
        .unwrap();
    let reply: CommandReply = assert_json(response, StatusCode::OK).await.unwrap();
    assert!(reply.success);

    let response = server
        .get_auth(&format!("/api/v1/threads/{channel_id}"))
        .await
        .unwrap();
    let closed: ThreadResponse = assert_json(response, StatusCode::OK).await.unwrap();
    assert_eq!(closed.status, "closed");
    assert!(closed.closed_at.is_some());

    let response = server
        .get_auth(&format!("/api/v1/users/{user_id}/thread"))
        .await
        .unwrap();
    assert_status(response, StatusCode::NOT_FOUND).await.unwrap();

    // The next DM opens a fresh thread in a new channel
    let second = open_thread(&server, user_id, "One more thing").await;
    assert!(second.opened);
    assert_ne!(second.thread.channel_id, channel_id);
    assert_ne!(second.thread.id, first.thread.id);
}

#[tokio::test]
async fn test_thread_queries() {
    let server = TestServer::start().await.expect("Failed to start server");
    let user_id = unique_user_id();
    let delivery = open_thread(&server, user_id, "hello").await;

    let response = server
        .get_auth(&format!("/api/v1/users/{user_id}/thread"))
        .await
        .unwrap();
    let thread: ThreadResponse = assert_json(response, StatusCode::OK).await.unwrap();
    assert_eq!(thread.channel_id, delivery.thread.channel_id);
    assert!(thread.claimed_by.is_none());
    assert!(!thread.locked);

    let response = server.get_auth("/api/v1/threads").await.unwrap();
    let list: DataResponse<Vec<ThreadResponse>> = assert_json(response, StatusCode::OK).await.unwrap();
    assert!(list.data.iter().any(|t| t.id == delivery.thread.id));

    let response = server.get_auth("/api/v1/users/1/thread").await.unwrap();
    let body: ErrorResponse = assert_json(response, StatusCode::NOT_FOUND).await.unwrap();
    assert_eq!(body.error.code, "NO_OPEN_THREAD");
}

#[tokio::test]
async fn test_concurrent_first_messages_open_one_thread() {
    let server = Arc::new(TestServer::start().await.expect("Failed to start server"));
    let user_id = unique_user_id();

    let mut handles = Vec::new();
    for i in 0..5 {
        let server = Arc::clone(&server);
        handles.push(tokio::spawn(async move {
            open_thread(&server, user_id, &format!("message {i}")).await
        }));
    }

    let mut opened = 0;
    let mut channels = Vec::new();
    for handle in handles {
        let delivery = handle.await.unwrap();
        if delivery.opened {
            opened += 1;
        }
        channels.push(delivery.thread.channel_id);
    }

    assert_eq!(opened, 1);
    channels.dedup();
    assert_eq!(channels.len(), 1);
    assert_eq!(server.transport().create_count(), 1);
}

#[tokio::test]
async fn test_command_outside_thread() {
    let server = TestServer::start().await.expect("Failed to start server");
    let reply = command(&server, &StaffCommand::new("close", "123456")).await;
    assert!(!reply.success);
    assert!(reply.message.contains("not a modmail thread"));
}

#[tokio::test]
async fn test_empty_direct_message_rejected() {
    let server = TestServer::start().await.expect("Failed to start server");
    let response = server
        .post_auth("/api/v1/events/direct-message", &DirectMessage::new(unique_user_id(), ""))
        .await
        .unwrap();
    let body: ErrorResponse = assert_json(response, StatusCode::BAD_REQUEST).await.unwrap();
    assert_eq!(body.error.code, "VALIDATION_ERROR");
}

// ============================================================================
// Persistence Tests (PostgreSQL)
// ============================================================================

fn registry_over(
    repo: Arc<PgThreadRepository>,
    transport: Arc<RecordingTransport>,
    worker_id: u16,
) -> ThreadRegistry {
    ThreadRegistry::new(
        test_settings(),
        repo,
        transport,
        Arc::new(MemoryAuditSink::new()),
        Arc::new(SnowflakeGenerator::new(worker_id)),
    )
}

#[tokio::test]
async fn test_threads_survive_restart_with_postgres() {
    if !check_test_env() {
        return;
    }

    let url = std::env::var("DATABASE_URL").unwrap();
    let pool = create_pool(&DatabaseConfig::new(url)).await.unwrap();
    run_migrations(&pool).await.unwrap();
    let repo = Arc::new(PgThreadRepository::new(pool));
    let transport = Arc::new(RecordingTransport::new());

    // Ids far from other tests' users, since the database is shared
    let user_id = Snowflake::new(9_000_000 + unique_user_id());

    let before = registry_over(Arc::clone(&repo), Arc::clone(&transport), 601);
    let thread = before.route_inbound(user_id, "persist me").await.unwrap().thread;
    before.claim(thread.channel_id, Snowflake::new(STAFF_ID)).await.unwrap();

    let after = registry_over(Arc::clone(&repo), Arc::clone(&transport), 602);
    let report = after.reconcile().await.unwrap();
    assert!(report.loaded >= 1);

    let restored = after.resolve_by_user(user_id).await.unwrap();
    assert_eq!(restored.id, thread.id);
    assert_eq!(restored.claimed_by, Some(Snowflake::new(STAFF_ID)));

    after.close(thread.channel_id, Snowflake::new(STAFF_ID)).await.unwrap();
}
