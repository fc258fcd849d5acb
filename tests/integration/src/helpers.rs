//! Test helpers for integration tests
//!
//! Provides utilities for spawning test servers and making HTTP requests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use modmail_api::{create_app, AppState};
use modmail_common::AppConfig;
use modmail_service::testing::{RecordingTransport, TestHarness};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Ingress token configured on every test server
pub const TEST_INGRESS_TOKEN: &str = "integration-secret";

/// Test server instance that manages lifecycle
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    pub harness: TestHarness,
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a new test server over fresh in-memory fakes
    pub async fn start() -> Result<Self> {
        Self::start_with_harness(TestHarness::new()).await
    }

    /// Start a test server around an existing harness
    pub async fn start_with_harness(harness: TestHarness) -> Result<Self> {
        let state = AppState::new(harness.ctx.clone(), test_config()?);
        let app = create_app(state);

        // Port 0 lets the OS pick a free port
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            addr,
            client,
            harness,
            _handle: handle,
        })
    }

    /// Get base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// The fake Discord the server talks to
    pub fn transport(&self) -> Arc<RecordingTransport> {
        Arc::clone(&self.harness.transport)
    }

    /// Make a GET request without credentials
    pub async fn get(&self, path: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.get(&url).send().await?)
    }

    /// Make a GET request with the ingress token
    pub async fn get_auth(&self, path: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self
            .client
            .get(&url)
            .bearer_auth(TEST_INGRESS_TOKEN)
            .send()
            .await?)
    }

    /// Make a POST request with JSON body and no credentials
    pub async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.post(&url).json(body).send().await?)
    }

    /// Make a POST request with the ingress token
    pub async fn post_auth<T: Serialize>(&self, path: &str, body: &T) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self
            .client
            .post(&url)
            .bearer_auth(TEST_INGRESS_TOKEN)
            .json(body)
            .send()
            .await?)
    }
}

/// Configuration for test servers; nothing is read from the environment
pub fn test_config() -> Result<AppConfig> {
    let config = AppConfig::from_lookup(|key| {
        let value = match key {
            "DISCORD_TOKEN" => "test-token",
            "STAFF_GUILD_ID" => "1",
            "LOG_CHANNEL_ID" => "2",
            "CATEGORY_ACTIVE_ID" => "100",
            "CATEGORY_CLAIMED_ID" => "101",
            "CATEGORY_ARCHIVE_ID" => "102",
            "INGRESS_TOKEN" => TEST_INGRESS_TOKEN,
            _ => return None,
        };
        Some(value.to_string())
    })
    .map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    Ok(config)
}

/// Helper to check if a PostgreSQL instance is available
pub fn check_test_env() -> bool {
    dotenvy::dotenv().ok();

    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("Skipping test: DATABASE_URL not set");
        return false;
    }

    true
}

/// Assert response status and parse JSON body
pub async fn assert_json<T: DeserializeOwned>(response: Response, expected_status: StatusCode) -> Result<T> {
    let status = response.status();
    if status != expected_status {
        let body = response.text().await?;
        anyhow::bail!(
            "Expected status {}, got {}. Body: {}",
            expected_status,
            status,
            body
        );
    }
    Ok(response.json().await?)
}

/// Assert response status without parsing body
pub async fn assert_status(response: Response, expected_status: StatusCode) -> Result<()> {
    let status = response.status();
    if status != expected_status {
        let body = response.text().await?;
        anyhow::bail!(
            "Expected status {}, got {}. Body: {}",
            expected_status,
            status,
            body
        );
    }
    Ok(())
}
