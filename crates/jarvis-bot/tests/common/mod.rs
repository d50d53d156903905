use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use jarvis_bot::build_app;
use jarvis_bot::config::{AuthFileConfig, BotConfig};
use jarvis_core::Coordinator;
use jarvis_core::provider::ProviderClient;
use jarvis_core::sink::NotificationSink;
use jarvis_core::test_helpers::{FakeProvider, RecordingSink};

pub struct TestServer {
    pub addr: SocketAddr,
    pub sink: Arc<RecordingSink>,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server with no auth and no webhook signature requirement.
    pub async fn new() -> Self {
        Self::from_auth(AuthFileConfig {
            require_webhook_signature: false,
            ..AuthFileConfig::default()
        })
        .await
    }

    /// Start a test server with default auth: no secret, signatures required.
    pub async fn with_default_auth() -> Self {
        Self::from_auth(AuthFileConfig::default()).await
    }

    /// Start a test server with bearer token and webhook secret.
    pub async fn with_auth(token: &str, webhook_secret: &str) -> Self {
        Self::from_auth(AuthFileConfig {
            bearer_token: Some(token.to_string()),
            github_webhook_secret: Some(webhook_secret.to_string()),
            require_webhook_signature: true,
        })
        .await
    }

    async fn from_auth(auth: AuthFileConfig) -> Self {
        let config = BotConfig {
            auth,
            ..BotConfig::default()
        };
        let sink = Arc::new(RecordingSink::default());
        let coordinator = Arc::new(Coordinator::new(
            Arc::new(FakeProvider::default()) as Arc<dyn ProviderClient>,
            Arc::clone(&sink) as Arc<dyn NotificationSink>,
        ));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, _state) = build_app(&config, coordinator);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            sink,
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

/// Compute the `X-Hub-Signature-256` header value for `body`.
pub fn sign_webhook(secret: &str, body: &[u8]) -> String {
    let mut mac = <Hmac<Sha256>>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}
