#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::{
    async_trait,
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt;

use campushub_server::{
    build_router,
    config::{Config, MatcherConfig, OAuthConfig},
    db::Database,
    error::{AppError, Result},
    handlers::ws::ChangeFeed,
    services::{
        mailer::Mailer,
        matcher::{MatchingService, TextGenerator},
        oauth::{AuthorizationRequest, ExternalIdentity, IdentityProvider, OAuthProvider},
        storage::MediaStore,
    },
    AppState,
};
use uuid::Uuid;

pub const PASSWORD: &str = "hunter22";

/// Stands in for the hosted model.
pub struct StubGenerator;

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Ok(r#"{"recommendedOpportunities": "Team Ferris", "reasoning": "Strong Rust background"}"#
            .to_string())
    }
}

/// Keeps every reset link instead of sending it.
#[derive(Default)]
pub struct CapturingMailer {
    pub sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send_password_reset(&self, email: &str, link: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((email.to_string(), link.to_string()));
        Ok(())
    }
}

pub const GOOD_CODE: &str = "good-code";
pub const PROVIDER_EMAIL: &str = "octo@campus.edu";

/// Accepts only `GOOD_CODE` and always vouches for `PROVIDER_EMAIL`.
pub struct StubIdentity;

#[async_trait]
impl IdentityProvider for StubIdentity {
    fn authorize(&self, provider: OAuthProvider) -> Result<AuthorizationRequest> {
        let state = Uuid::new_v4().to_string();
        Ok(AuthorizationRequest {
            url: format!("https://{}.test/authorize?state={state}", provider.as_str()),
            state,
            pkce_verifier: "verifier".to_string(),
        })
    }

    async fn exchange(
        &self,
        _provider: OAuthProvider,
        code: &str,
        pkce_verifier: &str,
    ) -> Result<ExternalIdentity> {
        if code != GOOD_CODE || pkce_verifier != "verifier" {
            return Err(AppError::Upstream("code rejected".to_string()));
        }
        Ok(ExternalIdentity {
            email: PROVIDER_EMAIL.to_string(),
            name: "Octo Cat".to_string(),
        })
    }
}

pub struct TestApp {
    router: Router,
    pub db: Database,
    pub feed: ChangeFeed,
    pub mailer: Arc<CapturingMailer>,
    media: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let media_dir = tempfile::tempdir().unwrap();

        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.run_migrations().await.unwrap();

        let config = Config {
            port: 0,
            database_url: "sqlite::memory:".to_string(),
            media_path: media_dir.path().display().to_string(),
            jwt_secret: "test-secret".to_string(),
            token_ttl_days: 1,
            public_url: "https://campushub.test".to_string(),
            matcher: MatcherConfig {
                base_url: "http://localhost".to_string(),
                model: "test".to_string(),
                api_key: None,
                timeout_secs: 1,
            },
            oauth: OAuthConfig::default(),
        };

        let feed = ChangeFeed::new();
        let mailer = Arc::new(CapturingMailer::default());

        let state = AppState {
            db: db.clone(),
            config,
            feed: feed.clone(),
            media: MediaStore::new(media_dir.path()),
            matcher: MatchingService::new(Arc::new(StubGenerator)),
            mailer: mailer.clone(),
            identity: Arc::new(StubIdentity),
        };

        Self {
            router: build_router(state),
            db,
            feed,
            mailer,
            media: media_dir,
        }
    }

    /// Disk location of a `/media/...` URL.
    pub fn media_file(&self, url: &str) -> PathBuf {
        self.media
            .path()
            .join(url.trim_start_matches("/media/"))
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, value)
    }

    /// Raw bytes of a response, for static and media files.
    pub async fn get_bytes(&self, uri: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    /// Posts a single-file multipart form.
    pub async fn upload(
        &self,
        uri: &str,
        token: &str,
        file_name: &str,
        data: &[u8],
    ) -> (StatusCode, Value) {
        let boundary = "campushub-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();

        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    /// Registers an account and returns `(token, user id)`.
    pub async fn register(&self, email: &str, role: &str) -> (String, String) {
        let (status, body) = self
            .post(
                "/api/auth/register",
                None,
                json!({ "email": email, "password": PASSWORD, "role": role }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");

        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    pub async fn create_hackathon(&self, token: &str, title: &str, mode: &str) -> String {
        let (status, body) = self
            .post(
                "/api/hackathons",
                Some(token),
                json!({
                    "title": title,
                    "organizer": "Campus Devs",
                    "date": "Oct 26-28, 2024",
                    "location": "Main Hall",
                    "mode": mode,
                    "techStack": ["Rust", "WebAssembly"],
                    "prize": "$5,000",
                    "description": "Build something fast."
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create hackathon failed: {body}");
        body["id"].as_str().unwrap().to_string()
    }
}
