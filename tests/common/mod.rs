//! Common test utilities for E2E tests
//!
//! The server runs with in-process fakes for Twitter and the osu! API.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use osutweet::auth::session::PendingAuthRequest;
use osutweet::auth::{AccessCredential, ExternalIdentity, ProviderClient, RequestToken};
use osutweet::data::GameMode;
use osutweet::error::AppError;
use osutweet::osu::{OsuApi, OsuUserStats};
use osutweet::{AppState, config};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const CALLBACK_URL: &str = "http://localhost:8080/connect/twitter/callback";
pub const GOOD_VERIFIER: &str = "good-verifier";
pub const KNOWN_PLAYER: &str = "Cookiezi";
pub const BROKEN_PLAYER: &str = "broken";

/// Twitter stand-in
///
/// Issues `req-1`, `req-2`, ... as request tokens and accepts only
/// [`GOOD_VERIFIER`].
#[derive(Default)]
pub struct FakeTwitter {
    issued: AtomicUsize,
    pub exchanges: AtomicUsize,
    pub callbacks: Mutex<Vec<String>>,
}

#[async_trait]
impl ProviderClient for FakeTwitter {
    async fn request_token(&self, callback_url: &str) -> Result<RequestToken, AppError> {
        self.callbacks.lock().unwrap().push(callback_url.to_string());
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let token = format!("req-{n}");
        Ok(RequestToken {
            authorize_url: format!("https://twitter.test/oauth/authenticate?oauth_token={token}"),
            token_secret: format!("{token}-secret"),
            token,
        })
    }

    async fn exchange_token(
        &self,
        request: &PendingAuthRequest,
        verifier: &str,
    ) -> Result<AccessCredential, AppError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        if verifier != GOOD_VERIFIER {
            return Err(AppError::Provider("access_token: HTTP 401".to_string()));
        }
        Ok(AccessCredential {
            token: format!("access-for-{}", request.token),
            secret: "access-secret".to_string(),
        })
    }

    async fn fetch_profile(
        &self,
        _credential: &AccessCredential,
    ) -> Result<ExternalIdentity, AppError> {
        Ok(ExternalIdentity {
            provider_user_id: "42".to_string(),
            screen_name: "cookiezi".to_string(),
            display_name: "Cookiezi".to_string(),
            avatar_url: None,
        })
    }
}

/// osu! API stand-in: knows [`KNOWN_PLAYER`], fails for [`BROKEN_PLAYER`]
#[derive(Default)]
pub struct FakeOsu {
    pub lookups: AtomicUsize,
}

#[async_trait]
impl OsuApi for FakeOsu {
    async fn get_user(
        &self,
        username: &str,
        mode: GameMode,
    ) -> Result<Option<OsuUserStats>, AppError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        match username {
            KNOWN_PLAYER => Ok(Some(
                serde_json::from_value(serde_json::json!({
                    "user_id": "124493",
                    "username": KNOWN_PLAYER,
                    "playcount": (1000 + mode.as_i64()).to_string(),
                    "pp_raw": "13000.5",
                    "country": "KR"
                }))
                .unwrap(),
            )),
            BROKEN_PLAYER => Err(AppError::Provider("osu! API down".to_string())),
            _ => Ok(None),
        }
    }
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    /// Client that does not follow redirects
    pub client: reqwest::Client,
    pub twitter: Arc<FakeTwitter>,
    pub osu: Arc<FakeOsu>,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                domain: "localhost:8080".to_string(),
                environment: "development".to_string(),
            },
            database: config::DatabaseConfig {
                path: db_path,
                max_connections: 5,
                acquire_timeout_seconds: 10,
            },
            auth: config::AuthConfig {
                session_secret: "test-secret-key-32-bytes-long!!!".to_string(),
                session_max_age: 604800,
            },
            twitter: config::TwitterConfig {
                consumer_key: "consumer-key".to_string(),
                consumer_secret: "consumer-secret".to_string(),
                oauth_base_url: "https://twitter.test/oauth".to_string(),
                api_base_url: "https://twitter.test/1.1".to_string(),
            },
            osu: config::OsuConfig {
                api_key: "osu-key".to_string(),
                api_base_url: "https://osu.test/api".to_string(),
            },
            http: config::HttpConfig {
                timeout_seconds: 5,
                user_agent: "osutweet-test".to_string(),
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        let twitter = Arc::new(FakeTwitter::default());
        let osu = Arc::new(FakeOsu::default());
        let state = AppState::with_clients(config, twitter.clone(), osu.clone())
            .await
            .unwrap();

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = osutweet::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait a bit for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Self {
            addr: addr_str,
            state,
            _temp_dir: temp_dir,
            client,
            twitter,
            osu,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// GET with an optional session cookie
    pub async fn get(&self, path: &str, cookie: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(self.url(path));
        if let Some(cookie) = cookie {
            request = request.header("cookie", cookie);
        }
        request.send().await.unwrap()
    }

    /// POST a urlencoded form with an optional session cookie
    pub async fn post_form(
        &self,
        path: &str,
        cookie: Option<&str>,
        form: &[(&str, &str)],
    ) -> reqwest::Response {
        let mut request = self.client.post(self.url(path)).form(form);
        if let Some(cookie) = cookie {
            request = request.header("cookie", cookie);
        }
        request.send().await.unwrap()
    }

    /// Start the handshake; returns the session cookie and request token
    pub async fn start_login(&self, cookie: Option<&str>) -> (String, String) {
        let response = self.get("/connect/twitter", cookie).await;
        assert_eq!(response.status(), 302);
        let token = location(&response)
            .split("oauth_token=")
            .nth(1)
            .expect("authorize url carries the token")
            .to_string();
        let cookie = session_cookie(&response).expect("session cookie is set");
        (cookie, token)
    }

    /// Run the whole handshake; returns the signed-in session cookie
    pub async fn login(&self) -> String {
        let (cookie, token) = self.start_login(None).await;
        let response = self
            .get(
                &format!(
                    "/connect/twitter/callback?oauth_token={token}&oauth_verifier={GOOD_VERIFIER}"
                ),
                Some(&cookie),
            )
            .await;
        assert_eq!(response.status(), 302);
        assert_eq!(location(&response), "/");
        session_cookie(&response).expect("signed-in session cookie")
    }
}

/// `Location` header of a redirect
pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .expect("location header")
        .to_string()
}

/// `session=...` pair from the response's `Set-Cookie`, if any
pub fn session_cookie(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .find(|pair| pair.starts_with("session="))
        .map(ToString::to_string)
}
