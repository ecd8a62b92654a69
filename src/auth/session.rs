//! Session management
//!
//! Uses encrypted, HMAC-signed tokens stored in cookies.
//! No server-side session storage needed.
//!
//! The payload is sealed with AES-256-GCM under a key derived from the
//! session secret, so the pending request token secret never appears in
//! the browser in readable form.

use std::collections::BTreeMap;

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Nonce};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::AppError;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";

/// Flash categories used by the settings pages
pub const FLASH_SETTINGS_ERROR: &str = "settings_error";
pub const FLASH_SETTINGS_SUCCESS: &str = "settings_success";

type HmacSha256 = Hmac<Sha256>;

const AES_GCM_NONCE_BYTES: usize = 12;
const ENCRYPTION_KEY_CONTEXT: &[u8] = b"osutweet session encryption";

/// Request token waiting for the provider callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthRequest {
    pub token: String,
    pub token_secret: String,
}

/// Per-browser session state
///
/// Stored in an encrypted, signed cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub authenticated: bool,
    /// Internal user ID once authenticated
    #[serde(default)]
    pub user_id: Option<String>,
    /// Set between `/connect/twitter` and its callback
    #[serde(default)]
    pub pending_auth: Option<PendingAuthRequest>,
    /// Queued one-time messages, by category
    #[serde(default)]
    pub flashes: BTreeMap<String, Vec<String>>,
    /// When session was created
    pub created_at: DateTime<Utc>,
    /// When session expires
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Fresh anonymous session
    pub fn new(max_age_seconds: i64) -> Self {
        let now = Utc::now();
        Self {
            authenticated: false,
            user_id: None,
            pending_auth: None,
            flashes: BTreeMap::new(),
            created_at: now,
            expires_at: now + Duration::seconds(max_age_seconds),
        }
    }

    /// Check if session is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }

    /// Authenticated and bound to a user
    pub fn is_authenticated(&self) -> bool {
        self.authenticated && self.user_id.is_some()
    }

    /// Bind the session to `user_id` and drop any pending handshake state
    pub fn login(&mut self, user_id: String) {
        self.authenticated = true;
        self.user_id = Some(user_id);
        self.pending_auth = None;
    }

    /// Reset to anonymous, keeping expiry
    pub fn logout(&mut self) {
        self.authenticated = false;
        self.user_id = None;
        self.pending_auth = None;
        self.flashes.clear();
    }

    /// Queue a flash message for the next rendered page
    pub fn add_flash(&mut self, category: &str, message: impl Into<String>) {
        self.flashes
            .entry(category.to_string())
            .or_default()
            .push(message.into());
    }

    /// Take and clear all flash messages of a category
    pub fn take_flashes(&mut self, category: &str) -> Vec<String> {
        self.flashes.remove(category).unwrap_or_default()
    }
}

/// AES-256 key derived from the session secret
fn session_cipher(secret: &str) -> Result<Aes256Gcm, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Encryption(e.to_string()))?;
    mac.update(ENCRYPTION_KEY_CONTEXT);
    let key = mac.finalize().into_bytes();
    // Qualified: `Mac::new_from_slice` shares the name.
    <Aes256Gcm as aes_gcm::aead::KeyInit>::new_from_slice(&key)
        .map_err(|_| AppError::Encryption("invalid session encryption key".to_string()))
}

fn seal(secret: &str, plaintext: &[u8]) -> Result<Vec<u8>, AppError> {
    let cipher = session_cipher(secret)?;

    let mut nonce = [0_u8; AES_GCM_NONCE_BYTES];
    rand::thread_rng().fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| AppError::Encryption("session encryption failed".to_string()))?;

    let mut out = Vec::with_capacity(AES_GCM_NONCE_BYTES + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

fn unseal(secret: &str, sealed: &[u8]) -> Option<Vec<u8>> {
    if sealed.len() <= AES_GCM_NONCE_BYTES {
        return None;
    }
    let (nonce, ciphertext) = sealed.split_at(AES_GCM_NONCE_BYTES);
    session_cipher(secret)
        .ok()?
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .ok()
}

/// Create an encrypted, signed session token
///
/// Token format: base64(nonce || aes_gcm(payload)).base64(hmac_sha256(...))
pub fn create_session_token(session: &Session, secret: &str) -> Result<String, AppError> {
    let payload = serde_json::to_vec(session)
        .map_err(|e| AppError::Session(format!("failed to serialize session: {e}")))?;
    let sealed = seal(secret, &payload)?;
    let payload_b64 = general_purpose::URL_SAFE_NO_PAD.encode(sealed);

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Encryption(e.to_string()))?;
    mac.update(payload_b64.as_bytes());
    let signature = mac.finalize().into_bytes();
    let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(signature);

    Ok(format!("{}.{}", payload_b64, signature_b64))
}

/// Why a session token was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRejection {
    Malformed,
    BadSignature,
    Expired,
}

/// Verify and decode a session token
///
/// # Errors
/// Returns the rejection reason if the signature is invalid, the token is
/// malformed, or the session has expired
pub fn verify_session_token(token: &str, secret: &str) -> Result<Session, SessionRejection> {
    let (payload_b64, signature_b64) = token
        .split_once('.')
        .ok_or(SessionRejection::Malformed)?;
    if signature_b64.contains('.') {
        return Err(SessionRejection::Malformed);
    }

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SessionRejection::Malformed)?;
    mac.update(payload_b64.as_bytes());

    let signature = general_purpose::URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| SessionRejection::Malformed)?;
    mac.verify_slice(&signature)
        .map_err(|_| SessionRejection::BadSignature)?;

    let sealed = general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| SessionRejection::Malformed)?;
    let payload_bytes = unseal(secret, &sealed).ok_or(SessionRejection::Malformed)?;
    let session: Session =
        serde_json::from_slice(&payload_bytes).map_err(|_| SessionRejection::Malformed)?;

    if session.is_expired() {
        return Err(SessionRejection::Expired);
    }

    Ok(session)
}

/// Cookie-backed session store
///
/// Loading never fails: a missing or unusable cookie starts a new anonymous
/// session. Persisting produces the `Set-Cookie` for the response.
#[derive(Clone)]
pub struct CookieSessionStore {
    secret: String,
    max_age_seconds: i64,
    secure: bool,
}

impl std::fmt::Debug for CookieSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieSessionStore")
            .field("secret", &"<redacted>")
            .field("max_age_seconds", &self.max_age_seconds)
            .field("secure", &self.secure)
            .finish()
    }
}

impl CookieSessionStore {
    pub fn new(secret: impl Into<String>, max_age_seconds: i64, secure: bool) -> Self {
        Self {
            secret: secret.into(),
            max_age_seconds,
            secure,
        }
    }

    /// Decode the session carried by the request cookies
    pub fn load(&self, jar: &CookieJar) -> Session {
        let Some(cookie) = jar.get(SESSION_COOKIE) else {
            return Session::new(self.max_age_seconds);
        };

        match verify_session_token(cookie.value(), &self.secret) {
            Ok(session) => session,
            Err(SessionRejection::Expired) => {
                tracing::debug!("Session cookie expired; starting a new session");
                Session::new(self.max_age_seconds)
            }
            Err(rejection) => {
                tracing::warn!(?rejection, "Discarding unusable session cookie");
                Session::new(self.max_age_seconds)
            }
        }
    }

    /// Write the session into the cookie jar
    pub fn persist(&self, session: &Session, jar: CookieJar) -> Result<CookieJar, AppError> {
        let token = create_session_token(session, &self.secret)?;
        let cookie = Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .build();
        Ok(jar.add(cookie))
    }

    /// Remove the session cookie
    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        let mut cookie = Cookie::build((SESSION_COOKIE, String::new()))
            .path("/")
            .http_only(true)
            .build();
        cookie.make_removal();
        jar.remove(cookie)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-32-bytes-long!!!";

    fn pending_session() -> Session {
        let mut session = Session::new(3600);
        session.pending_auth = Some(PendingAuthRequest {
            token: "request-token".to_string(),
            token_secret: "request-secret".to_string(),
        });
        session
    }

    #[test]
    fn token_roundtrip_preserves_pending_request() {
        let session = pending_session();
        let token = create_session_token(&session, SECRET).unwrap();
        let decoded = verify_session_token(&token, SECRET).unwrap();
        assert_eq!(decoded, session);
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let token = create_session_token(&pending_session(), SECRET).unwrap();
        let (_, signature) = token.split_once('.').unwrap();

        let mut forged = Session::new(3600);
        forged.login("someone-else".to_string());
        let forged_payload = general_purpose::URL_SAFE_NO_PAD
            .encode(serde_json::to_string(&forged).unwrap().as_bytes());

        let result = verify_session_token(&format!("{forged_payload}.{signature}"), SECRET);
        assert_eq!(result.unwrap_err(), SessionRejection::BadSignature);
    }

    fn sign(payload_b64: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(payload_b64.as_bytes());
        general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    #[test]
    fn token_does_not_expose_request_secret() {
        let token = create_session_token(&pending_session(), SECRET).unwrap();
        let (payload_b64, _) = token.split_once('.').unwrap();
        let payload = general_purpose::URL_SAFE_NO_PAD.decode(payload_b64).unwrap();

        for needle in [&b"request-secret"[..], b"token_secret", b"pending_auth"] {
            assert!(!payload.windows(needle.len()).any(|window| window == needle));
        }
    }

    #[test]
    fn tokens_use_fresh_nonces() {
        let session = pending_session();
        let first = create_session_token(&session, SECRET).unwrap();
        let second = create_session_token(&session, SECRET).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn signed_plaintext_payload_is_rejected() {
        let payload_b64 = general_purpose::URL_SAFE_NO_PAD
            .encode(serde_json::to_vec(&pending_session()).unwrap());
        let token = format!("{payload_b64}.{}", sign(&payload_b64));

        assert_eq!(
            verify_session_token(&token, SECRET).unwrap_err(),
            SessionRejection::Malformed
        );
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = create_session_token(&pending_session(), SECRET).unwrap();
        let result = verify_session_token(&token, "another-secret-that-is-32-bytes!");
        assert_eq!(result.unwrap_err(), SessionRejection::BadSignature);
    }

    #[test]
    fn expired_session_is_rejected() {
        let session = Session::new(-10);
        let token = create_session_token(&session, SECRET).unwrap();
        assert_eq!(
            verify_session_token(&token, SECRET).unwrap_err(),
            SessionRejection::Expired
        );
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        for token in ["", "no-dot", "a.b.c", "!!!.???"] {
            assert_eq!(
                verify_session_token(token, SECRET).unwrap_err(),
                SessionRejection::Malformed,
                "token {token:?}"
            );
        }
    }

    #[test]
    fn login_clears_pending_request() {
        let mut session = pending_session();
        session.login("user-1".to_string());
        assert!(session.is_authenticated());
        assert!(session.pending_auth.is_none());
    }

    #[test]
    fn flashes_are_consumed_once() {
        let mut session = Session::new(3600);
        session.add_flash(FLASH_SETTINGS_ERROR, "Invalid mode");
        session.add_flash(FLASH_SETTINGS_ERROR, "Error parsing form");

        assert_eq!(
            session.take_flashes(FLASH_SETTINGS_ERROR),
            vec!["Invalid mode", "Error parsing form"]
        );
        assert!(session.take_flashes(FLASH_SETTINGS_ERROR).is_empty());
        assert!(session.take_flashes(FLASH_SETTINGS_SUCCESS).is_empty());
    }

    #[test]
    fn store_falls_back_to_anonymous_session_for_bad_cookie() {
        let store = CookieSessionStore::new(SECRET, 3600, false);
        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, "garbage"));
        let session = store.load(&jar);
        assert!(!session.is_authenticated());
        assert!(session.pending_auth.is_none());
    }

    #[test]
    fn store_persist_then_load_roundtrips() {
        let store = CookieSessionStore::new(SECRET, 3600, true);
        let session = pending_session();
        let jar = store.persist(&session, CookieJar::new()).unwrap();

        let cookie = jar.get(SESSION_COOKIE).expect("session cookie");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(store.load(&jar), session);
    }
}
