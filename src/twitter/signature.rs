//! OAuth 1.0a request signing (HMAC-SHA1)
//!
//! Implements the signature base string and `Authorization: OAuth ...`
//! header construction from RFC 5849 section 3.4.

use base64::{Engine as _, engine::general_purpose};
use hmac::{Hmac, Mac};
use rand::{Rng, distributions::Alphanumeric};
use sha1::Sha1;

use crate::error::AppError;

type HmacSha1 = Hmac<Sha1>;

/// RFC 3986 percent-encoding, as OAuth requires
pub fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Random nonce for one request
pub fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Credentials used to sign one request
#[derive(Debug, Clone, Copy)]
pub struct Signer<'a> {
    pub consumer_key: &'a str,
    pub consumer_secret: &'a str,
    /// Request or access token, absent when asking for a request token
    pub token: Option<&'a str>,
    pub token_secret: &'a str,
}

impl Signer<'_> {
    /// Build the `Authorization` header value
    ///
    /// `url` must not carry a query string; query and form parameters go in
    /// `request_params`. `oauth_extra` holds protocol parameters such as
    /// `oauth_callback` or `oauth_verifier`.
    pub fn authorization_header(
        &self,
        method: &str,
        url: &str,
        request_params: &[(&str, &str)],
        oauth_extra: &[(&str, &str)],
        nonce: &str,
        timestamp: i64,
    ) -> Result<String, AppError> {
        let timestamp = timestamp.to_string();
        let mut oauth_params: Vec<(&str, &str)> = vec![
            ("oauth_consumer_key", self.consumer_key),
            ("oauth_nonce", nonce),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", timestamp.as_str()),
            ("oauth_version", "1.0"),
        ];
        if let Some(token) = self.token {
            oauth_params.push(("oauth_token", token));
        }
        oauth_params.extend_from_slice(oauth_extra);

        let signature = self.sign(method, url, request_params, &oauth_params)?;

        let mut header_params: Vec<(String, String)> = oauth_params
            .iter()
            .map(|(key, value)| (percent_encode(key), percent_encode(value)))
            .collect();
        header_params.push((
            "oauth_signature".to_string(),
            percent_encode(&signature),
        ));
        header_params.sort();

        let fields = header_params
            .iter()
            .map(|(key, value)| format!("{key}=\"{value}\""))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("OAuth {fields}"))
    }

    /// Compute the base64 HMAC-SHA1 signature for a request
    pub fn sign(
        &self,
        method: &str,
        url: &str,
        request_params: &[(&str, &str)],
        oauth_params: &[(&str, &str)],
    ) -> Result<String, AppError> {
        let base = signature_base_string(method, url, request_params, oauth_params);
        let key = format!(
            "{}&{}",
            percent_encode(self.consumer_secret),
            percent_encode(self.token_secret)
        );

        let mut mac = HmacSha1::new_from_slice(key.as_bytes())
            .map_err(|e| AppError::Encryption(e.to_string()))?;
        mac.update(base.as_bytes());
        Ok(general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
    }
}

/// `METHOD&encoded-url&encoded-sorted-params`
pub fn signature_base_string(
    method: &str,
    url: &str,
    request_params: &[(&str, &str)],
    oauth_params: &[(&str, &str)],
) -> String {
    let mut params: Vec<(String, String)> = request_params
        .iter()
        .chain(oauth_params)
        .map(|(key, value)| (percent_encode(key), percent_encode(value)))
        .collect();
    params.sort();

    let normalized = params
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(url),
        percent_encode(&normalized)
    )
}
