use crate::error::{AppError, AppResult};
use axum::http::HeaderValue;
use base64::prelude::BASE64_URL_SAFE_NO_PAD;
use base64::Engine;
use rand::{Rng, RngCore};
use sha3::{Digest, Sha3_256};
use std::env;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::timeout;
use url::Url;
use validator::ValidationError;

const SHORT_CODE_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";
const SESSION_TOKEN_BYTES: usize = 32;

pub async fn with_timeout<F: Future>(duration: Duration, task: F) -> AppResult<F::Output> {
    timeout(duration, task)
        .await
        .map_err(|elapsed| AppError::Internal(format!("Store call timed out: {elapsed}")))
}

pub fn get_env(name: &str) -> Result<String, String> {
    env::var(name).map_err(|_| format!("Environment variable {} is required", name))
}

pub fn get_env_or<T: FromStr>(name: &str, default: T) -> Result<T, String> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| format!("Environment variable {} has an invalid value: {}", name, value)),
        Err(_) => Ok(default),
    }
}

pub fn generate_short_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| SHORT_CODE_ALPHABET[rng.gen_range(0..SHORT_CODE_ALPHABET.len())] as char)
        .collect()
}

pub fn generate_session_token() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Accepts absolute urls that can be sent back verbatim in a `Location` header.
/// Host-less uris (`mailto:`, `data:`) are refused since a browser cannot be
/// redirected to them.
pub fn validate_target_url(text: &str) -> Result<(), ValidationError> {
    match Url::parse(text) {
        Ok(url) if url.has_host() && text.is_ascii() && HeaderValue::from_str(text).is_ok() => {
            Ok(())
        }
        _ => Err(ValidationError::new("url").with_message("must be a valid uri".into())),
    }
}
