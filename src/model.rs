use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::utils::validate_target_url;

#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub name: String,
    pub password_hash: String,
}

/// Server-side half of a bearer token. Only the digest of the token is kept.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub token_hash: String,
    pub account_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Link {
    pub id: i64,
    pub short_code: String,
    pub target_url: String,
    pub owner_id: i64,
    pub visit_count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    pub id: i64,
    pub name: String,
    pub links_count: i64,
    pub visit_count: i64,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct SignUpRequest {
    #[validate(email(message = "must be a valid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "must match password"))]
    pub confirm_password: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct SignInRequest {
    #[validate(email(message = "must be a valid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub token: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ShortenRequest {
    #[validate(custom(function = "validate_target_url"))]
    pub url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortenedLink {
    pub id: i64,
    pub short_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkView {
    pub id: i64,
    pub short_url: String,
    pub url: String,
}

impl From<Link> for LinkView {
    fn from(link: Link) -> Self {
        Self {
            id: link.id,
            short_url: link.short_code,
            url: link.target_url,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnedLink {
    pub id: i64,
    pub short_url: String,
    pub url: String,
    pub visit_count: i64,
}

impl From<Link> for OwnedLink {
    fn from(link: Link) -> Self {
        Self {
            id: link.id,
            short_url: link.short_code,
            url: link.target_url,
            visit_count: link.visit_count,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountLinks {
    pub id: i64,
    pub name: String,
    pub visit_count: i64,
    pub shortened_urls: Vec<OwnedLink>,
}
