//! Data access behind the [`Store`] trait.
//!
//! `PgStore` is the production backend; `MemoryStore` keeps the same
//! semantics in process and backs the tests.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::model::{Account, Link, NewAccount, RankingEntry, Session};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique column (account email, link short code) already holds the value.
    #[error("unique constraint violated")]
    UniqueViolation,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn insert_account(&self, account: NewAccount) -> StoreResult<Account>;

    async fn find_account_by_id(&self, id: i64) -> StoreResult<Option<Account>>;

    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>>;

    async fn insert_session(
        &self,
        token_hash: &str,
        account_id: i64,
        expires_at: Option<DateTime<Utc>>,
    ) -> StoreResult<Session>;

    async fn find_session(&self, token_hash: &str) -> StoreResult<Option<Session>>;

    /// Removes sessions whose expiry is at or before `now`, returning how many went.
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64>;

    async fn insert_link(&self, short_code: &str, target_url: &str, owner_id: i64)
        -> StoreResult<Link>;

    async fn find_link_by_id(&self, id: i64) -> StoreResult<Option<Link>>;

    /// Bumps the visit counter of the link in one step and returns its target url.
    async fn open_link(&self, short_code: &str) -> StoreResult<Option<String>>;

    async fn delete_link(&self, id: i64) -> StoreResult<bool>;

    async fn total_visits(&self, owner_id: i64) -> StoreResult<i64>;

    async fn links_by_owner(&self, owner_id: i64) -> StoreResult<Vec<Link>>;

    async fn ranking(&self, limit: i64) -> StoreResult<Vec<RankingEntry>>;
}
