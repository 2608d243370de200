use super::{Store, StoreError, StoreResult};
use crate::model::{Account, Link, NewAccount, RankingEntry, Session};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::error::ErrorKind;
use sqlx::{Error, Pool, Postgres};

#[derive(Clone)]
pub struct PgStore {
    db_connection_pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(db_connection_pool: Pool<Postgres>) -> Self {
        Self { db_connection_pool }
    }
}

fn map_insert_error(err: Error) -> StoreError {
    match err {
        Error::Database(db_err) if db_err.kind() == ErrorKind::UniqueViolation => {
            StoreError::UniqueViolation
        }
        err => StoreError::Database(err),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_account(&self, account: NewAccount) -> StoreResult<Account> {
        sqlx::query_as(
            r#"
              insert into accounts(email, name, password_hash) values ($1, $2, $3)
              returning id, email, name, password_hash
            "#,
        )
        .bind(&account.email)
        .bind(&account.name)
        .bind(&account.password_hash)
        .fetch_one(&self.db_connection_pool)
        .await
        .map_err(map_insert_error)
    }

    async fn find_account_by_id(&self, id: i64) -> StoreResult<Option<Account>> {
        Ok(
            sqlx::query_as("select id, email, name, password_hash from accounts where id = $1")
                .bind(id)
                .fetch_optional(&self.db_connection_pool)
                .await?,
        )
    }

    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        Ok(
            sqlx::query_as("select id, email, name, password_hash from accounts where email = $1")
                .bind(email)
                .fetch_optional(&self.db_connection_pool)
                .await?,
        )
    }

    async fn insert_session(
        &self,
        token_hash: &str,
        account_id: i64,
        expires_at: Option<DateTime<Utc>>,
    ) -> StoreResult<Session> {
        sqlx::query_as(
            r#"
              insert into sessions(token_hash, account_id, expires_at) values ($1, $2, $3)
              returning token_hash, account_id, created_at, expires_at
            "#,
        )
        .bind(token_hash)
        .bind(account_id)
        .bind(expires_at)
        .fetch_one(&self.db_connection_pool)
        .await
        .map_err(map_insert_error)
    }

    async fn find_session(&self, token_hash: &str) -> StoreResult<Option<Session>> {
        Ok(sqlx::query_as(
            "select token_hash, account_id, created_at, expires_at from sessions where token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.db_connection_pool)
        .await?)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("delete from sessions where expires_at <= $1")
            .bind(now)
            .execute(&self.db_connection_pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_link(
        &self,
        short_code: &str,
        target_url: &str,
        owner_id: i64,
    ) -> StoreResult<Link> {
        sqlx::query_as(
            r#"
              insert into links(short_code, target_url, owner_id) values ($1, $2, $3)
              returning id, short_code, target_url, owner_id, visit_count
            "#,
        )
        .bind(short_code)
        .bind(target_url)
        .bind(owner_id)
        .fetch_one(&self.db_connection_pool)
        .await
        .map_err(map_insert_error)
    }

    async fn find_link_by_id(&self, id: i64) -> StoreResult<Option<Link>> {
        Ok(sqlx::query_as(
            "select id, short_code, target_url, owner_id, visit_count from links where id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db_connection_pool)
        .await?)
    }

    async fn open_link(&self, short_code: &str) -> StoreResult<Option<String>> {
        Ok(sqlx::query_scalar(
            "update links set visit_count = visit_count + 1 where short_code = $1 returning target_url",
        )
        .bind(short_code)
        .fetch_optional(&self.db_connection_pool)
        .await?)
    }

    async fn delete_link(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("delete from links where id = $1")
            .bind(id)
            .execute(&self.db_connection_pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn total_visits(&self, owner_id: i64) -> StoreResult<i64> {
        Ok(sqlx::query_scalar(
            "select coalesce(sum(visit_count), 0)::bigint from links where owner_id = $1",
        )
        .bind(owner_id)
        .fetch_one(&self.db_connection_pool)
        .await?)
    }

    async fn links_by_owner(&self, owner_id: i64) -> StoreResult<Vec<Link>> {
        Ok(sqlx::query_as(
            r#"
              select id, short_code, target_url, owner_id, visit_count from links
              where owner_id = $1 order by id
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.db_connection_pool)
        .await?)
    }

    async fn ranking(&self, limit: i64) -> StoreResult<Vec<RankingEntry>> {
        Ok(sqlx::query_as(
            r#"
              select a.id, a.name, count(l.id) as links_count,
                     coalesce(sum(l.visit_count), 0)::bigint as visit_count
              from accounts a left join links l on l.owner_id = a.id
              group by a.id, a.name
              order by visit_count desc, a.id
              limit $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db_connection_pool)
        .await?)
    }
}
