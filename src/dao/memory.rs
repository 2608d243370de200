use super::{Store, StoreError, StoreResult};
use crate::model::{Account, Link, NewAccount, RankingEntry, Session};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

/// In-process store with the same constraints as the Postgres schema:
/// unique emails, unique short codes, single-step visit increments.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    accounts: BTreeMap<i64, Account>,
    sessions: HashMap<String, Session>,
    links: BTreeMap<i64, Link>,
    last_account_id: i64,
    last_link_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_account(&self, account: NewAccount) -> StoreResult<Account> {
        let mut state = self.state.lock().await;
        if state.accounts.values().any(|a| a.email == account.email) {
            return Err(StoreError::UniqueViolation);
        }
        state.last_account_id += 1;
        let account = Account {
            id: state.last_account_id,
            email: account.email,
            name: account.name,
            password_hash: account.password_hash,
        };
        state.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find_account_by_id(&self, id: i64) -> StoreResult<Option<Account>> {
        Ok(self.state.lock().await.accounts.get(&id).cloned())
    }

    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let state = self.state.lock().await;
        Ok(state.accounts.values().find(|a| a.email == email).cloned())
    }

    async fn insert_session(
        &self,
        token_hash: &str,
        account_id: i64,
        expires_at: Option<DateTime<Utc>>,
    ) -> StoreResult<Session> {
        let mut state = self.state.lock().await;
        if state.sessions.contains_key(token_hash) {
            return Err(StoreError::UniqueViolation);
        }
        let session = Session {
            token_hash: token_hash.to_string(),
            account_id,
            created_at: Utc::now(),
            expires_at,
        };
        state.sessions.insert(session.token_hash.clone(), session.clone());
        Ok(session)
    }

    async fn find_session(&self, token_hash: &str) -> StoreResult<Option<Session>> {
        Ok(self.state.lock().await.sessions.get(token_hash).cloned())
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.sessions.len();
        state.sessions.retain(|_, session| !session.is_expired(now));
        Ok((before - state.sessions.len()) as u64)
    }

    async fn insert_link(
        &self,
        short_code: &str,
        target_url: &str,
        owner_id: i64,
    ) -> StoreResult<Link> {
        let mut state = self.state.lock().await;
        if state.links.values().any(|l| l.short_code == short_code) {
            return Err(StoreError::UniqueViolation);
        }
        state.last_link_id += 1;
        let link = Link {
            id: state.last_link_id,
            short_code: short_code.to_string(),
            target_url: target_url.to_string(),
            owner_id,
            visit_count: 0,
        };
        state.links.insert(link.id, link.clone());
        Ok(link)
    }

    async fn find_link_by_id(&self, id: i64) -> StoreResult<Option<Link>> {
        Ok(self.state.lock().await.links.get(&id).cloned())
    }

    async fn open_link(&self, short_code: &str) -> StoreResult<Option<String>> {
        let mut state = self.state.lock().await;
        Ok(state
            .links
            .values_mut()
            .find(|l| l.short_code == short_code)
            .map(|link| {
                link.visit_count += 1;
                link.target_url.clone()
            }))
    }

    async fn delete_link(&self, id: i64) -> StoreResult<bool> {
        Ok(self.state.lock().await.links.remove(&id).is_some())
    }

    async fn total_visits(&self, owner_id: i64) -> StoreResult<i64> {
        let state = self.state.lock().await;
        Ok(state
            .links
            .values()
            .filter(|l| l.owner_id == owner_id)
            .map(|l| l.visit_count)
            .sum())
    }

    async fn links_by_owner(&self, owner_id: i64) -> StoreResult<Vec<Link>> {
        let state = self.state.lock().await;
        Ok(state
            .links
            .values()
            .filter(|l| l.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn ranking(&self, limit: i64) -> StoreResult<Vec<RankingEntry>> {
        let state = self.state.lock().await;
        let mut entries: Vec<RankingEntry> = state
            .accounts
            .values()
            .map(|account| {
                let owned = state.links.values().filter(|l| l.owner_id == account.id);
                RankingEntry {
                    id: account.id,
                    name: account.name.clone(),
                    links_count: owned.clone().count() as i64,
                    visit_count: owned.map(|l| l.visit_count).sum(),
                }
            })
            .collect();
        entries.sort_by(|a, b| b.visit_count.cmp(&a.visit_count).then(a.id.cmp(&b.id)));
        entries.truncate(limit.max(0) as usize);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use std::sync::Arc;

    fn new_account(email: &str) -> NewAccount {
        NewAccount {
            email: email.into(),
            name: "Ana".into(),
            password_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn rejects_duplicate_email_and_short_code() {
        let store = MemoryStore::new();
        let account = store.insert_account(new_account("a@b.com")).await.unwrap();
        assert!(matches!(
            store.insert_account(new_account("a@b.com")).await,
            Err(StoreError::UniqueViolation)
        ));
        store.insert_link("abc", "https://x.io", account.id).await.unwrap();
        assert!(matches!(
            store.insert_link("abc", "https://y.io", account.id).await,
            Err(StoreError::UniqueViolation)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_opens_do_not_lose_updates() {
        let store = Arc::new(MemoryStore::new());
        let account = store.insert_account(new_account("a@b.com")).await.unwrap();
        let link = store.insert_link("code", "https://x.io", account.id).await.unwrap();

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.open_link("code").await.unwrap() })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().as_deref(), Some("https://x.io"));
        }

        let link = store.find_link_by_id(link.id).await.unwrap().unwrap();
        assert_eq!(link.visit_count, 50);
    }

    #[tokio::test]
    async fn removes_only_expired_sessions() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.insert_session("old", 1, Some(now - TimeDelta::minutes(1))).await.unwrap();
        store.insert_session("new", 1, Some(now + TimeDelta::minutes(1))).await.unwrap();
        store.insert_session("forever", 1, None).await.unwrap();

        assert_eq!(store.delete_expired_sessions(now).await.unwrap(), 1);
        assert!(store.find_session("old").await.unwrap().is_none());
        assert!(store.find_session("new").await.unwrap().is_some());
        assert!(store.find_session("forever").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn ranks_accounts_by_visits_then_id() {
        let store = MemoryStore::new();
        let first = store.insert_account(new_account("a@b.com")).await.unwrap();
        let second = store.insert_account(new_account("c@d.com")).await.unwrap();
        let third = store.insert_account(new_account("e@f.com")).await.unwrap();
        store.insert_link("one", "https://x.io", second.id).await.unwrap();
        store.insert_link("two", "https://y.io", second.id).await.unwrap();
        store.open_link("one").await.unwrap();

        let ranking = store.ranking(2).await.unwrap();
        assert_eq!(ranking.len(), 2);
        assert_eq!(ranking[0].id, second.id);
        assert_eq!(ranking[0].links_count, 2);
        assert_eq!(ranking[0].visit_count, 1);
        assert_eq!(ranking[1].id, first.id);
        assert_eq!(ranking[1].links_count, 0);
        assert_ne!(ranking[1].id, third.id);
    }
}
