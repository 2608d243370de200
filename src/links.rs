use crate::config::SHORT_CODE_LENGTH;
use crate::dao::{Store, StoreError};
use crate::error::{AppError, AppResult};
use crate::model::{Account, AccountLinks, LinkView, RankingEntry, ShortenRequest, ShortenedLink};
use crate::utils::generate_short_code;
use validator::Validate;

pub const RANKING_SIZE: i64 = 10;

const LINK_NOT_FOUND: &str = "Url not found";

pub async fn shorten(
    store: &dyn Store,
    max_attempts: u32,
    account: &Account,
    request: ShortenRequest,
) -> AppResult<ShortenedLink> {
    request.validate()?;
    for _ in 0..max_attempts {
        let short_code = generate_short_code(SHORT_CODE_LENGTH);
        match store.insert_link(&short_code, &request.url, account.id).await {
            Ok(link) => {
                tracing::info!(link_id = link.id, account_id = account.id, "Link created");
                return Ok(ShortenedLink {
                    id: link.id,
                    short_url: link.short_code,
                });
            }
            Err(StoreError::UniqueViolation) => {
                tracing::warn!("Short code collision, generating another one");
            }
            Err(err) => return Err(err.into()),
        }
    }
    Err(AppError::Internal(
        "Could not persist new link. Exhausted all retries of generating a unique short code"
            .into(),
    ))
}

pub async fn get_by_id(store: &dyn Store, id: i64) -> AppResult<LinkView> {
    store
        .find_link_by_id(id)
        .await?
        .map(LinkView::from)
        .ok_or_else(|| AppError::NotFound(LINK_NOT_FOUND.into()))
}

/// Counts a visit and returns the url to redirect to.
pub async fn open(store: &dyn Store, short_code: &str) -> AppResult<String> {
    store
        .open_link(short_code)
        .await?
        .ok_or_else(|| AppError::NotFound(LINK_NOT_FOUND.into()))
}

pub async fn delete(store: &dyn Store, id: i64, account: &Account) -> AppResult<()> {
    let link = store
        .find_link_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(LINK_NOT_FOUND.into()))?;
    if link.owner_id != account.id {
        return Err(AppError::Unauthorized("Unauthorized".into()));
    }
    if !store.delete_link(id).await? {
        return Err(AppError::NotFound(LINK_NOT_FOUND.into()));
    }
    tracing::info!(link_id = id, account_id = account.id, "Link deleted");
    Ok(())
}

pub async fn list_for_owner(store: &dyn Store, account: &Account) -> AppResult<AccountLinks> {
    let visit_count = store.total_visits(account.id).await?;
    let links = store.links_by_owner(account.id).await?;
    Ok(AccountLinks {
        id: account.id,
        name: account.name.clone(),
        visit_count,
        shortened_urls: links.into_iter().map(Into::into).collect(),
    })
}

pub async fn ranking(store: &dyn Store) -> AppResult<Vec<RankingEntry>> {
    Ok(store.ranking(RANKING_SIZE).await?)
}
