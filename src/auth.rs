use crate::dao::Store;
use crate::error::{AppError, AppResult};
use crate::model::Account;
use crate::routes::AppState;
use crate::utils::{hash_token, with_timeout};
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::IntoResponse;
use chrono::Utc;

const BEARER_PREFIX: &str = "Bearer ";

pub fn bearer_token(authorization: Option<&str>) -> AppResult<&str> {
    authorization
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthenticated("Missing token".into()))
}

/// Resolves an `Authorization` header value to the account that owns the session.
/// Reads only; every call goes back to the store.
pub async fn resolve_account(store: &dyn Store, authorization: Option<&str>) -> AppResult<Account> {
    let token = bearer_token(authorization)?;
    let session = store
        .find_session(&hash_token(token))
        .await?
        .ok_or_else(|| AppError::Unauthenticated("Invalid token".into()))?;
    if session.is_expired(Utc::now()) {
        return Err(AppError::Unauthenticated("Session expired".into()));
    }
    store
        .find_account_by_id(session.account_id)
        .await?
        .ok_or_else(|| AppError::Unauthenticated("Account not found".into()))
}

/// Route layer for endpoints that need a signed-in account. The resolved
/// [`Account`] is handed to handlers as a request extension.
pub async fn auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<impl IntoResponse, AppError> {
    let authorization = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let account = with_timeout(
        state.settings.request_timeout,
        resolve_account(state.store.as_ref(), authorization),
    )
    .await??;
    tracing::debug!(account_id = account.id, "Request authenticated");
    request.extensions_mut().insert(account);
    Ok(next.run(request).await)
}
