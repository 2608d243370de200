use crate::config::Settings;
use crate::dao::{Store, StoreError};
use crate::error::{AppError, AppResult};
use crate::model::{NewAccount, SignInRequest, SignUpRequest};
use crate::password::PasswordHasher;
use crate::utils::{generate_session_token, hash_token};
use chrono::Utc;
use validator::Validate;

const EMAIL_TAKEN: &str = "Email already registered";
const INVALID_CREDENTIALS: &str = "Invalid email or password";

pub async fn register(
    store: &dyn Store,
    hasher: &PasswordHasher,
    request: SignUpRequest,
) -> AppResult<()> {
    request.validate()?;
    if store.find_account_by_email(&request.email).await?.is_some() {
        return Err(AppError::Conflict(EMAIL_TAKEN.into()));
    }
    let password_hash = hasher.hash(&request.password)?;
    let account = store
        .insert_account(NewAccount {
            email: request.email,
            name: request.name,
            password_hash,
        })
        .await
        .map_err(|err| match err {
            StoreError::UniqueViolation => AppError::Conflict(EMAIL_TAKEN.into()),
            err => err.into(),
        })?;
    tracing::info!(account_id = account.id, "Account registered");
    Ok(())
}

/// Opens a new session and returns its bearer token. Earlier sessions of the
/// same account stay valid.
pub async fn login(
    store: &dyn Store,
    hasher: &PasswordHasher,
    settings: &Settings,
    request: SignInRequest,
) -> AppResult<String> {
    request.validate()?;
    let account = store
        .find_account_by_email(&request.email)
        .await?
        .ok_or_else(|| AppError::Unauthenticated(INVALID_CREDENTIALS.into()))?;
    if !hasher.verify(&request.password, &account.password_hash)? {
        return Err(AppError::Unauthenticated(INVALID_CREDENTIALS.into()));
    }
    let token = generate_session_token();
    let expires_at = match settings.session_ttl {
        Some(ttl) => Some(Utc::now().checked_add_signed(ttl).ok_or_else(|| {
            AppError::Internal("Session expiry is out of the representable range".into())
        })?),
        None => None,
    };
    store
        .insert_session(&hash_token(&token), account.id, expires_at)
        .await?;
    tracing::info!(account_id = account.id, "Session opened");
    Ok(token)
}
