use crate::accounts;
use crate::auth::auth;
use crate::config::Settings;
use crate::dao::Store;
use crate::error::{AppError, AppResult};
use crate::links;
use crate::model::{
    Account, AccountLinks, LinkView, RankingEntry, ShortenRequest, ShortenedLink, SignInRequest,
    SignInResponse, SignUpRequest,
};
use crate::password::PasswordHasher;
use crate::utils::with_timeout;
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header::{CACHE_CONTROL, LOCATION};
use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Extension, Json, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

const CACHE_CONTROL_HEADER_VALUE: &str = "no-store";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub hasher: Arc<PasswordHasher>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, settings: Settings) -> AppResult<Self> {
        Ok(Self {
            store,
            hasher: Arc::new(PasswordHasher::new(settings.password)?),
            settings: Arc::new(settings),
        })
    }
}

pub fn create_router(state: AppState) -> Router {
    let authenticated = from_fn_with_state(state.clone(), auth);
    Router::new()
        .route("/signup", post(sign_up))
        .route("/signin", post(sign_in))
        .route(
            "/urls/shorten",
            post(shorten_link).route_layer(authenticated.clone()),
        )
        .route(
            "/urls/:id",
            delete(delete_link)
                .route_layer(authenticated.clone())
                .get(get_link),
        )
        .route("/urls/open/:short_url", get(redirect))
        .route("/users/me", get(get_current_user).route_layer(authenticated))
        .route("/ranking", get(ranking))
        .route("/health", get(health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Unwraps a JSON body, reporting unreadable payloads like any other invalid input.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::Validation(vec![rejection.body_text()]))
}

fn link_id(id: &str) -> AppResult<i64> {
    id.parse()
        .map_err(|_| AppError::NotFound("Url not found".into()))
}

pub async fn sign_up(
    State(state): State<AppState>,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> AppResult<StatusCode> {
    let request = json_body(payload)?;
    with_timeout(
        state.settings.request_timeout,
        accounts::register(state.store.as_ref(), &state.hasher, request),
    )
    .await??;
    Ok(StatusCode::CREATED)
}

pub async fn sign_in(
    State(state): State<AppState>,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> AppResult<Json<SignInResponse>> {
    let request = json_body(payload)?;
    let token = with_timeout(
        state.settings.request_timeout,
        accounts::login(state.store.as_ref(), &state.hasher, &state.settings, request),
    )
    .await??;
    Ok(Json(SignInResponse { token }))
}

pub async fn shorten_link(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    payload: Result<Json<ShortenRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ShortenedLink>)> {
    let request = json_body(payload)?;
    let link = with_timeout(
        state.settings.request_timeout,
        links::shorten(
            state.store.as_ref(),
            state.settings.short_code_max_attempts,
            &account,
            request,
        ),
    )
    .await??;
    Ok((StatusCode::CREATED, Json(link)))
}

pub async fn get_link(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<LinkView>> {
    let id = link_id(&id)?;
    let link = with_timeout(
        state.settings.request_timeout,
        links::get_by_id(state.store.as_ref(), id),
    )
    .await??;
    Ok(Json(link))
}

pub async fn redirect(
    State(state): State<AppState>,
    Path(short_url): Path<String>,
) -> AppResult<Response> {
    // Runs to completion so every counted visit gets its redirect.
    let target_url = links::open(state.store.as_ref(), &short_url).await?;
    Response::builder()
        .status(StatusCode::FOUND)
        .header(LOCATION, target_url)
        .header(CACHE_CONTROL, CACHE_CONTROL_HEADER_VALUE)
        .body(Body::empty())
        .map_err(AppError::internal)
}

pub async fn delete_link(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id = link_id(&id)?;
    with_timeout(
        state.settings.request_timeout,
        links::delete(state.store.as_ref(), id, &account),
    )
    .await??;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_current_user(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
) -> AppResult<Json<AccountLinks>> {
    let listing = with_timeout(
        state.settings.request_timeout,
        links::list_for_owner(state.store.as_ref(), &account),
    )
    .await??;
    Ok(Json(listing))
}

pub async fn ranking(State(state): State<AppState>) -> AppResult<Json<Vec<RankingEntry>>> {
    let ranking = with_timeout(
        state.settings.request_timeout,
        links::ranking(state.store.as_ref()),
    )
    .await??;
    Ok(Json(ranking))
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
