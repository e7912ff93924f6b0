use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::extractors::ApiUser,
    error::ApiResult,
    state::AppState,
    users::{
        dto::{ApiResponse, LoginUser, Page, PageQuery},
        repo_types::User,
        services,
    },
    validation::Payload,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route(
            "/users/:id",
            get(show_user).put(update_user).delete(delete_user),
        )
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/me", get(me))
}

// a missing or unparsable body validates as an empty one
fn body_or_empty(body: Option<Json<Payload>>) -> Payload {
    body.map(|Json(p)| p).unwrap_or_default()
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    Query(q): Query<PageQuery>,
) -> ApiResult<ApiResponse<Page<User>>> {
    let page = services::list_users(&state, q.page).await?;
    Ok(ApiResponse::success("All users", page))
}

#[instrument(skip(state, body))]
pub async fn login(
    State(state): State<AppState>,
    body: Option<Json<Payload>>,
) -> ApiResult<ApiResponse<LoginUser>> {
    let user = services::login(&state, body_or_empty(body)).await?;
    Ok(ApiResponse::success("Login success", user))
}

#[instrument(skip(state, body))]
pub async fn register(
    State(state): State<AppState>,
    body: Option<Json<Payload>>,
) -> ApiResult<ApiResponse<User>> {
    let user = services::register(&state, body_or_empty(body)).await?;
    Ok(ApiResponse::success("Successfully registered user", user))
}

// the message text is what existing clients receive from this endpoint
#[instrument(skip(state))]
pub async fn show_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<User>> {
    let user = services::show_user(&state, &id).await?;
    Ok(ApiResponse::success("User successfully deleted", user))
}

#[instrument(skip(state, body))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<Payload>>,
) -> ApiResult<ApiResponse<User>> {
    let user = services::update_user(&state, &id, body_or_empty(body)).await?;
    Ok(ApiResponse::success("Successfully registered user", user))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    services::delete_user(&state, &id).await?;
    Ok(ApiResponse::message_only("User successfully deleted"))
}

#[instrument(skip_all)]
pub async fn me(ApiUser(user): ApiUser) -> ApiResponse<User> {
    ApiResponse::success("Authenticated user", user)
}
