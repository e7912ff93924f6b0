use anyhow::Context;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, info, warn};

use crate::{
    auth::{
        password::{hash_password, verify_password},
        token::issue_token,
    },
    error::{ApiError, ApiResult, FieldErrors},
    state::AppState,
    users::{
        dto::{LoginUser, Page},
        repo_types::{NewUser, User, UserChanges},
    },
    validation::{
        login_rules, normalize, optional_str, register_rules, required_str, update_rules,
        Payload, Validator,
    },
};

pub const USERS_PATH: &str = "/api/users";

/// Path ids that are not numbers cannot match any record.
pub fn parse_id(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}

pub async fn list_users(state: &AppState, page: i64) -> ApiResult<Page<User>> {
    let page = page.max(1);
    let per_page = state.config.per_page;
    let (users, total) = state.store.paginate(page, per_page).await?;
    debug!(page, per_page, total, returned = users.len(), "users page");
    Ok(Page::new(users, page, per_page, total, USERS_PATH))
}

pub async fn login(state: &AppState, input: Payload) -> ApiResult<LoginUser> {
    let input = normalize(input);
    Validator::from_state(state)
        .validate(&input, &login_rules())
        .await?;

    let email = required_str(&input, "email")?;
    let password = required_str(&input, "password")?;

    // deleted between validation and lookup
    let Some(user) = state.store.find_by_email(&email).await? else {
        return Err(ApiError::Validation(FieldErrors::single(
            "email",
            "The selected email is invalid.",
        )));
    };

    if !verify_password(&password, &user.password_hash)? {
        warn!(user_id = user.id, "login invalid password");
        return Err(ApiError::Authentication);
    }

    let token = issue_token(state.config.token.length);
    if !state.store.set_api_token(user.id, &token.hash).await? {
        return Err(ApiError::NotFound);
    }

    let now = OffsetDateTime::now_utc();
    let exp = now + TimeDuration::minutes(state.config.token.ttl_minutes);

    info!(user_id = user.id, "user logged in");
    Ok(LoginUser {
        sub: user.id,
        name: user.name,
        email: user.email,
        iat: now.unix_timestamp(),
        exp: exp.unix_timestamp(),
        api_token: token.plain,
    })
}

pub async fn register(state: &AppState, input: Payload) -> ApiResult<User> {
    let input = normalize(input);
    Validator::from_state(state)
        .validate(&input, &register_rules())
        .await?;

    let password_hash =
        hash_password(&required_str(&input, "password")?).context("hash new user password")?;
    let user = state
        .store
        .create(NewUser {
            name: required_str(&input, "name")?,
            email: required_str(&input, "email")?,
            username: optional_str(&input, "username"),
            password_hash,
        })
        .await?;

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok(user)
}

pub async fn show_user(state: &AppState, raw_id: &str) -> ApiResult<User> {
    let id = parse_id(raw_id).ok_or(ApiError::NotFound)?;
    state.store.find(id).await?.ok_or(ApiError::NotFound)
}

/// Validation runs before the existence check, so a bad payload on a missing
/// id reports validation errors rather than not-found.
pub async fn update_user(state: &AppState, raw_id: &str, input: Payload) -> ApiResult<User> {
    let id = parse_id(raw_id);
    let input = normalize(input);
    Validator::from_state(state)
        .validate(&input, &update_rules(id))
        .await?;

    let id = id.ok_or(ApiError::NotFound)?;
    if state.store.find(id).await?.is_none() {
        return Err(ApiError::NotFound);
    }

    let password_hash =
        hash_password(&required_str(&input, "password")?).context("hash updated password")?;
    let changes = UserChanges {
        name: required_str(&input, "name")?,
        email: required_str(&input, "email")?,
        username: optional_str(&input, "username"),
        password_hash,
    };
    let user = state
        .store
        .update(id, changes)
        .await?
        .ok_or(ApiError::NotFound)?;

    info!(user_id = user.id, "user updated");
    Ok(user)
}

pub async fn delete_user(state: &AppState, raw_id: &str) -> ApiResult<()> {
    let id = parse_id(raw_id).ok_or(ApiError::NotFound)?;
    if !state.store.delete(id).await? {
        return Err(ApiError::NotFound);
    }
    info!(user_id = id, "user deleted");
    Ok(())
}
