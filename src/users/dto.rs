use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Deserializer, Serialize};

/// Success envelope shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: &'static str,
    pub code: u16,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: &'static str, user: T) -> Self {
        Self {
            status: "success",
            code: StatusCode::OK.as_u16(),
            message,
            user: Some(user),
        }
    }
}

impl ApiResponse<()> {
    pub fn message_only(message: &'static str) -> Self {
        Self {
            status: "success",
            code: StatusCode::OK.as_u16(),
            message,
            user: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> axum::response::Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Returned once by login; `api_token` cannot be recovered afterwards.
#[derive(Debug, Serialize)]
pub struct LoginUser {
    pub sub: i64,
    pub name: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
    pub api_token: String,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page", deserialize_with = "lenient_page")]
    pub page: i64,
}

fn default_page() -> i64 {
    1
}

// unparsable or non-positive pages fall back to the first one
fn lenient_page<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    let raw = String::deserialize(d)?;
    Ok(raw.trim().parse::<i64>().ok().filter(|p| *p >= 1).unwrap_or(1))
}

/// Paginator payload returned by the list endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub current_page: i64,
    pub data: Vec<T>,
    pub first_page_url: String,
    pub from: Option<i64>,
    pub last_page: i64,
    pub last_page_url: String,
    pub next_page_url: Option<String>,
    pub path: String,
    pub per_page: i64,
    pub prev_page_url: Option<String>,
    pub to: Option<i64>,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, page: i64, per_page: i64, total: i64, path: &str) -> Self {
        let last_page = ((total + per_page - 1) / per_page).max(1);
        let url = |p: i64| format!("{path}?page={p}");
        let (from, to) = if data.is_empty() {
            (None, None)
        } else {
            let from = (page - 1) * per_page + 1;
            (Some(from), Some(from + data.len() as i64 - 1))
        };
        Self {
            current_page: page,
            first_page_url: url(1),
            from,
            last_page,
            last_page_url: url(last_page),
            next_page_url: (page < last_page).then(|| url(page + 1)),
            path: path.to_string(),
            per_page,
            prev_page_url: (page > 1).then(|| url(page - 1)),
            to,
            total,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_links_for_middle_page() {
        let page = Page::new(vec![6, 7, 8, 9, 10], 2, 5, 12, "/api/users");
        assert_eq!(page.last_page, 3);
        assert_eq!(page.from, Some(6));
        assert_eq!(page.to, Some(10));
        assert_eq!(page.prev_page_url.as_deref(), Some("/api/users?page=1"));
        assert_eq!(page.next_page_url.as_deref(), Some("/api/users?page=3"));
        assert_eq!(page.last_page_url, "/api/users?page=3");
    }

    #[test]
    fn empty_store_still_has_one_page() {
        let page: Page<i64> = Page::new(vec![], 1, 5, 0, "/api/users");
        assert_eq!(page.last_page, 1);
        assert_eq!(page.from, None);
        assert_eq!(page.to, None);
        assert!(page.next_page_url.is_none());
        assert!(page.prev_page_url.is_none());
    }

    #[test]
    fn page_query_is_lenient() {
        let q: PageQuery = serde_json::from_str(r#"{"page":"3"}"#).unwrap();
        assert_eq!(q.page, 3);
        let q: PageQuery = serde_json::from_str(r#"{"page":"abc"}"#).unwrap();
        assert_eq!(q.page, 1);
        let q: PageQuery = serde_json::from_str(r#"{"page":"-2"}"#).unwrap();
        assert_eq!(q.page, 1);
        let q: PageQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.page, 1);
    }

    #[test]
    fn message_only_omits_user() {
        let json = serde_json::to_value(ApiResponse::message_only("User successfully deleted")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status":"success","code":200,"message":"User successfully deleted"})
        );
    }
}
