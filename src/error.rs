use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{ser::SerializeMap, Serialize, Serializer};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::users::repo::StoreError;

/// Field name → messages, kept in the order the rules were evaluated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(Vec<(String, Vec<String>)>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        match self.0.iter_mut().find(|(f, _)| f == field) {
            Some((_, messages)) => messages.push(message.into()),
            None => self.0.push((field.to_string(), vec![message.into()])),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, messages)| messages.as_slice())
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(f, _)| f.as_str())
    }
}

impl Serialize for FieldErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (field, messages) in &self.0 {
            map.serialize_entry(field, messages)?;
        }
        map.end()
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Incorrect data validation")]
    Validation(FieldErrors),

    #[error("User not found")]
    NotFound,

    #[error("Password incorrect")]
    Authentication,

    #[error("Unauthenticated")]
    Unauthenticated,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Authentication => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            // the unique index caught a race the validator could not see
            StoreError::DuplicateEmail => ApiError::Validation(FieldErrors::single(
                "email",
                "The email has already been taken.",
            )),
            StoreError::Database(e) => ApiError::Internal(anyhow::Error::new(e).context("user store")),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = status.as_u16();
        let body = match self {
            ApiError::Validation(errors) => json!({
                "status": "error",
                "code": code,
                "message": "Incorrect data validation",
                "errors": errors,
            }),
            ApiError::Internal(e) => {
                error!(error = ?e, "internal error");
                json!({
                    "status": "error",
                    "code": code,
                    "message": "Internal server error",
                })
            }
            other => json!({
                "status": "error",
                "code": code,
                "message": other.to_string(),
            }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_keep_insertion_order() {
        let mut errors = FieldErrors::new();
        errors.add("name", "first");
        errors.add("email", "second");
        errors.add("name", "third");

        let json = serde_json::to_string(&errors).unwrap();
        assert_eq!(json, r#"{"name":["first","third"],"email":["second"]}"#);
        assert_eq!(errors.get("name").unwrap().len(), 2);
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["name", "email"]);
    }

    #[test]
    fn status_codes_match_body_codes() {
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Authentication.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::Validation(FieldErrors::new()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn duplicate_email_becomes_validation_error() {
        let err: ApiError = StoreError::DuplicateEmail.into();
        match err {
            ApiError::Validation(errors) => {
                assert_eq!(errors.get("email").unwrap()[0], "The email has already been taken.")
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
