//! Typed request validation.
//!
//! Every operation declares its constraints as a list of [`FieldRules`]; the
//! [`Validator`] walks them against the JSON body and collects field-level
//! messages. Rules that need the store (`Unique`, `Exists`) or DNS
//! (`Email { dns: true }`) are evaluated through the collaborators held by the
//! validator.

use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{ApiError, ApiResult, FieldErrors};
use crate::resolver::DomainResolver;
use crate::state::AppState;
use crate::users::repo::UserStore;

/// Request body as received, after [`normalize`].
pub type Payload = Map<String, Value>;

/// Fields that are never trimmed.
const UNTRIMMED: &[&str] = &["password", "password_confirmation"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Required,
    String,
    /// Minimum length in characters.
    Min(usize),
    /// Maximum length in characters.
    Max(usize),
    Email { dns: bool },
    /// Must equal `<field>_confirmation`.
    Confirmed,
    /// No stored user may have this email, apart from `except`.
    Unique { except: Option<i64> },
    /// A stored user must have this email.
    Exists,
}

#[derive(Debug, Clone)]
pub struct FieldRules {
    pub field: &'static str,
    pub rules: Vec<Rule>,
}

impl FieldRules {
    pub fn new(field: &'static str, rules: Vec<Rule>) -> Self {
        Self { field, rules }
    }
}

pub fn login_rules() -> Vec<FieldRules> {
    vec![
        FieldRules::new(
            "email",
            vec![Rule::Required, Rule::Email { dns: false }, Rule::Exists],
        ),
        FieldRules::new("password", vec![Rule::Required, Rule::String]),
    ]
}

pub fn register_rules() -> Vec<FieldRules> {
    account_rules(None)
}

/// Same constraints as registration, but the record being updated may keep its email.
pub fn update_rules(id: Option<i64>) -> Vec<FieldRules> {
    account_rules(id)
}

fn account_rules(except: Option<i64>) -> Vec<FieldRules> {
    vec![
        FieldRules::new(
            "name",
            vec![Rule::Required, Rule::String, Rule::Min(5), Rule::Max(100)],
        ),
        FieldRules::new(
            "email",
            vec![
                Rule::Required,
                Rule::Email { dns: true },
                Rule::Unique { except },
                Rule::Max(150),
            ],
        ),
        FieldRules::new(
            "password",
            vec![Rule::Required, Rule::Confirmed, Rule::Min(8), Rule::Max(16)],
        ),
    ]
}

/// Trims string values (passwords excepted) and turns empty strings into null.
pub fn normalize(mut payload: Payload) -> Payload {
    for (key, value) in payload.iter_mut() {
        if let Value::String(s) = value {
            if !UNTRIMMED.contains(&key.as_str()) {
                let trimmed = s.trim();
                if trimmed.len() != s.len() {
                    *s = trimmed.to_string();
                }
            }
            if s.is_empty() {
                *value = Value::Null;
            }
        }
    }
    payload
}

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(
            r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$"
        )
        .unwrap();
    }
    let Some((local, _)) = email.split_once('@') else {
        return false;
    };
    local.len() <= 64
        && !local.starts_with('.')
        && !local.ends_with('.')
        && !local.contains("..")
        && EMAIL_RE.is_match(email)
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
        Some(_) => false,
    }
}

/// Text a scalar is measured and stored as; numbers and booleans use their JSON form.
fn scalar_text(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(s) => Some(Cow::Borrowed(s.as_str())),
        Value::Number(_) | Value::Bool(_) => Some(Cow::Owned(value.to_string())),
        _ => None,
    }
}

fn attribute(field: &str) -> String {
    field.replace('_', " ")
}

pub struct Validator<'a> {
    store: &'a dyn UserStore,
    resolver: &'a dyn DomainResolver,
}

impl<'a> Validator<'a> {
    pub fn new(store: &'a dyn UserStore, resolver: &'a dyn DomainResolver) -> Self {
        Self { store, resolver }
    }

    pub fn from_state(state: &'a AppState) -> Self {
        Self::new(state.store.as_ref(), state.resolver.as_ref())
    }

    /// `Err(ApiError::Validation)` carries every failed rule.
    pub async fn validate(&self, payload: &Payload, rules: &[FieldRules]) -> ApiResult<()> {
        let mut errors = FieldErrors::new();
        for field_rules in rules {
            self.check_field(payload, field_rules, &mut errors).await?;
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(errors))
        }
    }

    async fn check_field(
        &self,
        payload: &Payload,
        field_rules: &FieldRules,
        errors: &mut FieldErrors,
    ) -> ApiResult<()> {
        let field = field_rules.field;
        let attr = attribute(field);
        let value = payload.get(field);

        if is_blank(value) {
            if field_rules.rules.contains(&Rule::Required) {
                errors.add(field, format!("The {attr} field is required."));
            }
            return Ok(());
        }
        let Some(value) = value else {
            return Ok(());
        };
        let text = scalar_text(value);

        for rule in &field_rules.rules {
            let failed = match (rule, text.as_deref()) {
                (Rule::Required, _) => None,
                (Rule::String, _) => {
                    (!value.is_string()).then(|| format!("The {attr} must be a string."))
                }
                (Rule::Min(n), Some(s)) => (s.chars().count() < *n)
                    .then(|| format!("The {attr} must be at least {n} characters.")),
                (Rule::Max(n), Some(s)) => (s.chars().count() > *n)
                    .then(|| format!("The {attr} must not be greater than {n} characters.")),
                (Rule::Email { dns }, Some(s)) => (!self.email_ok(s, *dns).await)
                    .then(|| format!("The {attr} must be a valid email address.")),
                (Rule::Email { .. }, None) => {
                    Some(format!("The {attr} must be a valid email address."))
                }
                (Rule::Confirmed, _) => {
                    let confirmation = payload.get(&format!("{field}_confirmation"));
                    (confirmation != Some(value))
                        .then(|| format!("The {attr} confirmation does not match."))
                }
                (Rule::Unique { except }, Some(s)) => self
                    .store
                    .email_taken(s, *except)
                    .await?
                    .then(|| format!("The {attr} has already been taken.")),
                (Rule::Exists, Some(s)) => self
                    .store
                    .find_by_email(s)
                    .await?
                    .is_none()
                    .then(|| format!("The selected {attr} is invalid.")),
                // arrays and objects have no text to measure or look up
                (Rule::Min(_) | Rule::Max(_) | Rule::Unique { .. } | Rule::Exists, None) => None,
            };
            if let Some(message) = failed {
                errors.add(field, message);
            }
        }
        Ok(())
    }

    async fn email_ok(&self, email: &str, dns: bool) -> bool {
        if !is_valid_email(email) {
            return false;
        }
        if !dns {
            return true;
        }
        match email.rsplit_once('@') {
            Some((_, domain)) => self.resolver.resolves(domain).await,
            None => false,
        }
    }
}

/// Reads a field that validation has already required, in the same text form
/// the length rules measured.
pub fn required_str(payload: &Payload, field: &str) -> ApiResult<String> {
    let message = match payload.get(field) {
        None | Some(Value::Null) => format!("The {} field is required.", attribute(field)),
        Some(value) => match scalar_text(value) {
            Some(text) => return Ok(text.into_owned()),
            None => format!("The {} must be a string.", attribute(field)),
        },
    };
    Err(ApiError::Validation(FieldErrors::single(field, message)))
}

/// Reads an unvalidated optional field; non-string scalars are kept in their JSON form.
pub fn optional_str(payload: &Payload, field: &str) -> Option<String> {
    match payload.get(field)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
