use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::users::repo::{StoreError, StoreResult, UserStore};
use crate::users::repo_types::{NewUser, User, UserChanges};

#[derive(Debug, Default)]
struct Inner {
    last_id: i64,
    users: BTreeMap<i64, User>,
}

impl Inner {
    fn email_taken(&self, email: &str, except: Option<i64>) -> bool {
        let email = email.to_lowercase();
        self.users
            .values()
            .any(|u| Some(u.id) != except && u.email.to_lowercase() == email)
    }
}

/// Process-local store used when no database is configured, and by tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryUserStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.to_lowercase();
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.email.to_lowercase() == email)
            .cloned())
    }

    async fn find_by_api_token(&self, token_hash: &str) -> StoreResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.api_token_hash.as_deref() == Some(token_hash))
            .cloned())
    }

    async fn email_taken(&self, email: &str, except: Option<i64>) -> StoreResult<bool> {
        Ok(self.inner.read().await.email_taken(email, except))
    }

    async fn paginate(&self, page: i64, per_page: i64) -> StoreResult<(Vec<User>, i64)> {
        let inner = self.inner.read().await;
        let skip = usize::try_from((page.max(1) - 1).saturating_mul(per_page)).unwrap_or(usize::MAX);
        let take = usize::try_from(per_page).unwrap_or(0);
        let rows = inner.users.values().skip(skip).take(take).cloned().collect();
        Ok((rows, inner.users.len() as i64))
    }

    async fn create(&self, new_user: NewUser) -> StoreResult<User> {
        let mut inner = self.inner.write().await;
        if inner.email_taken(&new_user.email, None) {
            return Err(StoreError::DuplicateEmail);
        }
        inner.last_id += 1;
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: inner.last_id,
            name: new_user.name,
            email: new_user.email,
            username: new_user.username,
            password_hash: new_user.password_hash,
            api_token_hash: None,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update(&self, id: i64, changes: UserChanges) -> StoreResult<Option<User>> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&id) {
            return Ok(None);
        }
        if inner.email_taken(&changes.email, Some(id)) {
            return Err(StoreError::DuplicateEmail);
        }
        let Some(user) = inner.users.get_mut(&id) else {
            return Ok(None);
        };
        user.name = changes.name;
        user.email = changes.email;
        user.username = changes.username;
        user.password_hash = changes.password_hash;
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn set_api_token(&self, id: i64, token_hash: &str) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.users.get_mut(&id) {
            Some(user) => {
                user.api_token_hash = Some(token_hash.to_string());
                user.updated_at = OffsetDateTime::now_utc();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: i64) -> StoreResult<bool> {
        Ok(self.inner.write().await.users.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Test User".into(),
            email: email.into(),
            username: None,
            password_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn ids_ascend_and_are_not_reused() {
        let store = MemoryUserStore::new();
        let a = store.create(new_user("a@example.com")).await.unwrap();
        let b = store.create(new_user("b@example.com")).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));

        assert!(store.delete(b.id).await.unwrap());
        let c = store.create(new_user("c@example.com")).await.unwrap();
        assert_eq!(c.id, 3);
        assert!(store.find(b.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_case_insensitively() {
        let store = MemoryUserStore::new();
        store.create(new_user("dup@example.com")).await.unwrap();
        let err = store.create(new_user("DUP@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
        assert!(store.email_taken("Dup@Example.com", None).await.unwrap());
    }

    #[tokio::test]
    async fn email_taken_ignores_own_record() {
        let store = MemoryUserStore::new();
        let a = store.create(new_user("a@example.com")).await.unwrap();
        assert!(!store.email_taken("a@example.com", Some(a.id)).await.unwrap());
        assert!(store.email_taken("a@example.com", Some(a.id + 1)).await.unwrap());
    }

    #[tokio::test]
    async fn update_conflicts_with_other_records_only() {
        let store = MemoryUserStore::new();
        let a = store.create(new_user("a@example.com")).await.unwrap();
        store.create(new_user("b@example.com")).await.unwrap();

        let keep = UserChanges {
            name: "Renamed".into(),
            email: "a@example.com".into(),
            username: Some("alpha".into()),
            password_hash: "hash2".into(),
        };
        let updated = store.update(a.id, keep).await.unwrap().unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.username.as_deref(), Some("alpha"));

        let steal = UserChanges {
            name: "Renamed".into(),
            email: "b@example.com".into(),
            username: None,
            password_hash: "hash3".into(),
        };
        assert!(matches!(
            store.update(a.id, steal).await,
            Err(StoreError::DuplicateEmail)
        ));

        let missing = UserChanges {
            name: "Nobody".into(),
            email: "nobody@example.com".into(),
            username: None,
            password_hash: "hash".into(),
        };
        assert!(store.update(99, missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn paginate_orders_by_id() {
        let store = MemoryUserStore::new();
        for i in 0..7 {
            store
                .create(new_user(&format!("user{i}@example.com")))
                .await
                .unwrap();
        }
        let (first, total) = store.paginate(1, 5).await.unwrap();
        assert_eq!(total, 7);
        assert_eq!(first.iter().map(|u| u.id).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);

        let (second, _) = store.paginate(2, 5).await.unwrap();
        assert_eq!(second.iter().map(|u| u.id).collect::<Vec<_>>(), vec![6, 7]);

        let (third, _) = store.paginate(3, 5).await.unwrap();
        assert!(third.is_empty());
    }

    #[tokio::test]
    async fn api_token_lookup() {
        let store = MemoryUserStore::new();
        let a = store.create(new_user("a@example.com")).await.unwrap();
        assert!(store.find_by_api_token("abc").await.unwrap().is_none());
        assert!(store.set_api_token(a.id, "abc").await.unwrap());
        let found = store.find_by_api_token("abc").await.unwrap().unwrap();
        assert_eq!(found.id, a.id);
        assert!(!store.set_api_token(42, "abc").await.unwrap());
    }
}
