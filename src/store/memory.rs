use std::sync::Mutex;

use async_trait::async_trait;

use super::{NewUser, PersistenceError, StoredUser, UserStore};

/// Process-local `users` table with unique `username` and `email`.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<StoredUser>>,
}

impl MemoryStore {
    #[cfg(test)]
    pub fn rows(&self) -> Vec<StoredUser> {
        self.rows.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: &NewUser) -> Result<(), PersistenceError> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| PersistenceError::Unavailable("memory store poisoned".into()))?;
        if rows.iter().any(|r| r.username == user.username) {
            return Err(PersistenceError::Conflict("username already registered".into()));
        }
        if rows.iter().any(|r| r.email == user.email) {
            return Err(PersistenceError::Conflict("email already registered".into()));
        }
        rows.push(StoredUser {
            username: user.username.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
        });
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<StoredUser>, PersistenceError> {
        let rows = self
            .rows
            .lock()
            .map_err(|_| PersistenceError::Unavailable("memory store poisoned".into()))?;
        Ok(rows.iter().find(|r| r.email == email).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str, email: &str) -> NewUser {
        NewUser {
            username: name.into(),
            email: email.into(),
            password_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn rejects_duplicate_email_and_username() {
        let store = MemoryStore::default();
        store.insert_user(&user("alice", "alice@example.com")).await.unwrap();

        let err = store.insert_user(&user("alice2", "alice@example.com")).await.unwrap_err();
        assert!(matches!(err, PersistenceError::Conflict(m) if m.contains("email")));

        let err = store.insert_user(&user("alice", "other@example.com")).await.unwrap_err();
        assert!(matches!(err, PersistenceError::Conflict(m) if m.contains("username")));

        assert_eq!(store.rows().len(), 1);
    }

    #[tokio::test]
    async fn finds_by_email() {
        let store = MemoryStore::default();
        store.insert_user(&user("bob", "bob@example.com")).await.unwrap();
        let found = store.find_by_email("bob@example.com").await.unwrap();
        assert_eq!(found.map(|u| u.username).as_deref(), Some("bob"));
        assert!(store.find_by_email("nobody@example.com").await.unwrap().is_none());
    }
}
