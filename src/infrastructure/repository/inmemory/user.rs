//! In-memory user repository.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{RepositoryError, User, UserId, UserRepository};

/// User directory stand-in. The relay only ever reads it; accounts are
/// created by the surrounding user service.
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    users: Mutex<HashMap<UserId, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: User) {
        let mut users = self.users.lock().await;
        users.insert(user.id.clone(), user);
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let users = self.users.lock().await;
        Ok(users.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn find_user_returns_inserted_users_and_absence() {
        let repo = InMemoryUserRepository::new();
        let alice = User {
            id: UserId::new("alice".to_string()).unwrap(),
            display_name: "Alice".to_string(),
        };
        repo.insert_user(alice.clone()).await;

        let found = repo.find_user(&alice.id).await.unwrap();
        assert_eq!(found, Some(alice));

        let missing = repo
            .find_user(&UserId::new("bob".to_string()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing, None);
    }
}
