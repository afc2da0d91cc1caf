use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::ports::UserRepository;
use crate::user::errors::UserError;

#[derive(Debug, Default)]
struct UserTable {
    users: HashMap<UserId, User>,
    /// Unique index: email -> owning user
    ids_by_email: HashMap<EmailAddress, UserId>,
}

/// Map-backed user store.
///
/// Users and the email index share one lock, so the uniqueness check and the
/// insert in `create` happen in the same critical section. Lookups take the
/// read lock and run concurrently.
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    table: RwLock<UserTable>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.users.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: User) -> Result<User, UserError> {
        let mut table = self.table.write().await;

        if table.ids_by_email.contains_key(&user.email) {
            return Err(UserError::EmailAlreadyExists);
        }
        if table.users.contains_key(&user.id) {
            return Err(UserError::Storage(format!("duplicate user id {}", user.id)));
        }

        table.ids_by_email.insert(user.email.clone(), user.id);
        table.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, UserError> {
        let table = self.table.read().await;

        Ok(table
            .ids_by_email
            .get(email)
            .and_then(|id| table.users.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError> {
        Ok(self.table.read().await.users.get(id).cloned())
    }

    async fn update(&self, user: User) -> Result<User, UserError> {
        let mut table = self.table.write().await;

        let previous_email = match table.users.get(&user.id) {
            Some(existing) => existing.email.clone(),
            None => return Err(UserError::NotFound(user.id.to_string())),
        };

        if previous_email != user.email {
            if table.ids_by_email.contains_key(&user.email) {
                return Err(UserError::EmailAlreadyExists);
            }
            table.ids_by_email.remove(&previous_email);
            table.ids_by_email.insert(user.email.clone(), user.id);
        }

        table.users.insert(user.id, user.clone());

        Ok(user)
    }
}
