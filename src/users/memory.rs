use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::repo::{RepoError, UserRepo};
use super::repo_types::{NewUser, User, UserChanges};

/// In-process `UserRepo` for tests. The mutex stands in for row locking.
#[derive(Default)]
pub struct MemoryUserRepo {
    rows: Mutex<HashMap<Uuid, User>>,
}

impl MemoryUserRepo {
    pub async fn count(&self) -> usize {
        self.rows.lock().await.len()
    }
}

fn username_taken(rows: &HashMap<Uuid, User>, username: &str, except: Option<Uuid>) -> bool {
    rows.values()
        .any(|u| u.username == username && Some(u.id) != except)
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn insert(&self, new: NewUser) -> Result<User, RepoError> {
        let mut rows = self.rows.lock().await;
        if username_taken(&rows, &new.username, None) {
            return Err(RepoError::DuplicateUsername);
        }
        let user = User {
            id: Uuid::new_v4(),
            username: new.username,
            password_hash: new.password_hash,
            first_name: new.first_name,
            last_name: new.last_name,
            is_superuser: new.is_superuser,
            date_joined: OffsetDateTime::now_utc(),
        };
        rows.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        Ok(self.rows.lock().await.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let rows = self.rows.lock().await;
        Ok(rows.values().find(|u| u.username == username).cloned())
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, RepoError> {
        let mut rows = self.rows.lock().await;
        if let Some(name) = &changes.username {
            if username_taken(&rows, name, Some(id)) {
                return Err(RepoError::DuplicateUsername);
            }
        }
        let Some(user) = rows.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(v) = changes.username {
            user.username = v;
        }
        if let Some(v) = changes.password_hash {
            user.password_hash = v;
        }
        if let Some(v) = changes.first_name {
            user.first_name = v;
        }
        if let Some(v) = changes.last_name {
            user.last_name = v;
        }
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepoError> {
        Ok(self.rows.lock().await.remove(&id).is_some())
    }
}
