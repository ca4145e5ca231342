use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    auth::{
        repo::UserStore,
        repo_types::{NewUser, ProfileUpdate, UserRecord, UserSettings},
    },
    error::StoreError,
    tasks::{
        repo::TaskStore,
        repo_types::{NewTask, Task},
    },
};

/// In-process store used in degraded mode or when `STORE_BACKEND=memory`.
///
/// Built once at startup and injected through `AppState`; contents live only
/// as long as the process.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<Users>,
    tasks: RwLock<Vec<Task>>,
}

#[derive(Default)]
struct Users {
    by_id: HashMap<Uuid, UserRecord>,
    id_by_email: HashMap<String, Uuid>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .id_by_email
            .get(email)
            .and_then(|id| users.by_id.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.read().await.by_id.get(&id).cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let mut users = self.users.write().await;
        if users.id_by_email.contains_key(&user.email) {
            return Err(StoreError::Duplicate);
        }
        let now = OffsetDateTime::now_utc();
        let record = UserRecord {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            settings: user.settings,
            created_at: now,
            updated_at: now,
        };
        users.id_by_email.insert(record.email.clone(), record.id);
        users.by_id.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<UserRecord>, StoreError> {
        let mut users = self.users.write().await;
        let Some(current_email) = users.by_id.get(&id).map(|u| u.email.clone()) else {
            return Ok(None);
        };

        if let Some(email) = &update.email {
            match users.id_by_email.get(email) {
                Some(owner) if *owner != id => return Err(StoreError::Duplicate),
                _ => {}
            }
            users.id_by_email.remove(&current_email);
            users.id_by_email.insert(email.clone(), id);
        }

        let Some(record) = users.by_id.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = update.name {
            record.name = name;
        }
        if let Some(email) = update.email {
            record.email = email;
        }
        record.updated_at = OffsetDateTime::now_utc();
        Ok(Some(record.clone()))
    }

    async fn update_settings(
        &self,
        id: Uuid,
        settings: UserSettings,
    ) -> Result<Option<UserRecord>, StoreError> {
        let mut users = self.users.write().await;
        Ok(users.by_id.get_mut(&id).map(|record| {
            record.settings = settings;
            record.updated_at = OffsetDateTime::now_utc();
            record.clone()
        }))
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Task>, StoreError> {
        let tasks = self.tasks.read().await;
        // appended in creation order
        Ok(tasks
            .iter()
            .rev()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn create(&self, task: NewTask) -> Result<Task, StoreError> {
        let now = OffsetDateTime::now_utc();
        let task = Task {
            id: Uuid::new_v4(),
            user_id: task.user_id,
            title: task.title,
            description: task.description,
            due_date: task.due_date,
            priority: task.priority,
            category: task.category,
            status: task.status,
            created_at: now,
            updated_at: now,
        };
        self.tasks.write().await.push(task.clone());
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::repo_types::{Priority, TaskStatus};

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Test User".into(),
            email: email.into(),
            password_hash: "hash".into(),
            settings: UserSettings::default(),
        }
    }

    fn new_task(user_id: Uuid, title: &str) -> NewTask {
        NewTask {
            user_id,
            title: title.into(),
            description: String::new(),
            due_date: None,
            priority: Priority::Medium,
            category: "Uncategorized".into(),
            status: TaskStatus::Todo,
        }
    }

    #[tokio::test]
    async fn insert_then_find_by_email_and_id() {
        let store = MemoryStore::new();
        let created = store.insert(new_user("a@x.com")).await.unwrap();
        let by_email = store.find_by_email("a@x.com").await.unwrap().unwrap();
        let by_id = store.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);
        assert_eq!(by_id.email, "a@x.com");
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_without_new_record() {
        let store = MemoryStore::new();
        store.insert(new_user("a@x.com")).await.unwrap();
        let err = store.insert(new_user("a@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate));
        assert_eq!(store.users.read().await.by_id.len(), 1);
    }

    #[tokio::test]
    async fn email_lookup_is_case_sensitive() {
        let store = MemoryStore::new();
        store.insert(new_user("a@x.com")).await.unwrap();
        assert!(store.find_by_email("A@X.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn profile_update_moves_email_index() {
        let store = MemoryStore::new();
        let user = store.insert(new_user("old@x.com")).await.unwrap();
        let updated = store
            .update_profile(
                user.id,
                ProfileUpdate {
                    name: Some("New".into()),
                    email: Some("new@x.com".into()),
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "New");
        assert!(store.find_by_email("old@x.com").await.unwrap().is_none());
        assert_eq!(
            store.find_by_email("new@x.com").await.unwrap().unwrap().id,
            user.id
        );
    }

    #[tokio::test]
    async fn profile_update_rejects_taken_email() {
        let store = MemoryStore::new();
        store.insert(new_user("a@x.com")).await.unwrap();
        let b = store.insert(new_user("b@x.com")).await.unwrap();
        let err = store
            .update_profile(
                b.id,
                ProfileUpdate {
                    name: None,
                    email: Some("a@x.com".into()),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate));
    }

    #[tokio::test]
    async fn update_unknown_user_returns_none() {
        let store = MemoryStore::new();
        let res = store
            .update_settings(Uuid::new_v4(), UserSettings::default())
            .await
            .unwrap();
        assert!(res.is_none());
    }

    #[tokio::test]
    async fn tasks_are_scoped_and_newest_first() {
        let store = MemoryStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        store.create(new_task(alice, "first")).await.unwrap();
        store.create(new_task(bob, "other")).await.unwrap();
        store.create(new_task(alice, "second")).await.unwrap();

        let titles: Vec<String> = store
            .list_for_user(alice)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["second", "first"]);
    }
}
