use async_trait::async_trait;
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::{
    db::PgStore,
    error::StoreError,
    tasks::repo_types::{NewTask, Priority, Task, TaskStatus},
};

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Tasks owned by `user_id`, newest first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Task>, StoreError>;
    async fn create(&self, task: NewTask) -> Result<Task, StoreError>;
}

#[derive(FromRow)]
struct TaskRow {
    id: Uuid,
    user_id: Uuid,
    title: String,
    description: String,
    due_date: Option<Date>,
    priority: String,
    category: String,
    status: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<TaskRow> for Task {
    fn from(r: TaskRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            title: r.title,
            description: r.description,
            due_date: r.due_date,
            priority: Priority::parse(&r.priority).unwrap_or_default(),
            category: r.category,
            status: TaskStatus::parse(&r.status).unwrap_or_default(),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Task>, StoreError> {
        let rows = self
            .timed(
                "tasks.list_for_user",
                sqlx::query_as::<_, TaskRow>(
                    r#"
                    SELECT id, user_id, title, description, due_date, priority,
                           category, status, created_at, updated_at
                      FROM tasks
                     WHERE user_id = $1
                     ORDER BY created_at DESC
                    "#,
                )
                .bind(user_id)
                .fetch_all(&self.pool),
            )
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create(&self, task: NewTask) -> Result<Task, StoreError> {
        let row = self
            .timed(
                "tasks.create",
                sqlx::query_as::<_, TaskRow>(
                    r#"
                    INSERT INTO tasks (id, user_id, title, description, due_date,
                                       priority, category, status)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    RETURNING id, user_id, title, description, due_date, priority,
                              category, status, created_at, updated_at
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(task.user_id)
                .bind(&task.title)
                .bind(&task.description)
                .bind(task.due_date)
                .bind(task.priority.as_str())
                .bind(&task.category)
                .bind(task.status.as_str())
                .fetch_one(&self.pool),
            )
            .await?;
        Ok(row.into())
    }
}
