use async_trait::async_trait;
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::repo_types::{NewUser, ProfileUpdate, UserRecord, UserSettings},
    db::PgStore,
    error::StoreError,
};

/// Persistence for user records, as seen by the auth boundary.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError>;
    /// Fails with `StoreError::Duplicate` when the email is already taken.
    async fn insert(&self, user: NewUser) -> Result<UserRecord, StoreError>;
    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<UserRecord>, StoreError>;
    async fn update_settings(
        &self,
        id: Uuid,
        settings: UserSettings,
    ) -> Result<Option<UserRecord>, StoreError>;
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    settings: Json<UserSettings>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<UserRow> for UserRecord {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            email: r.email,
            password_hash: r.password_hash,
            settings: r.settings.0,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

const USER_COLUMNS: &str = "id, name, email, password_hash, settings, created_at, updated_at";

#[async_trait]
impl UserStore for PgStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = self
            .timed(
                "users.find_by_email",
                sqlx::query_as::<_, UserRow>(&sql)
                    .bind(email)
                    .fetch_optional(&self.pool),
            )
            .await?;
        Ok(row.map(Into::into))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = self
            .timed(
                "users.find_by_id",
                sqlx::query_as::<_, UserRow>(&sql)
                    .bind(id)
                    .fetch_optional(&self.pool),
            )
            .await?;
        Ok(row.map(Into::into))
    }

    async fn insert(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        // users_email_key turns a lost signup race into a 23505 -> Duplicate
        let sql = format!(
            r#"
            INSERT INTO users (id, name, email, password_hash, settings)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = self
            .timed(
                "users.insert",
                sqlx::query_as::<_, UserRow>(&sql)
                    .bind(Uuid::new_v4())
                    .bind(&user.name)
                    .bind(&user.email)
                    .bind(&user.password_hash)
                    .bind(Json(&user.settings))
                    .fetch_one(&self.pool),
            )
            .await?;
        Ok(row.into())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<UserRecord>, StoreError> {
        let sql = format!(
            r#"
            UPDATE users
               SET name = COALESCE($2, name),
                   email = COALESCE($3, email),
                   updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = self
            .timed(
                "users.update_profile",
                sqlx::query_as::<_, UserRow>(&sql)
                    .bind(id)
                    .bind(update.name)
                    .bind(update.email)
                    .fetch_optional(&self.pool),
            )
            .await?;
        Ok(row.map(Into::into))
    }

    async fn update_settings(
        &self,
        id: Uuid,
        settings: UserSettings,
    ) -> Result<Option<UserRecord>, StoreError> {
        let sql = format!(
            r#"
            UPDATE users
               SET settings = $2, updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = self
            .timed(
                "users.update_settings",
                sqlx::query_as::<_, UserRow>(&sql)
                    .bind(id)
                    .bind(Json(settings))
                    .fetch_optional(&self.pool),
            )
            .await?;
        Ok(row.map(Into::into))
    }
}
