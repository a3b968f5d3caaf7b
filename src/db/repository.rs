//! Queries over the `users` table.

use sqlx::{QueryBuilder, Sqlite};

use super::user::{NewUser, Role, User, UserUpdate};
use super::{conflict_or_db, DbPool};
use crate::{Result, VaultError};

const USER_SELECT: &str = "SELECT u.id, u.username, u.password, u.display_name, u.email, u.role,
        u.storage_limit, u.is_active, u.created_at, u.last_login
     FROM users u";

pub struct UserRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert an account. Usernames collide case-insensitively and yield
    /// `Conflict`.
    pub async fn create(&self, new_user: &NewUser) -> Result<User> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (username, password, display_name, email, role, storage_limit)
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(&new_user.username)
        .bind(&new_user.password)
        .bind(&new_user.display_name)
        .bind(&new_user.email)
        .bind(new_user.role.as_str())
        .bind(new_user.storage_limit)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_or_db(e, "username already taken"))?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| VaultError::NotFound("user".to_string()))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("{USER_SELECT} WHERE u.id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?)
    }

    /// Case-insensitive lookup used by login.
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let sql = format!("{USER_SELECT} WHERE u.username = $1 COLLATE NOCASE");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(self.pool)
            .await?)
    }

    /// Apply the fields set in `update`. Returns `None` for an unknown id.
    pub async fn update(&self, id: i64, update: &UserUpdate) -> Result<Option<User>> {
        if update.is_empty() {
            return self.get_by_id(id).await;
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE users SET ");
        let mut set = query.separated(", ");
        if let Some(password) = &update.password {
            set.push("password = ").push_bind_unseparated(password);
        }
        if let Some(display_name) = &update.display_name {
            set.push("display_name = ").push_bind_unseparated(display_name);
        }
        if let Some(email) = &update.email {
            set.push("email = ").push_bind_unseparated(email.clone());
        }
        if let Some(role) = update.role {
            set.push("role = ").push_bind_unseparated(role.as_str());
        }
        if let Some(limit) = update.storage_limit {
            set.push("storage_limit = ").push_bind_unseparated(limit);
        }
        if let Some(active) = update.is_active {
            set.push("is_active = ").push_bind_unseparated(active);
        }
        query.push(" WHERE id = ").push_bind(id);

        let touched = query.build().execute(self.pool).await?.rows_affected();
        if touched == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    pub async fn update_last_login(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = datetime('now') WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Memberships, file rows and refresh tokens cascade. Blob cleanup is
    /// the caller's job.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let done = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    /// One page of users ordered by username.
    pub async fn list(&self, offset: i64, limit: i64) -> Result<Vec<User>> {
        let sql = format!("{USER_SELECT} ORDER BY u.username COLLATE NOCASE LIMIT $1 OFFSET $2");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool)
            .await?)
    }

    /// Members of a group ordered by username.
    pub async fn list_by_group(&self, group_id: i64) -> Result<Vec<User>> {
        let sql = format!(
            "{USER_SELECT}
             JOIN group_members gm ON gm.user_id = u.id
             WHERE gm.group_id = $1
             ORDER BY u.username COLLATE NOCASE"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(group_id)
            .fetch_all(self.pool)
            .await?)
    }

    pub async fn count(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool)
            .await?)
    }

    /// Used to keep at least one active administrator around.
    pub async fn count_active_by_role(&self, role: Role) -> Result<i64> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = $1 AND is_active = 1")
                .bind(role.as_str())
                .fetch_one(self.pool)
                .await?,
        )
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        Ok(sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 COLLATE NOCASE)",
        )
        .bind(username)
        .fetch_one(self.pool)
        .await?)
    }
}
