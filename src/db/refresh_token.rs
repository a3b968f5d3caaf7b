//! Persisted refresh tokens backing the JWT session flow.
//!
//! A token is usable while `revoked_at` is NULL and `expires_at` lies in the
//! future. Revoked rows are kept until [`RefreshTokenRepository::cleanup_expired`]
//! runs so that logout can tell "already revoked" from "unknown".

use super::DbPool;
use crate::{Result, VaultError};

const COLUMNS: &str = "id, user_id, token, expires_at, created_at, revoked_at";
const USABLE: &str = "revoked_at IS NULL AND expires_at > datetime('now')";
const INSERT: &str =
    "INSERT INTO refresh_tokens (user_id, token, expires_at) VALUES ($1, $2, $3) RETURNING id";

/// A stored refresh token.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshToken {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    /// `YYYY-MM-DD HH:MM:SS` in UTC, comparable with SQLite's `datetime('now')`.
    pub expires_at: String,
    pub created_at: String,
    pub revoked_at: Option<String>,
}

/// Token about to be issued to a user.
#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub user_id: i64,
    pub token: String,
    pub expires_at: String,
}

pub struct RefreshTokenRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> RefreshTokenRepository<'a> {
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Store a freshly issued token.
    pub async fn create(&self, issued: &NewRefreshToken) -> Result<RefreshToken> {
        let id: i64 = sqlx::query_scalar(INSERT)
            .bind(issued.user_id)
            .bind(&issued.token)
            .bind(&issued.expires_at)
            .fetch_one(self.pool)
            .await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| VaultError::NotFound("refresh token vanished after insert".into()))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<RefreshToken>> {
        let sql = format!("SELECT {COLUMNS} FROM refresh_tokens WHERE id = $1");
        Ok(sqlx::query_as::<_, RefreshToken>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?)
    }

    /// Look a token up regardless of its state.
    pub async fn get_by_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        let sql = format!("SELECT {COLUMNS} FROM refresh_tokens WHERE token = $1");
        Ok(sqlx::query_as::<_, RefreshToken>(&sql)
            .bind(token)
            .fetch_optional(self.pool)
            .await?)
    }

    /// Look a token up only if it is neither revoked nor expired.
    pub async fn get_valid_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        let sql = format!("SELECT {COLUMNS} FROM refresh_tokens WHERE token = $1 AND {USABLE}");
        Ok(sqlx::query_as::<_, RefreshToken>(&sql)
            .bind(token)
            .fetch_optional(self.pool)
            .await?)
    }

    /// Returns false when the token was unknown or already revoked.
    pub async fn revoke(&self, token: &str) -> Result<bool> {
        let done = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = datetime('now')
             WHERE token = $1 AND revoked_at IS NULL",
        )
        .bind(token)
        .execute(self.pool)
        .await?;

        Ok(done.rows_affected() > 0)
    }

    /// End every session of a user. Returns how many tokens were revoked.
    pub async fn revoke_all_for_user(&self, user_id: i64) -> Result<u64> {
        let done = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = datetime('now')
             WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .execute(self.pool)
        .await?;

        Ok(done.rows_affected())
    }

    /// Revoke `old_token` and store `replacement` in one transaction.
    ///
    /// Returns `None` and writes nothing when `old_token` is not usable, so a
    /// token replayed after rotation is rejected.
    pub async fn rotate(
        &self,
        old_token: &str,
        replacement: &NewRefreshToken,
    ) -> Result<Option<RefreshToken>> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "UPDATE refresh_tokens SET revoked_at = datetime('now') WHERE token = $1 AND {USABLE}"
        );
        let spent = sqlx::query(&sql)
            .bind(old_token)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if spent == 0 {
            return Ok(None);
        }

        let id: i64 = sqlx::query_scalar(INSERT)
            .bind(replacement.user_id)
            .bind(&replacement.token)
            .bind(&replacement.expires_at)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        self.get_by_id(id).await
    }

    /// Purge expired and revoked rows. Run periodically by the web server.
    pub async fn cleanup_expired(&self) -> Result<u64> {
        let done = sqlx::query(
            "DELETE FROM refresh_tokens
             WHERE expires_at < datetime('now') OR revoked_at IS NOT NULL",
        )
        .execute(self.pool)
        .await?;

        Ok(done.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    const FUTURE: &str = "2099-12-31 23:59:59";
    const PAST: &str = "2000-01-01 00:00:00";

    async fn setup_db() -> Database {
        let db = Database::open_in_memory().await.unwrap();
        sqlx::query("INSERT INTO users (username, password, display_name) VALUES ($1, $2, $3)")
            .bind("alice")
            .bind("not-a-real-hash")
            .bind("Alice")
            .execute(db.pool())
            .await
            .unwrap();
        db
    }

    fn issued(token: &str, expires_at: &str) -> NewRefreshToken {
        NewRefreshToken {
            user_id: 1,
            token: token.to_string(),
            expires_at: expires_at.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let db = setup_db().await;
        let repo = RefreshTokenRepository::new(db.pool());

        let stored = repo.create(&issued("abc", FUTURE)).await.unwrap();
        assert_eq!(stored.user_id, 1);
        assert!(stored.revoked_at.is_none());

        let found = repo.get_by_token("abc").await.unwrap().unwrap();
        assert_eq!(found.id, stored.id);
        assert!(repo.get_by_token("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_token_is_not_usable() {
        let db = setup_db().await;
        let repo = RefreshTokenRepository::new(db.pool());
        repo.create(&issued("fresh", FUTURE)).await.unwrap();
        repo.create(&issued("stale", PAST)).await.unwrap();

        assert!(repo.get_valid_token("fresh").await.unwrap().is_some());
        assert!(repo.get_valid_token("stale").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revoke_keeps_row() {
        let db = setup_db().await;
        let repo = RefreshTokenRepository::new(db.pool());
        repo.create(&issued("session", FUTURE)).await.unwrap();

        assert!(repo.revoke("session").await.unwrap());
        assert!(!repo.revoke("session").await.unwrap());
        assert!(repo.get_valid_token("session").await.unwrap().is_none());

        let row = repo.get_by_token("session").await.unwrap().unwrap();
        assert!(row.revoked_at.is_some());
    }

    #[tokio::test]
    async fn test_revoke_all_for_user() {
        let db = setup_db().await;
        let repo = RefreshTokenRepository::new(db.pool());
        for name in ["laptop", "phone", "tablet"] {
            repo.create(&issued(name, FUTURE)).await.unwrap();
        }
        repo.revoke("tablet").await.unwrap();

        assert_eq!(repo.revoke_all_for_user(1).await.unwrap(), 2);
        for name in ["laptop", "phone"] {
            assert!(repo.get_valid_token(name).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_cleanup_removes_expired_and_revoked() {
        let db = setup_db().await;
        let repo = RefreshTokenRepository::new(db.pool());
        repo.create(&issued("stale", PAST)).await.unwrap();
        repo.create(&issued("revoked", FUTURE)).await.unwrap();
        repo.create(&issued("live", FUTURE)).await.unwrap();
        repo.revoke("revoked").await.unwrap();

        assert_eq!(repo.cleanup_expired().await.unwrap(), 2);
        assert!(repo.get_by_token("stale").await.unwrap().is_none());
        assert!(repo.get_by_token("revoked").await.unwrap().is_none());
        assert!(repo.get_by_token("live").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rotate_rejects_replay() {
        let db = setup_db().await;
        let repo = RefreshTokenRepository::new(db.pool());
        repo.create(&issued("first", FUTURE)).await.unwrap();

        let rotated = repo.rotate("first", &issued("second", FUTURE)).await.unwrap();
        assert_eq!(rotated.unwrap().token, "second");
        assert!(repo.get_valid_token("first").await.unwrap().is_none());

        let replay = repo.rotate("first", &issued("third", FUTURE)).await.unwrap();
        assert!(replay.is_none());
        assert!(repo.get_by_token("third").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rotate_expired_token() {
        let db = setup_db().await;
        let repo = RefreshTokenRepository::new(db.pool());
        repo.create(&issued("old", PAST)).await.unwrap();

        assert!(repo.rotate("old", &issued("new", FUTURE)).await.unwrap().is_none());
        assert!(repo.get_by_token("new").await.unwrap().is_none());
    }
}
