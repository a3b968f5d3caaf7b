//! Groups and group membership.

use sqlx::QueryBuilder;

use super::{conflict_or_db, DbPool};
use crate::{Result, VaultError};

/// A group of users sharing a storage area.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub description: String,
    /// Storage ceiling in bytes applied to members without a personal one.
    pub storage_limit: Option<i64>,
    pub created_at: String,
}

/// A group together with its aggregate counters.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GroupSummary {
    #[sqlx(flatten)]
    pub group: Group,
    pub member_count: i64,
    /// Sum of the sizes of all files stored in the group.
    pub used_bytes: i64,
}

/// Data for creating a new group.
#[derive(Debug, Clone)]
pub struct NewGroup {
    pub name: String,
    pub description: String,
    pub storage_limit: Option<i64>,
}

impl NewGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            storage_limit: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_storage_limit(mut self, limit: Option<i64>) -> Self {
        self.storage_limit = limit;
        self
    }
}

/// Partial update of a group. `storage_limit: Some(None)` clears the limit.
#[derive(Debug, Clone, Default)]
pub struct GroupUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub storage_limit: Option<Option<i64>>,
}

impl GroupUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.storage_limit.is_none()
    }
}

const SUMMARY_SELECT: &str = "SELECT g.id, g.name, g.description, g.storage_limit, g.created_at,
        (SELECT COUNT(*) FROM group_members gm WHERE gm.group_id = g.id) AS member_count,
        (SELECT COALESCE(SUM(f.size), 0) FROM files f WHERE f.group_id = g.id) AS used_bytes
     FROM groups g";

/// Repository for groups and their memberships.
pub struct GroupRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> GroupRepository<'a> {
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a group. Fails with `Conflict` if the name is taken.
    pub async fn create(&self, new_group: &NewGroup) -> Result<Group> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO groups (name, description, storage_limit) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&new_group.name)
        .bind(&new_group.description)
        .bind(new_group.storage_limit)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_or_db(e, "group name already taken"))?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| VaultError::NotFound("group".to_string()))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Group>> {
        let group = sqlx::query_as::<_, Group>(
            "SELECT id, name, description, storage_limit, created_at FROM groups WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| VaultError::Database(e.to_string()))?;

        Ok(group)
    }

    /// Get a group with its member count and used storage.
    pub async fn get_summary(&self, id: i64) -> Result<Option<GroupSummary>> {
        let sql = format!("{SUMMARY_SELECT} WHERE g.id = $1");
        let summary = sqlx::query_as::<_, GroupSummary>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| VaultError::Database(e.to_string()))?;

        Ok(summary)
    }

    /// List all groups by name.
    pub async fn list_summaries(&self, offset: i64, limit: i64) -> Result<Vec<GroupSummary>> {
        let sql = format!("{SUMMARY_SELECT} ORDER BY g.name COLLATE NOCASE LIMIT $1 OFFSET $2");
        let groups = sqlx::query_as::<_, GroupSummary>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool)
            .await
            .map_err(|e| VaultError::Database(e.to_string()))?;

        Ok(groups)
    }

    /// List the groups a user belongs to, by name.
    pub async fn list_summaries_for_user(
        &self,
        user_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<GroupSummary>> {
        let sql = format!(
            "{SUMMARY_SELECT}
             WHERE g.id IN (SELECT group_id FROM group_members WHERE user_id = $1)
             ORDER BY g.name COLLATE NOCASE LIMIT $2 OFFSET $3"
        );
        let groups = sqlx::query_as::<_, GroupSummary>(&sql)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool)
            .await
            .map_err(|e| VaultError::Database(e.to_string()))?;

        Ok(groups)
    }

    /// Groups the user is a member of, without counters.
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Group>> {
        let groups = sqlx::query_as::<_, Group>(
            "SELECT g.id, g.name, g.description, g.storage_limit, g.created_at
             FROM groups g
             JOIN group_members gm ON gm.group_id = g.id
             WHERE gm.user_id = $1
             ORDER BY g.name COLLATE NOCASE",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await
        .map_err(|e| VaultError::Database(e.to_string()))?;

        Ok(groups)
    }

    pub async fn count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM groups")
            .fetch_one(self.pool)
            .await
            .map_err(|e| VaultError::Database(e.to_string()))?;
        Ok(count.0)
    }

    pub async fn count_for_user(&self, user_id: i64) -> Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM group_members WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(self.pool)
                .await
                .map_err(|e| VaultError::Database(e.to_string()))?;
        Ok(count.0)
    }

    /// Apply a partial update. Returns `None` if the group doesn't exist.
    pub async fn update(&self, id: i64, update: &GroupUpdate) -> Result<Option<Group>> {
        if update.is_empty() {
            return self.get_by_id(id).await;
        }

        let mut query: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new("UPDATE groups SET ");
        let mut separated = query.separated(", ");

        if let Some(ref name) = update.name {
            separated.push("name = ");
            separated.push_bind_unseparated(name);
        }
        if let Some(ref description) = update.description {
            separated.push("description = ");
            separated.push_bind_unseparated(description);
        }
        if let Some(storage_limit) = update.storage_limit {
            separated.push("storage_limit = ");
            separated.push_bind_unseparated(storage_limit);
        }

        query.push(" WHERE id = ");
        query.push_bind(id);

        let result = query
            .build()
            .execute(self.pool)
            .await
            .map_err(|e| conflict_or_db(e, "group name already taken"))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_by_id(id).await
    }

    /// Delete a group; memberships and file rows cascade.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM groups WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| VaultError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    /// Add a user to a group. Returns false if already a member.
    pub async fn add_member(&self, group_id: i64, user_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO group_members (group_id, user_id) VALUES ($1, $2)",
        )
        .bind(group_id)
        .bind(user_id)
        .execute(self.pool)
        .await
        .map_err(|e| VaultError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove a user from a group. Returns false if not a member.
    pub async fn remove_member(&self, group_id: i64, user_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM group_members WHERE group_id = $1 AND user_id = $2")
            .bind(group_id)
            .bind(user_id)
            .execute(self.pool)
            .await
            .map_err(|e| VaultError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn is_member(&self, group_id: i64, user_id: i64) -> Result<bool> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM group_members WHERE group_id = $1 AND user_id = $2)",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| VaultError::Database(e.to_string()))?;
        Ok(exists.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewUser, UserRepository};
    use crate::Database;

    async fn setup() -> (Database, i64, i64) {
        let db = Database::open_in_memory().await.unwrap();
        let users = UserRepository::new(db.pool());
        let alice = users
            .create(&NewUser::new("alice", "pw", "Alice"))
            .await
            .unwrap();
        let bob = users.create(&NewUser::new("bob", "pw", "Bob")).await.unwrap();
        (db, alice.id, bob.id)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (db, _, _) = setup().await;
        let repo = GroupRepository::new(db.pool());

        let group = repo
            .create(
                &NewGroup::new("design")
                    .with_description("Design team")
                    .with_storage_limit(Some(1_000_000)),
            )
            .await
            .unwrap();

        assert_eq!(group.name, "design");
        assert_eq!(group.description, "Design team");
        assert_eq!(group.storage_limit, Some(1_000_000));

        let found = repo.get_by_id(group.id).await.unwrap().unwrap();
        assert_eq!(found.name, "design");
        assert!(repo.get_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_name_conflict() {
        let (db, _, _) = setup().await;
        let repo = GroupRepository::new(db.pool());

        repo.create(&NewGroup::new("design")).await.unwrap();
        let result = repo.create(&NewGroup::new("Design")).await;
        assert!(matches!(result, Err(VaultError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_membership() {
        let (db, alice, bob) = setup().await;
        let repo = GroupRepository::new(db.pool());
        let group = repo.create(&NewGroup::new("design")).await.unwrap();

        assert!(repo.add_member(group.id, alice).await.unwrap());
        assert!(!repo.add_member(group.id, alice).await.unwrap());
        assert!(repo.is_member(group.id, alice).await.unwrap());
        assert!(!repo.is_member(group.id, bob).await.unwrap());

        let summary = repo.get_summary(group.id).await.unwrap().unwrap();
        assert_eq!(summary.member_count, 1);
        assert_eq!(summary.used_bytes, 0);

        assert_eq!(repo.list_for_user(alice).await.unwrap().len(), 1);
        assert!(repo.list_for_user(bob).await.unwrap().is_empty());

        assert!(repo.remove_member(group.id, alice).await.unwrap());
        assert!(!repo.remove_member(group.id, alice).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_and_clear_limit() {
        let (db, _, _) = setup().await;
        let repo = GroupRepository::new(db.pool());
        let group = repo
            .create(&NewGroup::new("design").with_storage_limit(Some(10)))
            .await
            .unwrap();

        let update = GroupUpdate {
            name: Some("art".to_string()),
            description: None,
            storage_limit: Some(None),
        };
        let updated = repo.update(group.id, &update).await.unwrap().unwrap();
        assert_eq!(updated.name, "art");
        assert!(updated.storage_limit.is_none());

        assert!(repo.update(999, &update).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_cascades_memberships() {
        let (db, alice, _) = setup().await;
        let repo = GroupRepository::new(db.pool());
        let group = repo.create(&NewGroup::new("design")).await.unwrap();
        repo.add_member(group.id, alice).await.unwrap();

        assert!(repo.delete(group.id).await.unwrap());
        assert_eq!(repo.count_for_user(alice).await.unwrap(), 0);
        assert!(!repo.delete(group.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_summaries() {
        let (db, alice, _) = setup().await;
        let repo = GroupRepository::new(db.pool());
        let b = repo.create(&NewGroup::new("beta")).await.unwrap();
        repo.create(&NewGroup::new("alpha")).await.unwrap();
        repo.add_member(b.id, alice).await.unwrap();

        let all = repo.list_summaries(0, 10).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].group.name, "alpha");
        assert_eq!(repo.count().await.unwrap(), 2);

        let mine = repo.list_summaries_for_user(alice, 0, 10).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].group.name, "beta");
        assert_eq!(mine[0].member_count, 1);
    }
}
