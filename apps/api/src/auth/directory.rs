//! Source of truth for account roles.
//!
//! Route guards read the role stored on the account, not the one baked into
//! the token, so demotions and deletions apply to tokens already issued.

use async_trait::async_trait;
use sqlx::{PgExecutor, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::auth::roles::Role;
use crate::errors::AppError;

#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Current role of `user_id`, or `None` when the account no longer exists.
    async fn current_role(&self, user_id: Uuid) -> Result<Option<Role>, AppError>;
}

/// Reads roles from the `users` table.
pub struct PgAccountDirectory(pub PgPool);

#[async_trait]
impl AccountDirectory for PgAccountDirectory {
    async fn current_role(&self, user_id: Uuid) -> Result<Option<Role>, AppError> {
        let stored: Option<String> = sqlx::query_scalar("SELECT role FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.0)
            .await?;
        stored
            .map(|role| {
                role.parse()
                    .map_err(|e| AppError::Internal(anyhow::anyhow!("User {user_id} has {e}")))
            })
            .transpose()
    }
}

/// Role for a freshly registered account. The address named by
/// `ADMIN_EMAIL` starts as admin so a new deployment has someone who can
/// reach `/api/admin`.
pub fn initial_role(email: &str, admin_email: Option<&str>) -> Role {
    match admin_email {
        Some(admin) if admin == email => Role::Admin,
        _ => Role::User,
    }
}

/// Promotes an existing `ADMIN_EMAIL` account at startup. Returns whether a
/// row changed.
pub async fn promote_admin<'e>(executor: impl PgExecutor<'e>, email: &str) -> Result<bool, AppError> {
    let result = sqlx::query(
        "UPDATE users SET role = $2, updated_at = now() WHERE email = $1 AND role <> $2",
    )
    .bind(email)
    .bind(Role::Admin.as_str())
    .execute(executor)
    .await?;
    let promoted = result.rows_affected() > 0;
    if promoted {
        info!("Promoted {email} to admin");
    }
    Ok(promoted)
}

/// In-memory directory for router tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryDirectory(std::sync::Mutex<std::collections::HashMap<Uuid, Role>>);

#[cfg(test)]
impl MemoryDirectory {
    pub fn insert(&self, user_id: Uuid, role: Role) {
        self.0.lock().unwrap().insert(user_id, role);
    }

    pub fn remove(&self, user_id: Uuid) {
        self.0.lock().unwrap().remove(&user_id);
    }
}

#[cfg(test)]
#[async_trait]
impl AccountDirectory for MemoryDirectory {
    async fn current_role(&self, user_id: Uuid) -> Result<Option<Role>, AppError> {
        Ok(self.0.lock().unwrap().get(&user_id).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_role() {
        assert_eq!(initial_role("sam@acme.io", None), Role::User);
        assert_eq!(initial_role("sam@acme.io", Some("boss@acme.io")), Role::User);
        assert_eq!(initial_role("boss@acme.io", Some("boss@acme.io")), Role::Admin);
    }

    #[tokio::test]
    async fn test_memory_directory_tracks_removal() {
        let directory = MemoryDirectory::default();
        let id = Uuid::new_v4();
        assert_eq!(directory.current_role(id).await.unwrap(), None);

        directory.insert(id, Role::TeamLead);
        assert_eq!(directory.current_role(id).await.unwrap(), Some(Role::TeamLead));

        directory.remove(id);
        assert_eq!(directory.current_role(id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_promote_admin_against_database() {
        let Some(pool) = crate::db::test_pool().await else {
            return;
        };
        let email = format!("boot-{}@acme.io", Uuid::new_v4());
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO users (email, password_hash, name, role) VALUES ($1, 'x', 'Boot', 'user') RETURNING id",
        )
        .bind(&email)
        .fetch_one(&pool)
        .await
        .unwrap();

        assert!(promote_admin(&pool, &email).await.unwrap());
        assert!(!promote_admin(&pool, &email).await.unwrap());

        let directory = PgAccountDirectory(pool.clone());
        assert_eq!(directory.current_role(id).await.unwrap(), Some(Role::Admin));

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&pool)
            .await
            .unwrap();
        assert_eq!(directory.current_role(id).await.unwrap(), None);
    }
}
