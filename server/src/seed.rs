use chrono::Utc;
use uuid::Uuid;

use crate::auth::hash_password;
use crate::config::AdminSeed;
use crate::models::{User, UserRole};
use crate::store::{Store, UserRepo};
use crate::utils::error::Result;

/// Makes sure the configured administrator exists and holds the admin role.
/// An existing account keeps its password.
pub async fn seed_admin(store: &dyn Store, seed: &AdminSeed) -> Result<User> {
    let now = Utc::now();
    if let Some(mut existing) = store.find_user_by_login(&seed.email).await? {
        if existing.role == UserRole::Admin {
            tracing::debug!(user_id = %existing.id, "Admin account already present");
            return Ok(existing);
        }
        existing.role = UserRole::Admin;
        existing.updated_at = now;
        let promoted = store.update_user(&existing).await?;
        tracing::info!(user_id = %promoted.id, "Promoted seeded account to admin");
        return Ok(promoted);
    }

    let username = seed
        .email
        .split('@')
        .next()
        .filter(|local| local.len() >= 3)
        .unwrap_or("admin")
        .to_string();
    let admin = User {
        id: Uuid::new_v4(),
        email: seed.email.clone(),
        username,
        first_name: "System".to_string(),
        second_name: "Administrator".to_string(),
        profile_image: None,
        role: UserRole::Admin,
        password_hash: hash_password(&seed.password)?,
        registered_at: now,
        updated_at: now,
    };
    let admin = store.create_user(admin).await?;
    tracing::info!(user_id = %admin.id, email = %admin.email, "Seeded admin account");
    Ok(admin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_password;
    use crate::store::MemoryStore;

    fn seed() -> AdminSeed {
        AdminSeed {
            email: "root@example.com".to_string(),
            password: "root-pass-123".to_string(),
        }
    }

    #[tokio::test]
    async fn test_seed_creates_admin_once() {
        let store = MemoryStore::new();
        let first = seed_admin(&store, &seed()).await.unwrap();
        assert_eq!(first.role, UserRole::Admin);
        assert_eq!(first.username, "root");
        assert!(verify_password("root-pass-123", &first.password_hash).unwrap());

        let second = seed_admin(&store, &seed()).await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(store.list_users().await.unwrap().len(), 1);
    }
}
