//! User entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use domain::models::Owner;

/// Database row mapping for the users table.
#[derive(Debug, Clone, FromRow)]
pub struct UserEntity {
    pub id: i64,
    pub username: String,
    pub primary_contact_email: String,
    pub created_at: DateTime<Utc>,
}

impl From<UserEntity> for Owner {
    fn from(entity: UserEntity) -> Self {
        Self {
            id: entity.id,
            username: entity.username,
            primary_contact_email: entity.primary_contact_email,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_entity_to_owner() {
        let owner: Owner = UserEntity {
            id: 4,
            username: "alice".to_string(),
            primary_contact_email: "alice@example.com".to_string(),
            created_at: Utc::now(),
        }
        .into();

        assert_eq!(owner.id, 4);
        assert_eq!(owner.username, "alice");
        assert_eq!(owner.primary_contact_email, "alice@example.com");
    }
}
