//! User repository: the narrow reads the gift subsystem needs.

use sqlx::PgPool;

use domain::errors::StoreError;
use domain::models::Owner;
use domain::services::OwnerDirectory;

use crate::entities::UserEntity;
use crate::metrics::QueryTimer;
use crate::repositories::gift::store_error;

/// Repository for user lookups.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a user. Used for seeding and tests; account CRUD lives elsewhere.
    pub async fn create(
        &self,
        username: &str,
        primary_contact_email: &str,
    ) -> Result<UserEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_user");
        let result = sqlx::query_as::<_, UserEntity>(
            r#"
            INSERT INTO users (username, primary_contact_email)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(username)
        .bind(primary_contact_email)
        .fetch_one(&self.pool)
        .await;
        timer.record(&result);
        result
    }
}

#[async_trait::async_trait]
impl OwnerDirectory for UserRepository {
    async fn find_by_username(&self, username: &str) -> Result<Owner, StoreError> {
        let timer = QueryTimer::new("find_user_by_username");
        let result = sqlx::query_as::<_, UserEntity>(
            r#"
            SELECT * FROM users WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await;
        timer.record(&result);

        result
            .map_err(store_error)?
            .map(Owner::from)
            .ok_or_else(|| StoreError::owner_not_found(username))
    }

    async fn primary_contact(&self, owner_id: i64) -> Result<String, StoreError> {
        let timer = QueryTimer::new("find_user_contact");
        let result: Result<Option<String>, sqlx::Error> =
            sqlx::query_scalar("SELECT primary_contact_email FROM users WHERE id = $1")
                .bind(owner_id)
                .fetch_optional(&self.pool)
                .await;
        timer.record(&result);

        result
            .map_err(store_error)?
            .ok_or_else(|| StoreError::owner_not_found(owner_id))
    }
}
