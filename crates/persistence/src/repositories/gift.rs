//! Gift repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use domain::errors::StoreError;
use domain::models::{Gift, GiftStatus, GiftSummary, Recipients};
use domain::services::GiftStore;

use crate::entities::{GiftEntity, GiftStatusEntity, GiftSummaryEntity};
use crate::metrics::QueryTimer;

/// Maps a driver error onto the store error taxonomy.
pub(crate) fn store_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound("row".to_string()),
        other => StoreError::Backend(other.to_string()),
    }
}

fn gift_lookup_error(gift_id: i64) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |err| match err {
        sqlx::Error::RowNotFound => StoreError::gift_not_found(gift_id),
        other => store_error(other),
    }
}

/// Repository for gift-related database operations.
#[derive(Clone)]
pub struct GiftRepository {
    pool: PgPool,
}

impl GiftRepository {
    /// Creates a new GiftRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl GiftStore for GiftRepository {
    async fn create_gift(
        &self,
        owner_id: i64,
        file_name: &str,
        file_data: &[u8],
        custom_message: &str,
    ) -> Result<Gift, StoreError> {
        let timer = QueryTimer::new("create_gift");
        let result = sqlx::query_as::<_, GiftEntity>(
            r#"
            INSERT INTO gifts (user_id, file_name, file_data, custom_message)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(file_name)
        .bind(file_data)
        .bind(custom_message)
        .fetch_one(&self.pool)
        .await;
        timer.record(&result);
        result.map(Gift::from).map_err(store_error)
    }

    async fn get_gift(&self, gift_id: i64) -> Result<Gift, StoreError> {
        let timer = QueryTimer::new("get_gift");
        let result = sqlx::query_as::<_, GiftEntity>(
            r#"
            SELECT * FROM gifts WHERE id = $1
            "#,
        )
        .bind(gift_id)
        .fetch_one(&self.pool)
        .await;
        timer.record(&result);
        result.map(Gift::from).map_err(gift_lookup_error(gift_id))
    }

    async fn get_status(&self, gift_id: i64) -> Result<GiftStatus, StoreError> {
        let timer = QueryTimer::new("get_gift_status");
        let result = sqlx::query_as::<_, GiftStatusEntity>(
            r#"
            SELECT id, user_id, pending, scheduled_release, receivers
            FROM gifts WHERE id = $1
            "#,
        )
        .bind(gift_id)
        .fetch_one(&self.pool)
        .await;
        timer.record(&result);
        result
            .map(GiftStatus::from)
            .map_err(gift_lookup_error(gift_id))
    }

    async fn set_recipients_and_schedule(
        &self,
        gift_id: i64,
        recipients: &Recipients,
        custom_message: Option<&str>,
        scheduled_release: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let timer = QueryTimer::new("set_gift_delivery");
        let result = sqlx::query(
            r#"
            UPDATE gifts SET
                receivers = $2,
                custom_message = COALESCE($3, custom_message),
                scheduled_release = $4
            WHERE id = $1
            "#,
        )
        .bind(gift_id)
        .bind(recipients.to_delimited())
        .bind(custom_message)
        .bind(scheduled_release)
        .execute(&self.pool)
        .await;
        timer.record(&result);

        if result.map_err(store_error)?.rows_affected() == 0 {
            return Err(StoreError::gift_not_found(gift_id));
        }
        Ok(())
    }

    async fn mark_released(&self, gift_id: i64) -> Result<bool, StoreError> {
        let timer = QueryTimer::new("mark_gift_released");
        let result = sqlx::query(
            r#"
            UPDATE gifts SET pending = FALSE WHERE id = $1
            "#,
        )
        .bind(gift_id)
        .execute(&self.pool)
        .await;
        timer.record(&result);
        Ok(result.map_err(store_error)?.rows_affected() > 0)
    }

    async fn is_pending(&self, gift_id: i64) -> Result<bool, StoreError> {
        let timer = QueryTimer::new("is_gift_pending");
        let result: Result<Option<bool>, sqlx::Error> =
            sqlx::query_scalar("SELECT pending FROM gifts WHERE id = $1")
                .bind(gift_id)
                .fetch_optional(&self.pool)
                .await;
        timer.record(&result);
        Ok(result.map_err(store_error)?.unwrap_or(false))
    }

    async fn has_any_pending_for_owner(&self, owner_id: i64) -> Result<bool, StoreError> {
        let timer = QueryTimer::new("has_pending_gifts");
        let result: Result<bool, sqlx::Error> = sqlx::query_scalar(
            r#"
            SELECT EXISTS (SELECT 1 FROM gifts WHERE user_id = $1 AND pending)
            "#,
        )
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await;
        timer.record(&result);
        result.map_err(store_error)
    }

    async fn pending_gift_ids_for_owner(&self, owner_id: i64) -> Result<Vec<i64>, StoreError> {
        let timer = QueryTimer::new("pending_gift_ids");
        let result: Result<Vec<i64>, sqlx::Error> = sqlx::query_scalar(
            r#"
            SELECT id FROM gifts WHERE user_id = $1 AND pending ORDER BY id
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await;
        timer.record(&result);
        result.map_err(store_error)
    }

    async fn list_gifts_for_owner(&self, owner_id: i64) -> Result<Vec<GiftSummary>, StoreError> {
        let timer = QueryTimer::new("list_gifts_for_owner");
        let result = sqlx::query_as::<_, GiftSummaryEntity>(
            r#"
            SELECT id, user_id, file_name, custom_message, receivers, pending,
                   scheduled_release, upload_time,
                   octet_length(file_data)::BIGINT AS size_bytes
            FROM gifts
            WHERE user_id = $1
            ORDER BY scheduled_release ASC NULLS LAST, id
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await;
        timer.record(&result);
        result
            .map(|rows| rows.into_iter().map(GiftSummary::from).collect())
            .map_err(store_error)
    }

    async fn list_armed_gifts(&self) -> Result<Vec<GiftStatus>, StoreError> {
        let timer = QueryTimer::new("list_armed_gifts");
        let result = sqlx::query_as::<_, GiftStatusEntity>(
            r#"
            SELECT id, user_id, pending, scheduled_release, receivers
            FROM gifts
            WHERE pending AND receivers <> ''
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await;
        timer.record(&result);
        result
            .map(|rows| rows.into_iter().map(GiftStatus::from).collect())
            .map_err(store_error)
    }

    async fn delete_gift(&self, gift_id: i64) -> Result<bool, StoreError> {
        let timer = QueryTimer::new("delete_gift");
        let result = sqlx::query("DELETE FROM gifts WHERE id = $1")
            .bind(gift_id)
            .execute(&self.pool)
            .await;
        timer.record(&result);
        Ok(result.map_err(store_error)?.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_gift_not_found() {
        let err = gift_lookup_error(8)(sqlx::Error::RowNotFound);
        assert_eq!(err, StoreError::gift_not_found(8));
    }

    #[test]
    fn test_driver_errors_map_to_backend() {
        let err = store_error(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Backend(_)));
        assert!(!err.is_not_found());
    }
}
