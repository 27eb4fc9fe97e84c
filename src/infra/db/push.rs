use serde_json::Value;
use sqlx::query;

use crate::application::repos::{PushSubscriptionsRepo, RepoError};

use super::{PostgresRepositories, map_sqlx_error};

#[async_trait::async_trait]
impl PushSubscriptionsRepo for PostgresRepositories {
    /// One row per endpoint; resubscribing replaces the stored keys.
    async fn save_subscription(&self, user_id: i32, subscription: &Value) -> Result<(), RepoError> {
        let endpoint = subscription
            .get("endpoint")
            .and_then(Value::as_str)
            .map(str::to_owned);

        query(
            "INSERT INTO push_subscriptions (user_id, endpoint, subscription) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, endpoint) DO UPDATE SET subscription = EXCLUDED.subscription, \
             created_at = CURRENT_TIMESTAMP",
        )
        .bind(user_id)
        .bind(endpoint)
        .bind(sqlx::types::Json(subscription))
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }
}
