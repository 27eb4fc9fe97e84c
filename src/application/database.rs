//! Schema bootstrap and inspection used by the admin endpoints and CLI.

use std::sync::Arc;

use todolist_api_types::{DatabaseInitRequest, DatabaseStatus, OperationResult};
use tracing::{error, info};

use crate::application::auth::{self, AuthError};
use crate::application::repos::{SchemaOptions, SchemaRepo};

/// Sign-in credentials of the seeded demo account.
pub const TEST_USER_EMAIL: &str = "ivan.petrenko@example.com";
pub const TEST_USER_PASSWORD: &str = "password123";

impl From<DatabaseInitRequest> for SchemaOptions {
    fn from(request: DatabaseInitRequest) -> Self {
        Self {
            drop_existing: request.drop_existing,
            add_test_data: request.add_test_data,
            fix_only: request.fix_only,
        }
    }
}

#[derive(Clone)]
pub struct DatabaseService {
    schema: Arc<dyn SchemaRepo>,
}

impl DatabaseService {
    pub fn new(schema: Arc<dyn SchemaRepo>) -> Self {
        Self { schema }
    }

    /// Run the bootstrap and fold any failure into the result body.
    pub async fn initialize(&self, options: SchemaOptions) -> OperationResult {
        match self.try_initialize(options).await {
            Ok(()) => {
                info!(
                    target: "todolist::application::database",
                    drop_existing = options.drop_existing,
                    add_test_data = options.add_test_data,
                    fix_only = options.fix_only,
                    "database initialized"
                );
                OperationResult {
                    success: true,
                    message: Some(if options.fix_only {
                        "Database structure fixed".to_string()
                    } else {
                        "Database initialized".to_string()
                    }),
                    error: None,
                }
            }
            Err(err) => {
                error!(
                    target: "todolist::application::database",
                    error = %err,
                    "database initialization failed"
                );
                OperationResult {
                    success: false,
                    message: None,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    pub async fn fix(&self) -> OperationResult {
        self.initialize(SchemaOptions::fix_only()).await
    }

    async fn try_initialize(&self, options: SchemaOptions) -> Result<(), AuthError> {
        let password_hash = if options.add_test_data && !options.fix_only {
            auth::hash_password(TEST_USER_PASSWORD)?
        } else {
            String::new()
        };
        self.schema.initialize(options, &password_hash).await?;
        Ok(())
    }

    /// Table listing with record counts. A failure yields status `error`.
    pub async fn status(&self) -> DatabaseStatus {
        match self.schema.describe().await {
            Ok(status) => status,
            Err(err) => {
                error!(
                    target: "todolist::application::database",
                    error = %err,
                    "database status failed"
                );
                DatabaseStatus {
                    tables: Vec::new(),
                    total_records: 0,
                    status: "error".to_string(),
                    error: Some(err.to_string()),
                }
            }
        }
    }

    pub async fn ping(&self) -> bool {
        self.schema.ping().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::application::repos::RepoError;

    #[derive(Default)]
    struct RecordingSchema {
        calls: Mutex<Vec<(SchemaOptions, bool)>>,
        fail: bool,
    }

    #[async_trait]
    impl SchemaRepo for RecordingSchema {
        async fn ping(&self) -> Result<(), RepoError> {
            Ok(())
        }

        async fn initialize(
            &self,
            options: SchemaOptions,
            test_password_hash: &str,
        ) -> Result<(), RepoError> {
            self.calls
                .lock()
                .unwrap()
                .push((options, !test_password_hash.is_empty()));
            if self.fail {
                Err(RepoError::Timeout)
            } else {
                Ok(())
            }
        }

        async fn describe(&self) -> Result<DatabaseStatus, RepoError> {
            Err(RepoError::Timeout)
        }
    }

    #[tokio::test]
    async fn seeding_hashes_the_demo_password() {
        let schema = Arc::new(RecordingSchema::default());
        let service = DatabaseService::new(schema.clone());

        let result = service.initialize(SchemaOptions::default()).await;
        assert!(result.success);
        let fixed = service.fix().await;
        assert_eq!(fixed.message.as_deref(), Some("Database structure fixed"));

        let calls = schema.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].1);
        assert!(!calls[1].1);
        assert!(calls[1].0.fix_only);
    }

    #[tokio::test]
    async fn failures_fold_into_the_result() {
        let service = DatabaseService::new(Arc::new(RecordingSchema {
            fail: true,
            ..Default::default()
        }));
        let result = service.initialize(SchemaOptions::default()).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("database timeout"));

        let status = service.status().await;
        assert_eq!(status.status, "error");
        assert!(status.tables.is_empty());
    }
}
