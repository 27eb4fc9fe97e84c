//! Schema bootstrap: table DDL, structure fixes for older databases,
//! indexes and the demo account.

use sqlx::{query, query_as};
use time::{Duration, OffsetDateTime};
use todolist_api_types::{ColumnInfo, DatabaseStatus, TableInfo};
use tracing::{info, warn};

use crate::application::database::TEST_USER_EMAIL;
use crate::application::repos::{RepoError, SchemaOptions, SchemaRepo};
use crate::domain::types::{DEFAULT_AVATAR, Priority};

use super::{PostgresRepositories, map_sqlx_error};

const CREATE_TABLES: [(&str, &str); 4] = [
    (
        "users",
        "CREATE TABLE IF NOT EXISTS users (
            id SERIAL PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            email VARCHAR(255) UNIQUE NOT NULL,
            password VARCHAR(255) NOT NULL,
            avatar TEXT DEFAULT '/placeholder.svg?height=120&width=120',
            registration_date DATE DEFAULT CURRENT_DATE,
            role VARCHAR(50) DEFAULT 'user',
            tfa_enabled BOOLEAN DEFAULT FALSE,
            tfa_secret TEXT,
            created_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
        )",
    ),
    (
        "tasks",
        "CREATE TABLE IF NOT EXISTS tasks (
            id SERIAL PRIMARY KEY,
            user_id INTEGER REFERENCES users(id) ON DELETE CASCADE,
            name VARCHAR(500) NOT NULL,
            description TEXT,
            priority VARCHAR(20) DEFAULT 'medium',
            deadline DATE,
            tags TEXT[],
            completed BOOLEAN DEFAULT FALSE,
            created_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
        )",
    ),
    (
        "user_history",
        "CREATE TABLE IF NOT EXISTS user_history (
            id SERIAL PRIMARY KEY,
            user_id INTEGER REFERENCES users(id) ON DELETE CASCADE,
            type VARCHAR(50) NOT NULL,
            action VARCHAR(255) NOT NULL,
            details TEXT,
            created_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
        )",
    ),
    (
        "push_subscriptions",
        "CREATE TABLE IF NOT EXISTS push_subscriptions (
            id SERIAL PRIMARY KEY,
            user_id INTEGER REFERENCES users(id) ON DELETE CASCADE,
            endpoint TEXT,
            subscription JSONB NOT NULL,
            created_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (user_id, endpoint)
        )",
    ),
];

/// Reverse dependency order.
const DROP_TABLES: [&str; 4] = ["push_subscriptions", "user_history", "tasks", "users"];

/// `(table, column, type and default)` added when missing.
const REQUIRED_COLUMNS: [(&str, &str, &str); 7] = [
    (
        "users",
        "avatar",
        "TEXT DEFAULT '/placeholder.svg?height=120&width=120'",
    ),
    ("users", "registration_date", "DATE DEFAULT CURRENT_DATE"),
    ("users", "role", "VARCHAR(50) DEFAULT 'user'"),
    ("users", "tfa_enabled", "BOOLEAN DEFAULT FALSE"),
    ("users", "tfa_secret", "TEXT DEFAULT NULL"),
    ("users", "created_at", "TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP"),
    ("users", "updated_at", "TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP"),
];

const INDEXES: [(&str, &str); 4] = [
    (
        "idx_users_email",
        "CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)",
    ),
    (
        "idx_tasks_user_id",
        "CREATE INDEX IF NOT EXISTS idx_tasks_user_id ON tasks(user_id)",
    ),
    (
        "idx_tasks_completed",
        "CREATE INDEX IF NOT EXISTS idx_tasks_completed ON tasks(completed)",
    ),
    (
        "idx_user_history_user_id",
        "CREATE INDEX IF NOT EXISTS idx_user_history_user_id ON user_history(user_id)",
    ),
];

const TEST_USER_NAME: &str = "Ivan Petrenko";
const TEST_TASK_NAME: &str = "First task";
const TEST_TASK_DESCRIPTION: &str = "A sample task showing what the tracker can do";

#[derive(Debug, sqlx::FromRow)]
struct ColumnRow {
    column_name: String,
    data_type: String,
    is_nullable: String,
    column_default: Option<String>,
}

impl PostgresRepositories {
    async fn column_exists(&self, table: &str, column: &str) -> Result<bool, RepoError> {
        let (exists,): (bool,) = query_as(
            "SELECT EXISTS (SELECT FROM information_schema.columns \
             WHERE table_name = $1 AND column_name = $2)",
        )
        .bind(table)
        .bind(column)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(exists)
    }

    /// Individual failures are logged and skipped.
    async fn add_missing_columns(&self) -> Result<(), RepoError> {
        for (table, column, definition) in REQUIRED_COLUMNS {
            if self.column_exists(table, column).await? {
                continue;
            }
            let sql = format!("ALTER TABLE {table} ADD COLUMN {column} {definition}");
            match query(&sql).execute(self.pool()).await {
                Ok(_) => info!(
                    target: "todolist::infra::db::schema",
                    table,
                    column,
                    "added missing column"
                ),
                Err(err) => warn!(
                    target: "todolist::infra::db::schema",
                    table,
                    column,
                    error = %err,
                    "failed to add missing column"
                ),
            }
        }
        Ok(())
    }

    async fn create_indexes(&self) {
        for (name, sql) in INDEXES {
            if let Err(err) = query(sql).execute(self.pool()).await {
                warn!(
                    target: "todolist::infra::db::schema",
                    index = name,
                    error = %err,
                    "failed to create index"
                );
            }
        }
    }

    async fn insert_test_data(&self, password_hash: &str) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let existing: Option<(i32,)> = query_as("SELECT id FROM users WHERE email = $1")
            .bind(TEST_USER_EMAIL)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        if existing.is_some() {
            info!(target: "todolist::infra::db::schema", "test data already present");
            return Ok(());
        }

        let (user_id,): (i32,) = query_as(
            "INSERT INTO users (name, email, password, avatar) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(TEST_USER_NAME)
        .bind(TEST_USER_EMAIL)
        .bind(password_hash)
        .bind(DEFAULT_AVATAR)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let deadline = (OffsetDateTime::now_utc() + Duration::days(7)).date();
        query(
            "INSERT INTO tasks (user_id, name, description, priority, deadline, tags, completed) \
             VALUES ($1, $2, $3, $4, $5, $6, FALSE)",
        )
        .bind(user_id)
        .bind(TEST_TASK_NAME)
        .bind(TEST_TASK_DESCRIPTION)
        .bind(Priority::High.as_str())
        .bind(deadline)
        .bind(vec!["test".to_string(), "demo".to_string()])
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        info!(
            target: "todolist::infra::db::schema",
            email = TEST_USER_EMAIL,
            "test data inserted"
        );
        Ok(())
    }

    async fn describe_table(&self, table: String) -> Result<TableInfo, RepoError> {
        let columns = query_as::<_, ColumnRow>(
            "SELECT column_name::text AS column_name, data_type::text AS data_type, \
             is_nullable::text AS is_nullable, column_default::text AS column_default \
             FROM information_schema.columns WHERE table_name = $1 ORDER BY ordinal_position",
        )
        .bind(&table)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        // Table names come from information_schema, quoted to survive odd names.
        let count_sql = format!("SELECT COUNT(*) FROM \"{}\"", table.replace('"', "\"\""));
        let records = match query_as::<_, (i64,)>(&count_sql)
            .fetch_one(self.pool())
            .await
        {
            Ok((count,)) => count,
            Err(err) => {
                warn!(
                    target: "todolist::infra::db::schema",
                    table = %table,
                    error = %err,
                    "failed to count records"
                );
                0
            }
        };

        Ok(TableInfo {
            name: table,
            records,
            columns: columns
                .into_iter()
                .map(|column| ColumnInfo {
                    name: column.column_name,
                    data_type: column.data_type,
                    nullable: column.is_nullable == "YES",
                    default: column.column_default,
                })
                .collect(),
        })
    }
}

#[async_trait::async_trait]
impl SchemaRepo for PostgresRepositories {
    async fn ping(&self) -> Result<(), RepoError> {
        self.select_one().await.map_err(map_sqlx_error)
    }

    async fn initialize(
        &self,
        options: SchemaOptions,
        test_password_hash: &str,
    ) -> Result<(), RepoError> {
        self.ping().await?;

        if options.drop_existing && !options.fix_only {
            for table in DROP_TABLES {
                query(&format!("DROP TABLE IF EXISTS {table} CASCADE"))
                    .execute(self.pool())
                    .await
                    .map_err(map_sqlx_error)?;
            }
            info!(target: "todolist::infra::db::schema", "existing tables dropped");
        }

        if !options.fix_only {
            for (table, sql) in CREATE_TABLES {
                query(sql)
                    .execute(self.pool())
                    .await
                    .map_err(map_sqlx_error)?;
                info!(target: "todolist::infra::db::schema", table, "table ensured");
            }
        }

        self.add_missing_columns().await?;
        self.create_indexes().await;

        if options.add_test_data
            && !options.fix_only
            && let Err(err) = self.insert_test_data(test_password_hash).await
        {
            warn!(
                target: "todolist::infra::db::schema",
                error = %err,
                "failed to insert test data"
            );
        }
        Ok(())
    }

    async fn describe(&self) -> Result<DatabaseStatus, RepoError> {
        let tables: Vec<(String,)> = query_as(
            "SELECT table_name::text AS table_name FROM information_schema.tables \
             WHERE table_schema = 'public' ORDER BY table_name",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut infos = Vec::with_capacity(tables.len());
        let mut total_records = 0;
        for (table,) in tables {
            let info = self.describe_table(table).await?;
            total_records += info.records;
            infos.push(info);
        }

        Ok(DatabaseStatus {
            tables: infos,
            total_records,
            status: "healthy".to_string(),
            error: None,
        })
    }
}
