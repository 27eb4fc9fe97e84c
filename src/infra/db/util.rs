use crate::application::repos::RepoError;

/// Postgres SQLSTATE codes the repositories react to.
mod sqlstate {
    pub const UNIQUE_VIOLATION: &str = "23505";
    pub const FOREIGN_KEY_VIOLATION: &str = "23503";
    pub const NOT_NULL_VIOLATION: &str = "23502";
    pub const STRING_TOO_LONG: &str = "22001";
    pub const INVALID_TEXT: &str = "22P02";
    pub const QUERY_CANCELED: &str = "57014";
}

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db) => {
            let code = db.code().map(|code| code.into_owned()).unwrap_or_default();
            match code.as_str() {
                sqlstate::UNIQUE_VIOLATION => RepoError::Duplicate {
                    constraint: db.constraint().unwrap_or("unknown").to_string(),
                },
                sqlstate::FOREIGN_KEY_VIOLATION
                | sqlstate::NOT_NULL_VIOLATION
                | sqlstate::STRING_TOO_LONG
                | sqlstate::INVALID_TEXT => RepoError::InvalidInput {
                    message: db.message().to_string(),
                },
                sqlstate::QUERY_CANCELED => RepoError::Timeout,
                _ if code.starts_with("23") => RepoError::Integrity {
                    message: db.message().to_string(),
                },
                _ => RepoError::from_persistence(db.message()),
            }
        }
        other => RepoError::from_persistence(other),
    }
}
