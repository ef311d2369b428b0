use actionrunner_core::execution::ExecutionError;

/// Errors from the target-database session layer.
#[derive(Debug, thiserror::Error)]
pub enum SqlError {
    #[error("cannot connect to {target}: {message}")]
    Connect { target: String, message: String },

    #[error("statement failed: {0}")]
    Statement(String),
}

impl From<sqlx::Error> for SqlError {
    fn from(err: sqlx::Error) -> Self {
        Self::Statement(err.to_string())
    }
}

impl From<SqlError> for ExecutionError {
    fn from(err: SqlError) -> Self {
        ExecutionError::Sql(err.to_string())
    }
}
