//! MySQL-protocol sessions (TiDB) backed by a sqlx pool.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Either, Row};

use actionrunner_core::job::TargetEndpoint;

use crate::error::SqlError;
use crate::session::{RecordSet, SessionConnector, SqlSession};
use crate::statement::{returns_rows, split_statements};

/// Rendering of SQL `NULL` in record sets.
pub const NULL_TEXT: &str = "NULL";

/// Credentials and pool sizing for target sessions.
///
/// Credentials come from the runner's configuration, never from the
/// invocation payload.
#[derive(Debug, Clone)]
pub struct TargetCredentials {
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for TargetCredentials {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            password: String::new(),
            database: "test".to_string(),
            max_connections: 4,
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

/// Opens pooled MySQL sessions.
pub struct MySqlConnector {
    credentials: TargetCredentials,
}

impl MySqlConnector {
    pub fn new(credentials: TargetCredentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl SessionConnector for MySqlConnector {
    async fn connect(&self, target: &TargetEndpoint) -> Result<Arc<dyn SqlSession>, SqlError> {
        let options = MySqlConnectOptions::new()
            .host(&target.host)
            .port(target.port)
            .username(&self.credentials.user)
            .password(&self.credentials.password)
            .database(&self.credentials.database);

        let pool = MySqlPoolOptions::new()
            .max_connections(self.credentials.max_connections)
            .acquire_timeout(self.credentials.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| SqlError::Connect {
                target: target.to_string(),
                message: e.to_string(),
            })?;

        tracing::info!(target = %target, "Target session pool created");
        Ok(Arc::new(MySqlSession { pool }))
    }
}

/// A pooled session; cheap to share between invocations.
pub struct MySqlSession {
    pool: MySqlPool,
}

#[async_trait]
impl SqlSession for MySqlSession {
    async fn execute(&self, statement: &str) -> Result<u64, SqlError> {
        let result = sqlx::raw_sql(statement).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn query(&self, statement: &str) -> Result<Vec<RecordSet>, SqlError> {
        // One entry per statement; the server sends one completion for each.
        let row_returning: Vec<bool> = split_statements(statement)
            .iter()
            .map(|s| returns_rows(s))
            .collect();

        let mut stream = sqlx::raw_sql(statement).fetch_many(&self.pool);
        let mut sets = Vec::new();
        let mut current = RecordSet::default();
        let mut index = 0;

        while let Some(item) = stream.try_next().await? {
            match item {
                // End of one statement's results.
                Either::Left(_) => {
                    let expects_rows = row_returning.get(index).copied().unwrap_or(false);
                    if expects_rows || !current.columns.is_empty() {
                        sets.push(std::mem::take(&mut current));
                    }
                    index += 1;
                }
                Either::Right(row) => {
                    if current.columns.is_empty() {
                        current.columns =
                            row.columns().iter().map(|c| c.name().to_string()).collect();
                    }
                    current.rows.push(render_row(&row));
                }
            }
        }
        if !current.columns.is_empty() {
            sets.push(current);
        }

        Ok(sets)
    }
}

/// Raw SQL runs over the text protocol, so every non-binary value decodes
/// as a string regardless of its column type.
fn render_row(row: &MySqlRow) -> Vec<String> {
    (0..row.len())
        .map(|i| match row.try_get_unchecked::<Option<String>, _>(i) {
            Ok(Some(text)) => text,
            Ok(None) => NULL_TEXT.to_string(),
            Err(_) => "<binary>".to_string(),
        })
        .collect()
}
