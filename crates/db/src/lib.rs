//! Target-database access for the runners: pooled sessions, the
//! per-endpoint session cache, bounded script batches and inline statements.

pub mod error;
pub mod inline;
pub mod mysql;
pub mod script;
pub mod session;
pub mod statement;

pub use error::SqlError;
pub use session::{RecordSet, SessionCache, SessionConnector, SqlSession};
