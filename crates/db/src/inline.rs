//! Ad-hoc statements supplied by the caller.

use crate::error::SqlError;
use crate::session::{RecordSet, SqlSession};

/// Run `statement` and collect every result set it produces.
pub async fn execute_inline(
    session: &dyn SqlSession,
    statement: &str,
) -> Result<Vec<RecordSet>, SqlError> {
    let statement = statement.trim();
    if statement.is_empty() {
        return Err(SqlError::Statement("empty statement".to_string()));
    }
    let sets = session.query(statement).await?;
    tracing::debug!(record_sets = sets.len(), "Inline statement executed");
    Ok(sets)
}

/// Render record sets as text.
///
/// Each set opens with a `------RecordSet(i)------` header line (0-based),
/// then one line per row with every cell followed by four spaces. Empty sets
/// keep their header so indices line up with the statements.
pub fn render_record_sets(sets: &[RecordSet]) -> String {
    let mut out = String::new();
    for (i, set) in sets.iter().enumerate() {
        out.push_str(&format!("------RecordSet({i})------\n"));
        for row in &set.rows {
            for cell in row {
                out.push_str(cell);
                out.push_str("    ");
            }
            out.push('\n');
        }
    }
    out
}
