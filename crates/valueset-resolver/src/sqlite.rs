//! [`ConceptStore`] over a UMLS-style SQLite database.
//!
//! Expected tables (only the columns read here are listed):
//!
//! | Table | Columns |
//! |-------|---------|
//! | `mrconso` | `code`, `sab`, `aui` and the other [`ConceptColumn`]s |
//! | `mrsat` | `code`, `sab`, `atn`, `atv` |
//! | `mrrel` | `aui1`, `aui2`, `rel`, `sab` |

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, ToSql};
use tracing::trace;

use crate::error::ResolveResult;
use crate::traits::{ConceptStore, HierarchyEdge};
use crate::vocabulary::ConceptColumn;

const ALL_CODES_SQL: &str = "SELECT DISTINCT code FROM mrconso WHERE sab = ?1";

const CHILD_EDGES_SQL: &str = "SELECT c1.code, c2.code FROM mrrel r \
     JOIN mrconso c1 ON c1.aui = r.aui1 \
     JOIN mrconso c2 ON c2.aui = r.aui2 \
     WHERE r.rel = 'CHD' AND r.sab = ?1";

/// `?first, ?first+1, ...` for `count` parameters.
fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Read-only concept store backed by one SQLite connection.
pub struct SqliteConceptStore {
    conn: Mutex<Connection>,
}

impl SqliteConceptStore {
    /// Opens a database file read-only.
    pub fn open(path: impl AsRef<Path>) -> ResolveResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self::from_connection(conn))
    }

    /// Wraps an existing connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn query_codes(&self, sql: &str, params: &[&dyn ToSql]) -> ResolveResult<Vec<String>> {
        trace!(sql, params = params.len(), "concept query");
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(sql)?;
        let codes = stmt
            .query_map(params, |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(codes)
    }
}

impl ConceptStore for SqliteConceptStore {
    fn codes(&self, vocabulary: &str) -> ResolveResult<Vec<String>> {
        self.query_codes(ALL_CODES_SQL, &[&vocabulary as &dyn ToSql])
    }

    fn codes_by_attribute(
        &self,
        vocabulary: &str,
        attribute: &str,
        values: &[&str],
    ) -> ResolveResult<Vec<String>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT DISTINCT code FROM mrsat WHERE sab = ?1 AND atn = ?2 AND atv IN ({})",
            placeholders(3, values.len())
        );
        let mut params: Vec<&dyn ToSql> =
            vec![&vocabulary as &dyn ToSql, &attribute as &dyn ToSql];
        params.extend(values.iter().map(|v| v as &dyn ToSql));
        self.query_codes(&sql, &params)
    }

    fn codes_by_column(
        &self,
        vocabulary: &str,
        column: ConceptColumn,
        values: &[&str],
    ) -> ResolveResult<Vec<String>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        // Column names cannot be bound; they come from the allow-list only.
        let sql = format!(
            "SELECT DISTINCT code FROM mrconso WHERE sab = ?1 AND {} IN ({})",
            column.as_sql(),
            placeholders(2, values.len())
        );
        let mut params: Vec<&dyn ToSql> = vec![&vocabulary as &dyn ToSql];
        params.extend(values.iter().map(|v| v as &dyn ToSql));
        self.query_codes(&sql, &params)
    }

    fn child_edges(&self, vocabulary: &str) -> ResolveResult<Vec<HierarchyEdge>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(CHILD_EDGES_SQL)?;
        let edges = stmt
            .query_map([vocabulary], |row| {
                Ok(HierarchyEdge::new(
                    vocabulary,
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(edges)
    }
}

impl std::fmt::Debug for SqliteConceptStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConceptStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(2, 3), "?2, ?3, ?4");
        assert_eq!(placeholders(1, 1), "?1");
        assert_eq!(placeholders(3, 0), "");
    }

    #[test]
    fn test_open_missing_file_is_store_error() {
        let err = SqliteConceptStore::open("/nonexistent/dir/umls.db").unwrap_err();
        assert!(matches!(err, crate::ResolveError::StoreError(_)));
    }
}
