// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store lifecycle: open, schema application, and meta gating.

use std::path::Path;

use tokio_rusqlite::Connection;
use tracing::info;

use mnemos_core::Error;

use crate::schema;

/// The single persistent store: sessions, turns, summaries, vector
/// sidecars, FTS5 shadows, and scheduled tasks in one SQLite file.
///
/// Cloning is cheap; all clones share the one write-serializing
/// connection.
#[derive(Clone, Debug)]
pub struct Store {
    conn: Connection,
    dimension: usize,
}

/// Map a tokio-rusqlite error into the store taxonomy.
pub(crate) fn map_store_err(e: tokio_rusqlite::Error) -> Error {
    Error::StoreUnavailable {
        source: Box::new(e),
    }
}

impl Store {
    /// Open or create the store at `path` with embedding dimension `dim`.
    ///
    /// Applies the schema on first open and records the schema version
    /// and dimension in `meta`. Opening an existing file that declares a
    /// different dimension or an unknown schema version fails with
    /// `Conflict`.
    pub async fn open(path: &Path, dim: usize) -> Result<Store, Error> {
        if dim == 0 {
            return Err(Error::BadArgument(
                "embedding dimension must be positive".into(),
            ));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::StoreUnavailable {
                source: Box::new(e),
            })?;
        }

        let conn = Connection::open(path.to_path_buf())
            .await
            .map_err(map_store_err)?;

        conn.call(move |conn| {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            schema::apply_schema(conn)?;
            Ok(())
        })
        .await
        .map_err(map_store_err)?;

        let declared = Self::meta_pair(&conn).await?;
        match declared {
            Some((version, declared_dim)) => {
                if version != schema::SCHEMA_VERSION {
                    return Err(Error::Conflict(format!(
                        "unsupported schema_version {version} (expected {})",
                        schema::SCHEMA_VERSION
                    )));
                }
                if declared_dim != dim {
                    return Err(Error::Conflict(format!(
                        "store declares embedding dimension {declared_dim}, requested {dim}"
                    )));
                }
            }
            None => {
                conn.call(move |conn| {
                    conn.execute(
                        "INSERT INTO meta (key, value) VALUES ('schema_version', ?1)",
                        [schema::SCHEMA_VERSION],
                    )?;
                    conn.execute(
                        "INSERT INTO meta (key, value) VALUES ('embedding_dimension', ?1)",
                        [dim.to_string()],
                    )?;
                    Ok(())
                })
                .await
                .map_err(map_store_err)?;
                info!(dim, "store initialized");
            }
        }

        Ok(Store {
            conn,
            dimension: dim,
        })
    }

    async fn meta_pair(conn: &Connection) -> Result<Option<(String, usize)>, Error> {
        conn.call(|conn| {
            let version: Option<String> = conn
                .query_row(
                    "SELECT value FROM meta WHERE key = 'schema_version'",
                    [],
                    |row| row.get(0),
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            let dim: Option<String> = conn
                .query_row(
                    "SELECT value FROM meta WHERE key = 'embedding_dimension'",
                    [],
                    |row| row.get(0),
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            Ok(version.zip(dim))
        })
        .await
        .map_err(map_store_err)?
        .map(|(version, dim)| {
            let dim = dim
                .parse::<usize>()
                .map_err(|_| Error::Conflict(format!("corrupt embedding_dimension: {dim}")))?;
            Ok((version, dim))
        })
        .transpose()
    }

    /// The deployment-fixed embedding dimension D.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Shared handle to the write-serializing connection.
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Every stored vector must have exactly the declared dimension.
    pub(crate) fn check_dimension(&self, vec: &[f32]) -> Result<(), Error> {
        if vec.len() != self.dimension {
            return Err(Error::Conflict(format!(
                "vector dimension {} does not match store dimension {}",
                vec.len(),
                self.dimension
            )));
        }
        Ok(())
    }
}
