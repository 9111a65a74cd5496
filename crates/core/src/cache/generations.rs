//! Generation-level operations: enumeration, deletion, promotion.

use super::connection::CacheDb;
use super::entries::ensure_generation;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

/// A generation and how many entries it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GenerationSummary {
    pub name: String,
    pub created_at: String,
    pub entries: u64,
}

impl CacheDb {
    /// List every generation, oldest first.
    pub async fn list_generations(&self) -> Result<Vec<GenerationSummary>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<GenerationSummary>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT g.name, g.created_at, COUNT(e.key_hash)
                    FROM generations g LEFT JOIN cache_entries e ON e.generation = g.name
                    GROUP BY g.name, g.created_at
                    ORDER BY g.created_at ASC, g.name ASC",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok(GenerationSummary {
                        name: row.get(0)?,
                        created_at: row.get(1)?,
                        entries: row.get::<_, i64>(2)? as u64,
                    })
                })?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a generation and all of its entries.
    ///
    /// Returns whether the generation existed.
    pub async fn delete_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM cache_entries WHERE generation = ?1", params![name])?;
                let removed = tx.execute("DELETE FROM generations WHERE name = ?1", params![name])?;
                tx.commit()?;
                Ok(removed > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every generation whose name is not in `keep`.
    ///
    /// Returns the deleted names.
    pub async fn delete_generations_except(&self, keep: &[&str]) -> Result<Vec<String>, Error> {
        let stale: Vec<String> = self
            .list_generations()
            .await?
            .into_iter()
            .map(|g| g.name)
            .filter(|name| !keep.contains(&name.as_str()))
            .collect();

        let mut deleted = Vec::with_capacity(stale.len());
        for name in stale {
            if self.delete_generation(&name).await? {
                tracing::debug!(generation = %name, "deleted stale generation");
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    /// Delete every generation unconditionally.
    ///
    /// Returns the number of generations deleted. Completes only after the
    /// deletion is committed.
    pub async fn purge_all(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM cache_entries", [])?;
                let count = tx.execute("DELETE FROM generations", [])?;
                tx.commit()?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Move every entry of `from` into `to` and drop `from`, atomically.
    ///
    /// Entries already present in `to` under the same key are replaced.
    /// Returns the number of entries moved.
    pub async fn promote_generation(&self, from: &str, to: &str) -> Result<u64, Error> {
        let from = from.to_string();
        let to = to.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let tx = conn.transaction()?;
                ensure_generation(&tx, &to)?;
                let moved = tx.execute(
                    "INSERT INTO cache_entries (generation, key_hash, method, url, status, headers_json, body, stored_at)
                    SELECT ?2, key_hash, method, url, status, headers_json, body, stored_at
                    FROM cache_entries WHERE generation = ?1
                    ON CONFLICT(generation, key_hash) DO UPDATE SET
                        method = excluded.method,
                        url = excluded.url,
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![from, to],
                )?;
                tx.execute("DELETE FROM cache_entries WHERE generation = ?1", params![from])?;
                tx.execute("DELETE FROM generations WHERE name = ?1", params![from])?;
                tx.commit()?;
                Ok(moved as u64)
            })
            .await
            .map_err(Error::from)
    }
}
