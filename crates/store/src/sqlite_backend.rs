use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use tracing::debug;

use crate::{SlotBackend, StoreResult};

/// Slots kept as rows of a single SQLite table keyed by name.
pub struct SqliteBackend {
    conn: Connection,
    path: PathBuf,
}

impl SqliteBackend {
    pub fn open_or_create(path: &Path) -> StoreResult<Self> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        // journal_mode reports the resulting mode back as a row.
        conn.pragma_update_and_check(None, "journal_mode", &"WAL", |_| Ok(()))?;
        conn.pragma_update(None, "synchronous", &"NORMAL")?;
        apply_migrations(&conn)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn apply_migrations(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(include_str!("../migrations/V0001__slots.sql"))?;
    conn.execute(
        "INSERT OR IGNORE INTO migrations(name, applied_at) VALUES(?1, strftime('%s','now'))",
        params!["V0001__slots"],
    )?;
    Ok(())
}

impl SlotBackend for SqliteBackend {
    fn get(&self, name: &str) -> StoreResult<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT json FROM slots WHERE name = ?1 LIMIT 1")?;
        let mut rows = stmt.query(params![name])?;
        if let Some(row) = rows.next()? {
            let json: String = row.get(0)?;
            Ok(Some(json))
        } else {
            Ok(None)
        }
    }

    fn put(&self, name: &str, contents: &str) -> StoreResult<()> {
        let now = chrono::Utc::now().timestamp();
        self.conn.execute(
            "INSERT INTO slots(name, json, updated_at) VALUES(?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET json = excluded.json, updated_at = excluded.updated_at",
            params![name, contents, now],
        )?;
        debug!(name, bytes = contents.len(), "wrote slot row");
        Ok(())
    }

    fn exists(&self, name: &str) -> StoreResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM slots WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        // substr instead of LIKE: ids may contain `_` or `%`.
        let mut stmt = self.conn.prepare(
            "SELECT name FROM slots WHERE substr(name, 1, length(?1)) = ?1 ORDER BY name",
        )?;
        let rows = stmt.query_map(params![prefix], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    fn rename(&self, from: &str, to: &str) -> StoreResult<()> {
        let now = chrono::Utc::now().timestamp();
        let changed = self.conn.execute(
            "UPDATE slots SET name = ?2, updated_at = ?3 WHERE name = ?1",
            params![from, to, now],
        )?;
        if changed == 0 {
            return Err(io::Error::new(io::ErrorKind::NotFound, format!("no slot named {from}")).into());
        }
        debug!(from, to, "renamed slot row");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("slots.db");
        {
            let backend = SqliteBackend::open_or_create(&path).unwrap();
            backend.put("x-markers.json", "{}").unwrap();
        }
        let backend = SqliteBackend::open_or_create(&path).unwrap();
        assert_eq!(backend.get("x-markers.json").unwrap().as_deref(), Some("{}"));
        assert_eq!(backend.path(), path.as_path());
    }

    #[test]
    fn list_treats_prefix_literally() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SqliteBackend::open_or_create(&dir.path().join("slots.db")).unwrap();
        backend.put("a_b-markers.json", "1").unwrap();
        backend.put("axb-markers.json", "2").unwrap();
        assert_eq!(
            backend.list("a_b-").unwrap(),
            vec!["a_b-markers.json".to_string()]
        );
    }

    #[test]
    fn upsert_and_rename() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SqliteBackend::open_or_create(&dir.path().join("slots.db")).unwrap();
        backend.put("s-markers.json", "old").unwrap();
        backend.put("s-markers.json", "new").unwrap();
        assert_eq!(backend.get("s-markers.json").unwrap().as_deref(), Some("new"));

        backend.rename("s-markers.json", "s-markers01.json").unwrap();
        assert!(!backend.exists("s-markers.json").unwrap());
        assert!(backend.exists("s-markers01.json").unwrap());
        assert!(backend.rename("s-markers.json", "s-markers02.json").is_err());
    }
}
