//! SqliteLogStore - 本番用のローカルログストア
//!
//! 2 テーブル構成:
//! - `task_log(tid, length, fin)`: レコードのヘッダ
//! - `task_log_blob(tid, seq, blob)`: 追記される chunk（seq 昇順で再生）
//!
//! 追記はヘッダ更新と blob 挿入を 1 トランザクションで行います。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use tokio::sync::Mutex;

use crate::domain::{LogRecord, StoreError, TaskKey, text_len};
use crate::ports::{LogStore, StoreOpener};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS task_log (
        tid     TEXT PRIMARY KEY,
        length  INTEGER NOT NULL,
        fin     INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS task_log_blob (
        tid     TEXT NOT NULL,
        seq     INTEGER NOT NULL,
        blob    BLOB NOT NULL,
        PRIMARY KEY (tid, seq)
    );";

/// Log store backed by a single SQLite database file.
pub struct SqliteLogStore {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SqliteLogStore {
    /// Open (or create) the database at `path`. Blocking.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Open(e.to_string()))?;
        }
        let conn = Connection::open(path).map_err(|e| StoreError::Open(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous  = NORMAL;",
        )
        .map_err(|e| StoreError::Open(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| StoreError::Open(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_record(conn: &Connection, tid: &str) -> Result<Option<LogRecord>, StoreError> {
    let header: Option<(i64, bool)> = conn
        .query_row(
            "SELECT length, fin FROM task_log WHERE tid = ?1",
            params![tid],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let Some((length, fin)) = header else {
        return Ok(None);
    };

    let mut stmt = conn.prepare("SELECT blob FROM task_log_blob WHERE tid = ?1 ORDER BY seq ASC")?;
    let chunks = stmt
        .query_map(params![tid], |row| row.get::<_, Vec<u8>>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(LogRecord {
        key: tid.to_string(),
        chunks,
        total_length: length.max(0) as u64,
        finished: fin,
    }))
}

fn append_chunk(
    conn: &mut Connection,
    tid: &str,
    chunk: &[u8],
    finished: bool,
) -> Result<(), StoreError> {
    let added = text_len(&String::from_utf8_lossy(chunk)) as i64;
    let tx = conn.transaction()?;

    let header: Option<(i64, bool)> = tx
        .query_row(
            "SELECT length, fin FROM task_log WHERE tid = ?1",
            params![tid],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    match header {
        Some((length, fin)) => {
            tx.execute(
                "UPDATE task_log SET length = ?1, fin = ?2 WHERE tid = ?3",
                params![length + added, fin || finished, tid],
            )?;
        }
        None => {
            tx.execute(
                "INSERT INTO task_log (tid, length, fin) VALUES (?1, ?2, ?3)",
                params![tid, added, finished],
            )?;
        }
    }

    let seq: i64 = tx.query_row(
        "SELECT COALESCE(MAX(seq) + 1, 0) FROM task_log_blob WHERE tid = ?1",
        params![tid],
        |row| row.get(0),
    )?;
    tx.execute(
        "INSERT INTO task_log_blob (tid, seq, blob) VALUES (?1, ?2, ?3)",
        params![tid, seq, chunk],
    )?;
    tx.commit()?;
    Ok(())
}

#[async_trait]
impl LogStore for SqliteLogStore {
    async fn exists(&self, key: &TaskKey) -> Result<bool, StoreError> {
        let conn = self.conn.lock().await;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM task_log WHERE tid = ?1",
                params![key.tid()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    async fn read(&self, key: &TaskKey) -> Result<Option<LogRecord>, StoreError> {
        let conn = self.conn.lock().await;
        read_record(&conn, &key.tid())
    }

    async fn append(
        &self,
        key: &TaskKey,
        chunk: Vec<u8>,
        finished: bool,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().await;
        append_chunk(&mut conn, &key.tid(), &chunk, finished)
    }

    async fn set_finished(&self, key: &TaskKey) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE task_log SET fin = 1 WHERE tid = ?1",
            params![key.tid()],
        )?;
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        conn.execute_batch(
            "DELETE FROM task_log_blob;
             DELETE FROM task_log;",
        )?;
        Ok(())
    }
}

/// Opens a `SqliteLogStore` off the async runtime.
pub struct SqliteOpener {
    path: PathBuf,
}

impl SqliteOpener {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl StoreOpener for SqliteOpener {
    async fn open(&self) -> Result<Arc<dyn LogStore>, StoreError> {
        let path = self.path.clone();
        let store = tokio::task::spawn_blocking(move || SqliteLogStore::open(&path))
            .await
            .map_err(|e| StoreError::Open(format!("open task failed: {}", e)))??;
        Ok(Arc::new(store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, SqliteLogStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteLogStore::open(&dir.path().join("spool.sqlite3")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn append_then_read_preserves_chunk_order() {
        let (_dir, store) = temp_store();
        let key = TaskKey::new("u1", "t1");

        store.append(&key, b"line1\n".to_vec(), false).await.unwrap();
        store.append(&key, b"line2\n".to_vec(), true).await.unwrap();

        let record = store.read(&key).await.unwrap().unwrap();
        assert_eq!(record.key, "u1_t1");
        assert_eq!(record.chunks, vec![b"line1\n".to_vec(), b"line2\n".to_vec()]);
        assert_eq!(record.total_length, 12);
        assert!(record.finished);
    }

    #[tokio::test]
    async fn missing_record_reads_as_none() {
        let (_dir, store) = temp_store();
        let key = TaskKey::new("u1", "nope");
        assert!(!store.exists(&key).await.unwrap());
        assert!(store.read(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn finished_is_sticky_across_appends() {
        let (_dir, store) = temp_store();
        let key = TaskKey::new("u1", "t1");
        store.append(&key, b"a".to_vec(), true).await.unwrap();
        store.append(&key, b"b".to_vec(), false).await.unwrap();
        assert!(store.read(&key).await.unwrap().unwrap().finished);
    }

    #[tokio::test]
    async fn set_finished_flips_flag_only() {
        let (_dir, store) = temp_store();
        let key = TaskKey::new("u1", "t1");
        store.append(&key, b"abc".to_vec(), false).await.unwrap();
        store.set_finished(&key).await.unwrap();

        let record = store.read(&key).await.unwrap().unwrap();
        assert!(record.finished);
        assert_eq!(record.chunks.len(), 1);
        assert_eq!(record.total_length, 3);
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("spool.sqlite3");
        let key = TaskKey::new("u1", "t1");
        {
            let store = SqliteLogStore::open(&path).unwrap();
            store.append(&key, b"persisted".to_vec(), false).await.unwrap();
        }
        let store = SqliteOpener::new(&path).open().await.unwrap();
        let record = store.read(&key).await.unwrap().unwrap();
        assert_eq!(record.text(), "persisted");
        assert!(!record.finished);
    }

    #[tokio::test]
    async fn clear_all_empties_both_tables() {
        let (_dir, store) = temp_store();
        let key = TaskKey::new("u1", "t1");
        store.append(&key, b"a".to_vec(), false).await.unwrap();
        store.clear_all().await.unwrap();
        assert!(!store.exists(&key).await.unwrap());

        store.append(&key, b"b".to_vec(), false).await.unwrap();
        let record = store.read(&key).await.unwrap().unwrap();
        assert_eq!(record.chunks, vec![b"b".to_vec()]);
    }
}
