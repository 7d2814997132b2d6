//! Entry operations: match, put, batch put, key listing and trimming.
//!
//! Rows are decoded in two steps: the SQLite closure reads raw columns into
//! an `EntryRow`, then headers and response type are parsed outside it so
//! decoding failures surface as `Error::CorruptEntry`.

use super::connection::CacheDb;
use crate::Error;
use crate::request::RequestKey;
use crate::response::{Response, ResponseType};
use bytes::Bytes;
use chrono::SecondsFormat;
use tokio_rusqlite::{params, rusqlite};

const SELECT_ENTRY: &str = "SELECT e.response_url, e.status, e.status_text, e.response_type, e.headers_json, e.body
     FROM cache_entries e JOIN cache_stores s ON s.id = e.store_id";

struct EntryRow {
    response_url: String,
    status: u16,
    status_text: String,
    response_type: String,
    headers_json: String,
    body: Vec<u8>,
}

impl EntryRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            response_url: row.get(0)?,
            status: row.get(1)?,
            status_text: row.get(2)?,
            response_type: row.get(3)?,
            headers_json: row.get(4)?,
            body: row.get(5)?,
        })
    }

    fn into_response(self) -> Result<Response, Error> {
        let headers: Vec<(String, String)> = serde_json::from_str(&self.headers_json)
            .map_err(|e| Error::CorruptEntry(format!("headers for {}: {e}", self.response_url)))?;
        Ok(Response {
            response_type: self.response_type.parse::<ResponseType>()?,
            url: self.response_url,
            status: self.status,
            status_text: self.status_text,
            headers,
            body: Bytes::from(self.body),
        })
    }
}

/// A fully encoded row ready to be written.
struct NewEntry {
    key_hash: String,
    method: String,
    url: String,
    response_url: String,
    status: u16,
    status_text: String,
    response_type: &'static str,
    headers_json: String,
    body: Vec<u8>,
}

impl NewEntry {
    fn encode(key: &RequestKey, response: &Response) -> Result<Self, Error> {
        if key.method != "GET" {
            return Err(Error::InvalidInput(format!("only GET requests can be cached, got {}", key.method)));
        }
        let headers_json = serde_json::to_string(&response.headers)
            .map_err(|e| Error::InvalidInput(format!("failed to encode headers: {e}")))?;
        Ok(Self {
            key_hash: key.hash(),
            method: key.method.clone(),
            url: key.url.clone(),
            response_url: response.url.clone(),
            status: response.status,
            status_text: response.status_text.clone(),
            response_type: response.response_type.as_str(),
            headers_json,
            body: response.body.to_vec(),
        })
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Create the store if needed and upsert every entry, inside one transaction.
fn write_entries(conn: &mut rusqlite::Connection, store: &str, entries: &[NewEntry]) -> Result<(), Error> {
    let tx = conn.transaction()?;
    let stored_at = now();
    tx.execute(
        "INSERT OR IGNORE INTO cache_stores (name, created_at) VALUES (?1, ?2)",
        params![store, &stored_at],
    )?;
    let store_id: i64 = tx.query_row("SELECT id FROM cache_stores WHERE name = ?1", params![store], |row| row.get(0))?;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO cache_entries (
                store_id, key_hash, method, url, response_url, status, status_text,
                response_type, headers_json, body, stored_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(store_id, key_hash) DO UPDATE SET
                response_url = excluded.response_url,
                status = excluded.status,
                status_text = excluded.status_text,
                response_type = excluded.response_type,
                headers_json = excluded.headers_json,
                body = excluded.body,
                stored_at = excluded.stored_at",
        )?;
        for entry in entries {
            stmt.execute(params![
                store_id,
                &entry.key_hash,
                &entry.method,
                &entry.url,
                &entry.response_url,
                entry.status,
                &entry.status_text,
                entry.response_type,
                &entry.headers_json,
                &entry.body,
                &stored_at,
            ])?;
        }
    }

    tx.commit()?;
    Ok(())
}

impl CacheDb {
    /// Store a response under `key` in the named store, creating the store
    /// if it does not exist. An existing entry for the key is replaced.
    pub async fn put_entry(&self, store: &str, key: &RequestKey, response: &Response) -> Result<(), Error> {
        let entry = NewEntry::encode(key, response)?;
        let store = store.to_string();
        self.conn
            .call(move |conn| write_entries(conn, &store, std::slice::from_ref(&entry)))
            .await
            .map_err(Error::from)
    }

    /// Store a batch of responses atomically: either every entry is written
    /// or none is.
    pub async fn put_entries(&self, store: &str, entries: &[(RequestKey, Response)]) -> Result<(), Error> {
        let encoded = entries
            .iter()
            .map(|(key, response)| NewEntry::encode(key, response))
            .collect::<Result<Vec<_>, _>>()?;
        let store = store.to_string();
        self.conn
            .call(move |conn| write_entries(conn, &store, &encoded))
            .await
            .map_err(Error::from)
    }

    /// Look up `key` in one named store.
    pub async fn match_entry(&self, store: &str, key: &RequestKey) -> Result<Option<Response>, Error> {
        let store = store.to_string();
        let hash = key.hash();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let sql = format!("{SELECT_ENTRY} WHERE s.name = ?1 AND e.key_hash = ?2");
                let result = conn.query_row(&sql, params![store, hash], EntryRow::read);
                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(EntryRow::into_response).transpose()
    }

    /// Look up `key` across every store, in store creation order.
    pub async fn match_any(&self, key: &RequestKey) -> Result<Option<Response>, Error> {
        let hash = key.hash();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let sql = format!("{SELECT_ENTRY} WHERE e.key_hash = ?1 ORDER BY s.id ASC LIMIT 1");
                let result = conn.query_row(&sql, params![hash], EntryRow::read);
                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(EntryRow::into_response).transpose()
    }

    /// Request keys stored in the named store, oldest first.
    pub async fn entry_keys(&self, store: &str) -> Result<Vec<RequestKey>, Error> {
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<RequestKey>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT e.method, e.url FROM cache_entries e
                     JOIN cache_stores s ON s.id = e.store_id
                     WHERE s.name = ?1
                     ORDER BY e.stored_at ASC, e.rowid ASC",
                )?;
                let keys = stmt
                    .query_map(params![store], |row| Ok(RequestKey { method: row.get(0)?, url: row.get(1)? }))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete the oldest entries of a store until at most `max_entries`
    /// remain, never deleting keys listed in `keep`.
    ///
    /// Returns the number of deleted entries.
    pub async fn trim_store(&self, store: &str, max_entries: usize, keep: &[RequestKey]) -> Result<u64, Error> {
        let store = store.to_string();
        let keep: Vec<String> = keep.iter().map(RequestKey::hash).collect();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let tx = conn.transaction()?;
                let hashes: Vec<(i64, String)> = {
                    let mut stmt = tx.prepare(
                        "SELECT e.store_id, e.key_hash FROM cache_entries e
                         JOIN cache_stores s ON s.id = e.store_id
                         WHERE s.name = ?1
                         ORDER BY e.stored_at ASC, e.rowid ASC",
                    )?;
                    let rows = stmt
                        .query_map(params![store], |row| Ok((row.get(0)?, row.get(1)?)))?
                        .collect::<Result<Vec<_>, _>>()?;
                    rows
                };

                let excess = hashes.len().saturating_sub(max_entries);
                let mut deleted = 0u64;
                for (store_id, hash) in hashes.iter().filter(|(_, h)| !keep.contains(h)).take(excess) {
                    deleted += tx.execute(
                        "DELETE FROM cache_entries WHERE store_id = ?1 AND key_hash = ?2",
                        params![store_id, hash],
                    )? as u64;
                }

                tx.commit()?;
                Ok(deleted)
            })
            .await
            .map_err(Error::from)
    }
}
