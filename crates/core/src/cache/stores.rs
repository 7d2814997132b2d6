//! Named store operations: open-or-create, enumerate, delete.

use super::connection::CacheDb;
use crate::Error;
use tokio_rusqlite::params;

impl CacheDb {
    /// Create the named store if it does not exist yet.
    ///
    /// Opening an existing store is a no-op; its entries are untouched.
    pub async fn open_store(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO cache_stores (name, created_at) VALUES (?1, ?2)",
                    params![name, chrono::Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Check whether a store with this name exists.
    pub async fn has_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM cache_stores WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// All store names in creation order.
    pub async fn store_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM cache_stores ORDER BY id ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a store and every entry in it.
    ///
    /// Returns false if no store had this name.
    pub async fn delete_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM cache_stores WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_store_creates_once() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_store("memorial-service-v1").await.unwrap();
        db.open_store("memorial-service-v1").await.unwrap();

        assert_eq!(db.store_names().await.unwrap(), vec!["memorial-service-v1"]);
        assert!(db.has_store("memorial-service-v1").await.unwrap());
        assert!(!db.has_store("memorial-service-v0").await.unwrap());
    }

    #[tokio::test]
    async fn test_store_names_in_creation_order() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_store("b-store").await.unwrap();
        db.open_store("a-store").await.unwrap();

        assert_eq!(db.store_names().await.unwrap(), vec!["b-store", "a-store"]);
    }

    #[tokio::test]
    async fn test_delete_store() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_store("memorial-service-v0").await.unwrap();

        assert!(db.delete_store("memorial-service-v0").await.unwrap());
        assert!(!db.delete_store("memorial-service-v0").await.unwrap());
        assert!(db.store_names().await.unwrap().is_empty());
    }
}
