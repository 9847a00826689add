use std::fs;
use std::path::Path;

use duckdb::{params, Connection};
use log::{error, info};

use super::schema::StorageSchema;
use super::store::BlobStore;
use crate::config::StorageConfig;
use crate::error::ScolioResult;

/// DuckDB 文件中的键值存储
pub struct DuckDbStore {
    conn: Connection,
}

impl DuckDbStore {
    pub fn open(config: &StorageConfig) -> ScolioResult<Self> {
        let db_path = Path::new(&config.path);

        // 确保data目录存在
        if config.auto_create_dir {
            if let Some(dir) = db_path.parent().filter(|d| !d.as_os_str().is_empty()) {
                if let Err(e) = fs::create_dir_all(dir) {
                    error!("Failed to create data directory {}: {}", dir.display(), e);
                }
            }
        }

        let conn = Connection::open(db_path)?;
        info!("Database connection established at: {}", db_path.display());

        StorageSchema::create_tables(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> ScolioResult<Self> {
        let conn = Connection::open_in_memory()?;
        StorageSchema::create_tables(&conn)?;
        Ok(Self { conn })
    }
}

impl BlobStore for DuckDbStore {
    fn get_item(&self, key: &str) -> ScolioResult<Option<String>> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv_store WHERE key = ?")?;
        let mut rows = stmt.query(params![key])?;

        match rows.next()? {
            Some(row) => Ok(Some(row.get::<_, String>(0)?)),
            None => Ok(None),
        }
    }

    fn set_item(&mut self, key: &str, value: &str) -> ScolioResult<()> {
        self.conn.execute(
            "INSERT INTO kv_store (key, value) VALUES (?, ?)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
            params![key, value],
        )?;
        Ok(())
    }
}
