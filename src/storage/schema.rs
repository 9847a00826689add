use duckdb::{Connection, Result as DuckResult};
use log::info;

pub struct StorageSchema;

impl StorageSchema {
    pub fn create_tables(conn: &Connection) -> DuckResult<()> {
        // 键值表：每个 key 保存一整份 JSON 数据
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key VARCHAR PRIMARY KEY,
                value VARCHAR NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        info!("Storage tables created successfully");
        Ok(())
    }
}
