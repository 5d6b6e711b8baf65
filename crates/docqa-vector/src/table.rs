//! LanceDB connection helpers.

use lancedb::{connect, Connection, Table};

use docqa_core::{Error, Result};

pub async fn open_db(uri: &str) -> Result<Connection> {
    connect(uri).execute().await.map_err(Error::store)
}

/// Opens `name` if the table exists.
pub async fn open_existing(conn: &Connection, name: &str) -> Result<Option<Table>> {
    let names = conn.table_names().execute().await.map_err(Error::store)?;
    if !names.iter().any(|n| n == name) {
        return Ok(None);
    }
    let table = conn.open_table(name).execute().await.map_err(Error::store)?;
    Ok(Some(table))
}

/// Single-quoted SQL literal for Lance filter expressions.
pub fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
