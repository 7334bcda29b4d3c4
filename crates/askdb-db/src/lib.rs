// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, params};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use time::macros::format_description;
use time::{Duration, OffsetDateTime};

pub const APP_NAME: &str = "askdb";

const MAX_QUERY_ROWS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PragmaColumn {
    pub cid: i32,
    pub name: String,
    pub column_type: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub primary_key: i32,
}

/// Read-only view over the user's SQLite database. askdb never writes to
/// it outside of the demo seed; questions run through the guarded
/// [`Store::read_only_query`] path only.
#[derive(Debug)]
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn table_names(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT name
                FROM sqlite_master
                WHERE type = 'table'
                  AND name NOT LIKE 'sqlite_%'
                ORDER BY name ASC
                ",
            )
            .context("prepare table names query")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .context("query table names")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect table names")
    }

    pub fn table_columns(&self, table: &str) -> Result<Vec<PragmaColumn>> {
        if !is_safe_identifier(table) {
            bail!("invalid table name: {table:?}");
        }

        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({table})"))
            .with_context(|| format!("inspect columns for {table}"))?;
        let rows = stmt
            .query_map([], |row| {
                let not_null: i32 = row.get(3)?;
                let primary_key: i32 = row.get(5)?;
                Ok(PragmaColumn {
                    cid: row.get(0)?,
                    name: row.get(1)?,
                    column_type: row.get(2)?,
                    not_null: not_null != 0,
                    default_value: row.get(4)?,
                    primary_key,
                })
            })
            .with_context(|| format!("query column info for {table}"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("collect columns for {table}"))
    }

    /// Execute a single SELECT statement and stringify the result grid.
    /// Output is capped at 200 rows.
    pub fn read_only_query(&self, query: &str) -> Result<(Vec<String>, Vec<Vec<String>>)> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            bail!("empty query");
        }
        if trimmed.contains(';') {
            bail!("multiple statements are not allowed");
        }

        let upper = trimmed.to_ascii_uppercase();
        if !upper.starts_with("SELECT") {
            bail!("only SELECT queries are allowed");
        }

        const DISALLOWED_KEYWORDS: &[&str] = &[
            "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "ATTACH", "DETACH", "PRAGMA",
            "REINDEX", "VACUUM",
        ];
        for keyword in DISALLOWED_KEYWORDS {
            if contains_word(&upper, keyword) {
                bail!("query contains disallowed keyword: {keyword}");
            }
        }

        let mut stmt = self
            .conn
            .prepare(trimmed)
            .context("prepare read-only query")?;
        let columns = stmt
            .column_names()
            .iter()
            .map(|column| (*column).to_owned())
            .collect::<Vec<_>>();
        let mut rows = stmt.query([]).context("execute read-only query")?;

        let mut output_rows = Vec::new();
        while let Some(row) = rows.next().context("scan read-only query rows")? {
            if output_rows.len() >= MAX_QUERY_ROWS {
                break;
            }

            let mut output = Vec::with_capacity(columns.len());
            for index in 0..columns.len() {
                let value = row
                    .get_ref(index)
                    .map(value_ref_to_string)
                    .with_context(|| format!("read column {index} from query result"))?;
                output.push(value);
            }
            output_rows.push(output);
        }

        Ok((columns, output_rows))
    }

    /// Create and fill the demo dataset used by `--demo` runs and tests.
    pub fn seed_demo_data(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS territories (
                  id INTEGER PRIMARY KEY,
                  name TEXT NOT NULL,
                  region TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS customers (
                  id INTEGER PRIMARY KEY,
                  name TEXT NOT NULL,
                  city TEXT NOT NULL,
                  territory_id INTEGER NOT NULL REFERENCES territories (id)
                );
                CREATE TABLE IF NOT EXISTS orders (
                  id INTEGER PRIMARY KEY,
                  customer_id INTEGER NOT NULL REFERENCES customers (id),
                  ordered_on TEXT NOT NULL,
                  total_cents INTEGER NOT NULL
                );
                ",
            )
            .context("create demo schema")?;

        const TERRITORIES: [(&str, &str); 4] = [
            ("Northlake", "Midwest"),
            ("Riverside", "West"),
            ("Harborview", "East"),
            ("Pinecrest", "South"),
        ];
        for (index, (name, region)) in TERRITORIES.iter().enumerate() {
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO territories (id, name, region) VALUES (?, ?, ?)",
                    params![index as i64 + 1, name, region],
                )
                .with_context(|| format!("insert demo territory {name}"))?;
        }

        const CUSTOMERS: [(&str, &str, i64); 6] = [
            ("Alpine Outfitters", "Boulder", 1),
            ("Cedar & Main", "Portland", 2),
            ("Harbor Supply Co", "Boston", 3),
            ("Lakeshore Goods", "Chicago", 1),
            ("Magnolia Trading", "Atlanta", 4),
            ("Summit Hardware", "Seattle", 2),
        ];
        for (index, (name, city, territory_id)) in CUSTOMERS.iter().enumerate() {
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO customers (id, name, city, territory_id) VALUES (?, ?, ?, ?)",
                    params![index as i64 + 1, name, city, territory_id],
                )
                .with_context(|| format!("insert demo customer {name}"))?;
        }

        let today = OffsetDateTime::now_utc().date();
        let date_format = format_description!("[year]-[month]-[day]");
        for order in 0..18_i64 {
            let placed = today - Duration::days(order * 11);
            let ordered_on = placed
                .format(&date_format)
                .context("format demo order date")?;
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO orders (id, customer_id, ordered_on, total_cents) VALUES (?, ?, ?, ?)",
                    params![
                        order + 1,
                        order % 6 + 1,
                        ordered_on,
                        4_250 + order * 1_730,
                    ],
                )
                .with_context(|| format!("insert demo order {}", order + 1))?;
        }

        Ok(())
    }
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("ASKDB_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set ASKDB_DB_PATH to a readable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("askdb.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

fn value_ref_to_string(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(value) => value.to_string(),
        ValueRef::Real(value) => value.to_string(),
        ValueRef::Text(value) => String::from_utf8_lossy(value).into_owned(),
        ValueRef::Blob(value) => format!("{value:?}"),
    }
}

fn is_safe_identifier(identifier: &str) -> bool {
    !identifier.is_empty()
        && identifier
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || byte == b'_')
}

fn contains_word(source: &str, keyword: &str) -> bool {
    let bytes = source.as_bytes();
    let keyword_len = keyword.len();
    if keyword_len == 0 || keyword_len > bytes.len() {
        return false;
    }

    let mut index = 0usize;
    while let Some(offset) = source[index..].find(keyword) {
        let start = index + offset;
        let end = start + keyword_len;
        let left_ok = start == 0 || !is_identifier_char(bytes[start - 1]);
        let right_ok = end >= bytes.len() || !is_identifier_char(bytes[end]);
        if left_ok && right_ok {
            return true;
        }
        index = start + 1;
    }
    false
}

fn is_identifier_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}
