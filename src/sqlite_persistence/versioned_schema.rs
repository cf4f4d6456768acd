use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection};
use tracing::info;

pub const DEFAULT_TIMESTAMP: &str = "(cast(strftime('%s','now') as int))";

/// Offset added to schema versions before they are written to
/// `PRAGMA user_version`, so a database created by something else (which
/// would normally sit at 0) is never mistaken for one of ours.
pub const BASE_DB_VERSION: usize = 99999;

#[macro_export]
macro_rules! sqlite_column {
    ($name:expr, $sql_type:expr $(, $field:ident = $value:expr)*) => {
        {
            #[allow(unused_mut)]
            let mut column = Column {
                name: $name,
                sql_type: $sql_type,
                is_primary_key: false,
                non_null: false,
                is_unique: false,
                default_value: None,
                foreign_key: None,
            };
            $(
                column.$field = $value;
            )*
            column
        }
    };
}

#[derive(Debug, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
    Real,
    Blob,
}

impl SqlType {
    fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Blob => "BLOB",
        }
    }

    fn from_declared(declared: &str) -> Option<&'static SqlType> {
        match declared {
            "TEXT" => Some(&SqlType::Text),
            "INTEGER" => Some(&SqlType::Integer),
            "REAL" => Some(&SqlType::Real),
            "BLOB" => Some(&SqlType::Blob),
            _ => None,
        }
    }
}

#[allow(unused)]
pub enum ForeignKeyOnChange {
    NoAction,
    Restrict,
    SetNull,
    SetDefault,
    Cascade,
}

impl ForeignKeyOnChange {
    fn as_sql(&self) -> &'static str {
        match self {
            ForeignKeyOnChange::NoAction => "NO ACTION",
            ForeignKeyOnChange::Restrict => "RESTRICT",
            ForeignKeyOnChange::SetNull => "SET NULL",
            ForeignKeyOnChange::SetDefault => "SET DEFAULT",
            ForeignKeyOnChange::Cascade => "CASCADE",
        }
    }
}

pub struct ForeignKey {
    pub foreign_table: &'static str,
    pub foreign_column: &'static str,
    pub on_delete: ForeignKeyOnChange,
}

pub struct Column<'a, S: AsRef<str>> {
    pub name: S,
    pub sql_type: &'a SqlType,
    pub is_primary_key: bool,
    pub non_null: bool,
    pub is_unique: bool,
    pub default_value: Option<S>,
    pub foreign_key: Option<&'a ForeignKey>,
}

impl<S: AsRef<str>> Column<'_, S> {
    fn definition_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name.as_ref(), self.sql_type.as_sql());
        if self.is_primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if self.non_null {
            sql.push_str(" NOT NULL");
        }
        if self.is_unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(default_value) = &self.default_value {
            sql.push_str(&format!(" DEFAULT {}", default_value.as_ref()));
        }
        if let Some(foreign_key) = self.foreign_key {
            sql.push_str(&format!(
                " REFERENCES {}({}) ON DELETE {}",
                foreign_key.foreign_table,
                foreign_key.foreign_column,
                foreign_key.on_delete.as_sql()
            ));
        }
        sql
    }
}

pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column<'static, &'static str>],
    pub indices: &'static [(&'static str, &'static str)],
    pub unique_constraints: &'static [&'static [&'static str]],
}

impl Table {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        let mut definitions: Vec<String> =
            self.columns.iter().map(|c| c.definition_sql()).collect();
        for unique_constraint in self.unique_constraints {
            definitions.push(format!("UNIQUE ({})", unique_constraint.join(", ")));
        }
        let create_sql = format!("CREATE TABLE {} ({});", self.name, definitions.join(", "));
        conn.execute(&create_sql, params![])
            .with_context(|| format!("Failed to create table {}", self.name))?;

        for (index_name, column_name) in self.indices {
            conn.execute(
                &format!(
                    "CREATE INDEX {} ON {}({});",
                    index_name, self.name, column_name
                ),
                params![],
            )?;
        }
        Ok(())
    }

    fn validate_columns(&self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", self.name))?;
        let actual_columns = stmt
            .query_map(params![], |row| {
                Ok((
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i32>(3)? == 1,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, i32>(5)? == 1,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        if actual_columns.len() != self.columns.len() {
            bail!(
                "Table {} has {} columns, expected {}. Found: {}, expected: {}",
                self.name,
                actual_columns.len(),
                self.columns.len(),
                actual_columns
                    .iter()
                    .map(|c| c.0.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                self.columns
                    .iter()
                    .map(|c| c.name)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        for ((name, declared_type, non_null, default_value, is_primary_key), expected) in
            actual_columns.iter().zip(self.columns.iter())
        {
            if name != expected.name {
                bail!(
                    "Table {} column name mismatch: expected {}, got {}",
                    self.name,
                    expected.name,
                    name
                );
            }
            match SqlType::from_declared(declared_type) {
                Some(sql_type) if sql_type == expected.sql_type => {}
                _ => bail!(
                    "Table {} column {} type mismatch: expected {:?}, got {}",
                    self.name,
                    expected.name,
                    expected.sql_type,
                    declared_type
                ),
            }
            if *non_null != expected.non_null {
                bail!(
                    "Table {} column {} non-null mismatch: expected {}, got {}",
                    self.name,
                    expected.name,
                    expected.non_null,
                    non_null
                );
            }
            // SQLite may report defaults wrapped in parentheses
            if default_value.as_deref().map(strip_parentheses)
                != expected.default_value.map(strip_parentheses)
            {
                bail!(
                    "Table {} column {} default value mismatch: expected {:?}, got {:?}",
                    self.name,
                    expected.name,
                    expected.default_value,
                    default_value
                );
            }
            if *is_primary_key != expected.is_primary_key {
                bail!(
                    "Table {} column {} primary key mismatch: expected {}, got {}",
                    self.name,
                    expected.name,
                    expected.is_primary_key,
                    is_primary_key
                );
            }
        }
        Ok(())
    }

    fn validate_indices(&self, conn: &Connection) -> Result<()> {
        for (index_name, _) in self.indices {
            let exists: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name=?1 AND tbl_name=?2",
                params![index_name, self.name],
                |row| row.get(0),
            )?;
            if exists == 0 {
                bail!("Table {} is missing index '{}'", self.name, index_name);
            }
        }
        Ok(())
    }

    fn validate_unique_constraints(&self, conn: &Connection) -> Result<()> {
        if self.unique_constraints.is_empty() {
            return Ok(());
        }

        let mut stmt = conn.prepare(&format!("PRAGMA index_list({})", self.name))?;
        let unique_indices: Vec<String> = stmt
            .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, i32>(2)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .filter(|(_, is_unique)| *is_unique == 1)
            .map(|(name, _)| name)
            .collect();

        let mut unique_column_sets: Vec<Vec<String>> = Vec::with_capacity(unique_indices.len());
        for index_name in &unique_indices {
            let mut idx_stmt = conn.prepare(&format!("PRAGMA index_info({})", index_name))?;
            let mut cols = idx_stmt
                .query_map([], |row| row.get::<_, String>(2))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            cols.sort();
            unique_column_sets.push(cols);
        }

        for expected in self.unique_constraints {
            let mut expected_sorted: Vec<&str> = expected.to_vec();
            expected_sorted.sort();
            let found = unique_column_sets
                .iter()
                .any(|actual| actual.iter().map(String::as_str).eq(expected_sorted.iter().copied()));
            if !found {
                bail!(
                    "Table {} is missing unique constraint on columns ({})",
                    self.name,
                    expected.join(", ")
                );
            }
        }
        Ok(())
    }

    fn validate_foreign_keys(&self, conn: &Connection) -> Result<()> {
        // id, seq, table, from, to, on_update, on_delete, match
        let mut stmt = conn.prepare(&format!("PRAGMA foreign_key_list({})", self.name))?;
        let actual_fks = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for column in self.columns {
            let Some(expected) = column.foreign_key else {
                continue;
            };
            let expected_on_delete = expected.on_delete.as_sql();
            match actual_fks.iter().find(|(from, ..)| from == column.name) {
                Some((_, table, to, on_delete))
                    if table == expected.foreign_table
                        && to == expected.foreign_column
                        && on_delete == expected_on_delete => {}
                Some((_, table, to, on_delete)) => bail!(
                    "Table {} column {} has foreign key mismatch: expected REFERENCES {}({}) ON DELETE {}, got REFERENCES {}({}) ON DELETE {}",
                    self.name,
                    column.name,
                    expected.foreign_table,
                    expected.foreign_column,
                    expected_on_delete,
                    table,
                    to,
                    on_delete
                ),
                None => bail!(
                    "Table {} column {} is missing foreign key: expected REFERENCES {}({}) ON DELETE {}",
                    self.name,
                    column.name,
                    expected.foreign_table,
                    expected.foreign_column,
                    expected_on_delete
                ),
            }
        }
        Ok(())
    }
}

fn strip_parentheses(s: &str) -> &str {
    s.strip_prefix('(')
        .and_then(|inner| inner.strip_suffix(')'))
        .unwrap_or(s)
}

pub struct VersionedSchema {
    pub version: usize,
    pub tables: &'static [Table],
    pub migration: Option<fn(&Connection) -> Result<()>>,
}

impl VersionedSchema {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute("PRAGMA foreign_keys = ON;", params![])?;
        for table in self.tables {
            table.create(conn)?;
        }
        conn.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + self.version),
            [],
        )?;
        Ok(())
    }

    pub fn validate(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            table.validate_columns(conn)?;
            table.validate_indices(conn)?;
            table.validate_unique_constraints(conn)?;
            table.validate_foreign_keys(conn)?;
        }
        Ok(())
    }
}

/// Brings `conn` to the latest of `schemas`.
///
/// A fresh database gets the latest schema created directly. An existing one
/// has its stored version validated, then every later migration applied in
/// order inside a single transaction, and finally the latest schema
/// validated.
pub fn open_versioned(conn: &mut Connection, schemas: &[VersionedSchema]) -> Result<()> {
    let Some(latest) = schemas.last() else {
        bail!("No schema versions declared");
    };

    conn.execute("PRAGMA foreign_keys = ON;", [])?;

    let table_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table'",
        [],
        |row| row.get(0),
    )?;
    if table_count == 0 {
        info!("Creating new database at schema version {}", latest.version);
        latest.create(conn)?;
        return Ok(());
    }

    let db_version = conn
        .query_row("PRAGMA user_version;", [], |row| row.get::<_, i64>(0))
        .context("Failed to read database version")?
        - BASE_DB_VERSION as i64;
    if db_version < 0 {
        bail!("Database was not created by this server (user_version too low)");
    }
    let db_version = db_version as usize;

    let Some(position) = schemas.iter().position(|s| s.version == db_version) else {
        bail!("Unknown database schema version {}", db_version);
    };
    schemas[position].validate(conn)?;

    if position + 1 < schemas.len() {
        let tx = conn.transaction()?;
        for schema in &schemas[position + 1..] {
            if let Some(migration) = schema.migration {
                info!("Migrating database to schema version {}", schema.version);
                migration(&tx)?;
            }
        }
        tx.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + latest.version),
            [],
        )?;
        tx.commit()?;
    }

    latest.validate(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALBUM_FK: ForeignKey = ForeignKey {
        foreign_table: "album",
        foreign_column: "id",
        on_delete: ForeignKeyOnChange::Cascade,
    };

    const ALBUM: Table = Table {
        name: "album",
        columns: &[
            sqlite_column!("id", &SqlType::Text, is_primary_key = true),
            sqlite_column!("name", &SqlType::Text, non_null = true),
        ],
        indices: &[],
        unique_constraints: &[],
    };

    const TRACK: Table = Table {
        name: "track",
        columns: &[
            sqlite_column!("id", &SqlType::Text, is_primary_key = true),
            sqlite_column!("title", &SqlType::Text, non_null = true),
            sqlite_column!(
                "album_id",
                &SqlType::Text,
                foreign_key = Some(&ALBUM_FK)
            ),
        ],
        indices: &[("idx_track_title", "title")],
        unique_constraints: &[&["title", "album_id"]],
    };

    const TRACK_V2: Table = Table {
        name: "track",
        columns: &[
            sqlite_column!("id", &SqlType::Text, is_primary_key = true),
            sqlite_column!("title", &SqlType::Text, non_null = true),
            sqlite_column!(
                "album_id",
                &SqlType::Text,
                foreign_key = Some(&ALBUM_FK)
            ),
            sqlite_column!(
                "added",
                &SqlType::Integer,
                non_null = true,
                default_value = Some(DEFAULT_TIMESTAMP)
            ),
        ],
        indices: &[("idx_track_title", "title")],
        unique_constraints: &[&["title", "album_id"]],
    };

    fn migrate_add_track_added(conn: &Connection) -> Result<()> {
        conn.execute(
            &format!(
                "ALTER TABLE track ADD COLUMN added INTEGER NOT NULL DEFAULT {}",
                DEFAULT_TIMESTAMP
            ),
            [],
        )?;
        Ok(())
    }

    const SCHEMAS: &[VersionedSchema] = &[
        VersionedSchema {
            version: 0,
            tables: &[ALBUM, TRACK],
            migration: None,
        },
        VersionedSchema {
            version: 1,
            tables: &[ALBUM, TRACK_V2],
            migration: Some(migrate_add_track_added),
        },
    ];

    fn user_version(conn: &Connection) -> usize {
        conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, i64>(0))
            .unwrap() as usize
    }

    #[test]
    fn created_schema_validates() {
        let conn = Connection::open_in_memory().unwrap();
        SCHEMAS[0].create(&conn).unwrap();
        SCHEMAS[0].validate(&conn).unwrap();
        assert_eq!(user_version(&conn), BASE_DB_VERSION);
    }

    #[test]
    fn detects_missing_index() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE album (id TEXT PRIMARY KEY, name TEXT NOT NULL)", [])
            .unwrap();
        conn.execute(
            "CREATE TABLE track (id TEXT PRIMARY KEY, title TEXT NOT NULL, \
             album_id TEXT REFERENCES album(id) ON DELETE CASCADE, UNIQUE (title, album_id))",
            [],
        )
        .unwrap();

        let err = SCHEMAS[0].validate(&conn).unwrap_err().to_string();
        assert!(err.contains("missing index"));
        assert!(err.contains("idx_track_title"));
    }

    #[test]
    fn unique_constraint_is_column_order_independent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE album (id TEXT PRIMARY KEY, name TEXT NOT NULL)", [])
            .unwrap();
        conn.execute(
            "CREATE TABLE track (id TEXT PRIMARY KEY, title TEXT NOT NULL, \
             album_id TEXT REFERENCES album(id) ON DELETE CASCADE, UNIQUE (album_id, title))",
            [],
        )
        .unwrap();
        conn.execute("CREATE INDEX idx_track_title ON track(title)", [])
            .unwrap();

        SCHEMAS[0].validate(&conn).unwrap();
    }

    #[test]
    fn detects_missing_unique_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE album (id TEXT PRIMARY KEY, name TEXT NOT NULL)", [])
            .unwrap();
        conn.execute(
            "CREATE TABLE track (id TEXT PRIMARY KEY, title TEXT NOT NULL UNIQUE, \
             album_id TEXT REFERENCES album(id) ON DELETE CASCADE)",
            [],
        )
        .unwrap();
        conn.execute("CREATE INDEX idx_track_title ON track(title)", [])
            .unwrap();

        let err = SCHEMAS[0].validate(&conn).unwrap_err().to_string();
        assert!(err.contains("missing unique constraint"));
    }

    #[test]
    fn detects_wrong_on_delete_action() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE album (id TEXT PRIMARY KEY, name TEXT NOT NULL)", [])
            .unwrap();
        conn.execute(
            "CREATE TABLE track (id TEXT PRIMARY KEY, title TEXT NOT NULL, \
             album_id TEXT REFERENCES album(id) ON DELETE SET NULL, UNIQUE (title, album_id))",
            [],
        )
        .unwrap();
        conn.execute("CREATE INDEX idx_track_title ON track(title)", [])
            .unwrap();

        let err = SCHEMAS[0].validate(&conn).unwrap_err().to_string();
        assert!(err.contains("foreign key mismatch"));
        assert!(err.contains("CASCADE"));
        assert!(err.contains("SET NULL"));
    }

    #[test]
    fn detects_missing_foreign_key() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE album (id TEXT PRIMARY KEY, name TEXT NOT NULL)", [])
            .unwrap();
        conn.execute(
            "CREATE TABLE track (id TEXT PRIMARY KEY, title TEXT NOT NULL, \
             album_id TEXT, UNIQUE (title, album_id))",
            [],
        )
        .unwrap();
        conn.execute("CREATE INDEX idx_track_title ON track(title)", [])
            .unwrap();

        let err = SCHEMAS[0].validate(&conn).unwrap_err().to_string();
        assert!(err.contains("missing foreign key"));
        assert!(err.contains("album_id"));
    }

    #[test]
    fn open_versioned_creates_latest_on_empty_db() {
        let mut conn = Connection::open_in_memory().unwrap();
        open_versioned(&mut conn, SCHEMAS).unwrap();
        assert_eq!(user_version(&conn), BASE_DB_VERSION + 1);
        SCHEMAS[1].validate(&conn).unwrap();
    }

    #[test]
    fn open_versioned_migrates_older_db() {
        let mut conn = Connection::open_in_memory().unwrap();
        SCHEMAS[0].create(&conn).unwrap();
        conn.execute("INSERT INTO album (id, name) VALUES ('a', 'Abbey Road')", [])
            .unwrap();
        conn.execute(
            "INSERT INTO track (id, title, album_id) VALUES ('t', 'Something', 'a')",
            [],
        )
        .unwrap();

        open_versioned(&mut conn, SCHEMAS).unwrap();

        assert_eq!(user_version(&conn), BASE_DB_VERSION + 1);
        let added: i64 = conn
            .query_row("SELECT added FROM track WHERE id = 't'", [], |r| r.get(0))
            .unwrap();
        assert!(added > 0);
    }

    #[test]
    fn open_versioned_rejects_foreign_db() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE something_else (x INTEGER)", [])
            .unwrap();
        assert!(open_versioned(&mut conn, SCHEMAS).is_err());
    }
}
