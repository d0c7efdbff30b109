use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::info;

/// Offset added to every schema version stored in `PRAGMA user_version`, so a
/// database created by something else (user_version 0) is never mistaken for ours.
pub const BASE_DB_VERSION: usize = 99999;

#[macro_export]
macro_rules! sqlite_column {
    ($name:expr, $sql_type:expr $(, $field:ident = $value:expr)*) => {
        {
            #[allow(unused_mut)]
            let mut column = $crate::sqlite_persistence::Column {
                name: $name,
                sql_type: $sql_type,
                is_primary_key: false,
                non_null: false,
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
}

impl SqlType {
    fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
        }
    }
}

#[allow(unused)]
pub enum ForeignKeyOnChange {
    NoAction,
    SetNull,
    Cascade,
}

impl ForeignKeyOnChange {
    fn as_sql(&self) -> &'static str {
        match self {
            ForeignKeyOnChange::NoAction => "NO ACTION",
            ForeignKeyOnChange::SetNull => "SET NULL",
            ForeignKeyOnChange::Cascade => "CASCADE",
        }
    }
}

pub struct ForeignKey {
    pub foreign_table: &'static str,
    pub foreign_column: &'static str,
    pub on_delete: ForeignKeyOnChange,
}

pub struct Column {
    pub name: &'static str,
    pub sql_type: &'static SqlType,
    pub is_primary_key: bool,
    pub non_null: bool,
    pub default_value: Option<&'static str>,
    pub foreign_key: Option<&'static ForeignKey>,
}

pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
    /// (index name, comma separated columns)
    pub indices: &'static [(&'static str, &'static str)],
    pub unique_constraints: &'static [&'static [&'static str]],
}

impl Table {
    pub fn create_sql(&self) -> String {
        let mut columns_sql = self
            .columns
            .iter()
            .map(|column| {
                let mut sql = format!("{} {}", column.name, column.sql_type.as_sql());
                if column.is_primary_key {
                    sql.push_str(" PRIMARY KEY");
                }
                if column.non_null {
                    sql.push_str(" NOT NULL");
                }
                if let Some(default_value) = column.default_value {
                    sql.push_str(&format!(" DEFAULT {}", default_value));
                }
                if let Some(fk) = column.foreign_key {
                    sql.push_str(&format!(
                        " REFERENCES {}({}) ON DELETE {}",
                        fk.foreign_table,
                        fk.foreign_column,
                        fk.on_delete.as_sql()
                    ));
                }
                sql
            })
            .collect::<Vec<_>>();
        for unique_constraint in self.unique_constraints {
            columns_sql.push(format!("UNIQUE ({})", unique_constraint.join(", ")));
        }
        format!("CREATE TABLE {} ({});", self.name, columns_sql.join(", "))
    }

    pub fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute(&self.create_sql(), params![])
            .with_context(|| format!("Failed to create table {}", self.name))?;
        for (index_name, columns) in self.indices {
            conn.execute(
                &format!("CREATE INDEX {} ON {}({});", index_name, self.name, columns),
                params![],
            )?;
        }
        Ok(())
    }

    /// Checks column names, types, nullability and primary keys plus the
    /// presence of every declared index.
    pub fn validate(&self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", self.name))?;
        let actual = stmt
            .query_map(params![], |row| {
                Ok((
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i32>(3)? == 1,
                    row.get::<_, i32>(5)? > 0,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        if actual.len() != self.columns.len() {
            bail!(
                "Table {} has {} columns, expected {}",
                self.name,
                actual.len(),
                self.columns.len()
            );
        }

        for ((name, sql_type, non_null, is_pk), expected) in actual.iter().zip(self.columns) {
            if name != expected.name {
                bail!(
                    "Table {} column name mismatch: expected {}, got {}",
                    self.name,
                    expected.name,
                    name
                );
            }
            if sql_type != expected.sql_type.as_sql() {
                bail!(
                    "Table {} column {} type mismatch: expected {}, got {}",
                    self.name,
                    name,
                    expected.sql_type.as_sql(),
                    sql_type
                );
            }
            if *non_null != expected.non_null || *is_pk != expected.is_primary_key {
                bail!("Table {} column {} constraints mismatch", self.name, name);
            }
        }

        for (index_name, _) in self.indices {
            let exists = conn
                .query_row(
                    "SELECT 1 FROM sqlite_master WHERE type='index' AND name=?1 AND tbl_name=?2",
                    params![index_name, self.name],
                    |_| Ok(()),
                )
                .is_ok();
            if !exists {
                bail!("Table {} is missing index '{}'", self.name, index_name);
            }
        }
        Ok(())
    }
}

pub struct VersionedSchema {
    pub version: usize,
    pub tables: &'static [Table],
    /// Upgrades a database at `version - 1` to this version.
    pub migration: Option<fn(&Connection) -> Result<()>>,
}

impl VersionedSchema {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            table.create(conn)?;
        }
        set_db_version(conn, self.version)
    }

    pub fn validate(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            table.validate(conn)?;
        }
        Ok(())
    }
}

fn set_db_version(conn: &Connection, version: usize) -> Result<()> {
    conn.execute(
        &format!("PRAGMA user_version = {}", BASE_DB_VERSION + version),
        [],
    )?;
    Ok(())
}

fn read_db_version(conn: &Connection) -> Result<usize> {
    let raw = conn
        .query_row("PRAGMA user_version;", [], |row| row.get::<usize, i64>(0))
        .context("Failed to read database version")?;
    let version = raw - BASE_DB_VERSION as i64;
    if version < 0 {
        bail!(
            "Database version {} does not contain base db version {}",
            raw,
            BASE_DB_VERSION
        );
    }
    Ok(version as usize)
}

/// Brings an opened connection to the latest of `schemas`: creates it from
/// scratch when `fresh`, otherwise validates the stored version and runs the
/// pending migrations in order.
pub fn prepare_connection(
    conn: &Connection,
    schemas: &[VersionedSchema],
    fresh: bool,
) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    let latest = schemas.last().context("No schema defined")?;

    if fresh {
        return latest.create(conn);
    }

    let version = read_db_version(conn)?;
    let current = schemas
        .get(version)
        .with_context(|| format!("Database version {} is too new", version))?;
    current.validate(conn)?;

    for schema in schemas.iter().skip(version + 1) {
        if let Some(migration) = schema.migration {
            info!("Migrating db from version {} to {}", version, schema.version);
            migration(conn)?;
        }
        set_db_version(conn, schema.version)?;
    }
    Ok(())
}

pub fn open_versioned<P: AsRef<Path>>(
    db_path: P,
    schemas: &[VersionedSchema],
) -> Result<Connection> {
    let fresh = !db_path.as_ref().exists();
    let conn = Connection::open(db_path.as_ref())
        .with_context(|| format!("Failed to open {:?}", db_path.as_ref()))?;
    prepare_connection(&conn, schemas, fresh)?;
    Ok(conn)
}
