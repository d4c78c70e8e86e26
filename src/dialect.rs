use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::SqlTemplateError;

/// The SQL dialect templates are compiled for.
///
/// Read it from a CLI flag or a config file owned by the host application:
/// ```rust
/// use sql_template::prelude::*;
///
/// let dialect: Dialect = "cockroachdb".parse().unwrap();
/// assert_eq!(dialect.placeholder_style(), PlaceholderStyle::Numbered);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `SQLite`
    Sqlite,
    /// `PostgreSQL`
    Postgres,
    /// `MySQL`
    Mysql,
    /// `MariaDB`
    Mariadb,
    /// `CockroachDB` (postgres wire protocol)
    Cockroachdb,
    /// SQL Server
    Sqlserver,
}

/// How a dialect spells a bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?`, values bound in order.
    Positional,
    /// `$1`, `$2`, ... values bound in order.
    Numbered,
    /// `@name`, values bound by name.
    Named,
}

/// Abstract column types a template can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Bytes,
    DateTime,
    Text,
    Varchar(u32),
    Id,
    Integer,
    Boolean,
}

impl Dialect {
    pub const ALL: [Dialect; 6] = [
        Dialect::Sqlite,
        Dialect::Postgres,
        Dialect::Mysql,
        Dialect::Mariadb,
        Dialect::Cockroachdb,
        Dialect::Sqlserver,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
            Dialect::Mysql => "mysql",
            Dialect::Mariadb => "mariadb",
            Dialect::Cockroachdb => "cockroachdb",
            Dialect::Sqlserver => "sqlserver",
        }
    }

    #[must_use]
    pub fn placeholder_style(self) -> PlaceholderStyle {
        match self {
            Dialect::Postgres | Dialect::Cockroachdb => PlaceholderStyle::Numbered,
            Dialect::Sqlserver => PlaceholderStyle::Named,
            Dialect::Sqlite | Dialect::Mysql | Dialect::Mariadb => PlaceholderStyle::Positional,
        }
    }

    /// True when the driver matches values by name rather than by position.
    #[must_use]
    pub fn binds_by_name(self) -> bool {
        self.placeholder_style() == PlaceholderStyle::Named
    }

    /// Placeholder token for the argument `name` occupying 1-based `position`.
    #[must_use]
    pub fn placeholder(self, name: &str, position: usize) -> String {
        match self.placeholder_style() {
            PlaceholderStyle::Positional => "?".to_string(),
            PlaceholderStyle::Numbered => format!("${position}"),
            PlaceholderStyle::Named => format!("@{}", param_name(name)),
        }
    }

    #[must_use]
    pub fn column_type(self, column: ColumnType) -> String {
        match column {
            ColumnType::Bytes => match self {
                Dialect::Sqlite => "BLOB",
                Dialect::Postgres | Dialect::Cockroachdb => "BYTEA",
                Dialect::Mysql | Dialect::Mariadb => "MEDIUMBLOB",
                Dialect::Sqlserver => "VARBINARY(MAX)",
            }
            .to_string(),
            ColumnType::DateTime => match self {
                Dialect::Sqlite | Dialect::Postgres | Dialect::Cockroachdb => "TIMESTAMP",
                Dialect::Mysql | Dialect::Mariadb => "DATETIME(3)",
                Dialect::Sqlserver => "DATETIME2",
            }
            .to_string(),
            ColumnType::Text => match self {
                Dialect::Sqlite | Dialect::Postgres | Dialect::Cockroachdb => "TEXT",
                Dialect::Mysql | Dialect::Mariadb => "MEDIUMTEXT",
                Dialect::Sqlserver => "NVARCHAR(MAX)",
            }
            .to_string(),
            ColumnType::Varchar(size) => match self {
                Dialect::Sqlite => "TEXT".to_string(),
                Dialect::Postgres | Dialect::Cockroachdb | Dialect::Mysql | Dialect::Mariadb => {
                    format!("VARCHAR({size})")
                }
                Dialect::Sqlserver => format!("NVARCHAR({size})"),
            },
            // ids are 20 character sortable identifiers
            ColumnType::Id => self.column_type(ColumnType::Varchar(20)),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::Boolean => match self {
                Dialect::Sqlite => "INTEGER",
                Dialect::Postgres | Dialect::Cockroachdb | Dialect::Mysql | Dialect::Mariadb => {
                    "BOOL"
                }
                Dialect::Sqlserver => "BIT",
            }
            .to_string(),
        }
    }

    /// Current UTC time as evaluated by the server at execution time.
    #[must_use]
    pub fn now_literal(self) -> &'static str {
        match self {
            Dialect::Sqlite => "CURRENT_TIMESTAMP",
            Dialect::Postgres | Dialect::Cockroachdb => "(NOW() AT TIME ZONE 'UTC')",
            Dialect::Mysql | Dialect::Mariadb => "UTC_TIMESTAMP(3)",
            Dialect::Sqlserver => "SYSUTCDATETIME()",
        }
    }

    #[must_use]
    pub fn bool_literal(self, value: bool) -> &'static str {
        match (self, value) {
            (Dialect::Sqlite | Dialect::Sqlserver, true) => "1",
            (Dialect::Sqlite | Dialect::Sqlserver, false) => "0",
            (_, true) => "true",
            (_, false) => "false",
        }
    }

    /// The zero timestamp, spelled the way each backend accepts it as a column default.
    #[must_use]
    pub fn default_datetime(self) -> &'static str {
        match self {
            Dialect::Mysql | Dialect::Mariadb => "'0001-01-01 00:00:00.000'",
            Dialect::Sqlite => "'0001-01-01 00:00:00+00:00'",
            Dialect::Postgres | Dialect::Cockroachdb | Dialect::Sqlserver => {
                "'0001-01-01T00:00:00Z'"
            }
        }
    }

    /// Quote an identifier that collides with a reserved word.
    #[must_use]
    pub fn escape_identifier(self, word: &str) -> String {
        match self {
            Dialect::Sqlite | Dialect::Postgres | Dialect::Cockroachdb => {
                format!("\"{}\"", word.replace('"', "\"\""))
            }
            Dialect::Mysql | Dialect::Mariadb => format!("`{}`", word.replace('`', "``")),
            Dialect::Sqlserver => format!("[{}]", word.replace(']', "]]")),
        }
    }
}

/// Name a value is bound under for named-parameter dialects.
///
/// List members are declared as `name:0`, `name:1`, ...; the colon is not a legal
/// identifier character, so anything outside `[A-Za-z0-9_]` becomes `_`.
#[must_use]
pub fn param_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = SqlTemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Dialect::ALL
            .into_iter()
            .find(|d| d.as_str() == lowered)
            .ok_or_else(|| SqlTemplateError::ConfigError(format!("unsupported dialect '{s}'")))
    }
}

/// Write-once record of the active dialect.
#[derive(Debug, Default)]
pub struct DialectRegistry {
    cell: OnceLock<Dialect>,
}

impl DialectRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self) -> Option<Dialect> {
        self.cell.get().copied()
    }

    /// Fix the dialect. Setting the same dialect again is a no-op.
    ///
    /// # Errors
    /// Returns `SqlTemplateError::ConfigError` if a different dialect was already established.
    pub fn establish(&self, dialect: Dialect) -> Result<bool, SqlTemplateError> {
        let mut first = false;
        let current = *self.cell.get_or_init(|| {
            first = true;
            dialect
        });
        if current == dialect {
            Ok(first)
        } else {
            Err(SqlTemplateError::ConfigError(format!(
                "dialect already established as {current}, cannot switch to {dialect}"
            )))
        }
    }
}
