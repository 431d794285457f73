//! SQLite dialect.
//!
//! - ANSI identifier quoting (`"`)
//! - Numeric booleans (1/0)
//! - No EXTRACT; date parts rendered through STRFTIME

use super::helpers;
use super::SqlDialect;

/// SQLite dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn supports_extract(&self) -> bool {
        false
    }
}
