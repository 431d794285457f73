//! MySQL dialect.
//!
//! - Backtick identifier quoting
//! - Numeric booleans (1/0)
//! - `CAST(x AS CHAR)` for text casts
//! - No NULLS FIRST/LAST in ORDER BY

use super::helpers;
use super::SqlDialect;

/// MySQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct MySql;

impl SqlDialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_backtick(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn text_cast_type(&self) -> &'static str {
        "CHAR"
    }

    fn supports_nulls_ordering(&self) -> bool {
        false
    }
}
