//! Shared formatting helpers for dialect implementations.

/// Quote an identifier with double quotes, escaping embedded quotes.
///
/// `weird"name` becomes `"weird""name"`.
pub fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote an identifier with backticks, escaping embedded backticks.
///
/// `weird`name` becomes `` `weird``name` ``.
pub fn quote_backtick(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

/// Format a boolean as a TRUE/FALSE keyword literal.
pub fn format_bool_keyword(b: bool) -> &'static str {
    if b {
        "TRUE"
    } else {
        "FALSE"
    }
}

/// Format a boolean as a 1/0 numeric literal.
pub fn format_bool_numeric(b: bool) -> &'static str {
    if b {
        "1"
    } else {
        "0"
    }
}
