//! Rewriting of `%s`-style positional placeholders into `$n`.
//!
//! Clients write statements such as `SELECT pg_notify(%s, %s);`. Every
//! `%s` (or `%b` / `%t`) becomes the next `$n`, and `%%` becomes a literal
//! `%`. Like the client libraries this protocol comes from, the scan does
//! not look inside string literals: a literal percent sign must be written
//! as `%%`.

use crate::domain::foundation::BridgeError;

/// Rewrites `query` to native placeholders, checking it uses exactly
/// `arg_count` of them.
pub fn to_native_placeholders(query: &str, arg_count: usize) -> Result<String, BridgeError> {
    let mut out = String::with_capacity(query.len() + arg_count);
    let mut placeholders = 0usize;
    let mut chars = query.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some('s' | 'b' | 't') => {
                placeholders += 1;
                out.push('$');
                out.push_str(&placeholders.to_string());
            }
            Some('(') => {
                return Err(BridgeError::InvalidStatement(
                    "named placeholders are not supported, use positional '%s'".to_string(),
                ));
            }
            Some(other) => {
                return Err(BridgeError::InvalidStatement(format!(
                    "only '%s', '%b', '%t' are allowed as placeholders, got '%{}'",
                    other
                )));
            }
            None => {
                return Err(BridgeError::InvalidStatement(
                    "incomplete placeholder: '%'".to_string(),
                ));
            }
        }
    }

    if placeholders != arg_count {
        return Err(BridgeError::InvalidStatement(format!(
            "the query has {} placeholders but {} parameters were passed",
            placeholders, arg_count
        )));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rewrites_positional_placeholders() {
        let sql = to_native_placeholders("SELECT pg_notify(%s, %s);", 2).unwrap();
        assert_eq!(sql, "SELECT pg_notify($1, $2);");
    }

    #[test]
    fn binary_and_text_markers_are_positional_too() {
        let sql = to_native_placeholders("INSERT INTO t VALUES (%b, %t, %s)", 3).unwrap();
        assert_eq!(sql, "INSERT INTO t VALUES ($1, $2, $3)");
    }

    #[test]
    fn double_percent_is_literal() {
        let sql = to_native_placeholders("SELECT name FROM t WHERE name LIKE 'a%%'", 0).unwrap();
        assert_eq!(sql, "SELECT name FROM t WHERE name LIKE 'a%'");
    }

    #[test]
    fn counts_past_nine() {
        let query = vec!["%s"; 11].join(",");
        let sql = to_native_placeholders(&query, 11).unwrap();
        assert!(sql.ends_with("$10,$11"));
    }

    #[test]
    fn mismatched_count_is_rejected() {
        let err = to_native_placeholders("SELECT %s", 2).unwrap_err();
        assert_eq!(
            err.to_string(),
            "the query has 1 placeholders but 2 parameters were passed"
        );
    }

    #[test]
    fn unknown_marker_is_rejected() {
        let err = to_native_placeholders("SELECT '100%'", 0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "only '%s', '%b', '%t' are allowed as placeholders, got '%''"
        );
    }

    #[test]
    fn trailing_percent_is_rejected() {
        assert!(to_native_placeholders("SELECT 1 %", 0).is_err());
    }

    #[test]
    fn named_placeholders_are_rejected() {
        assert!(to_native_placeholders("SELECT %(id)s", 1).is_err());
    }

    #[test]
    fn native_placeholders_pass_through_untouched() {
        let sql = to_native_placeholders("SELECT $1::text", 0).unwrap();
        assert_eq!(sql, "SELECT $1::text");
    }

    proptest! {
        #[test]
        fn percent_free_queries_are_unchanged(query in "[^%]{0,64}") {
            prop_assert_eq!(to_native_placeholders(&query, 0).unwrap(), query);
        }

        #[test]
        fn placeholder_count_matches_number_of_markers(n in 0usize..20) {
            let query = vec!["%s"; n].join(" ");
            let sql = to_native_placeholders(&query, n).unwrap();
            prop_assert_eq!(sql.matches('$').count(), n);
        }
    }
}
