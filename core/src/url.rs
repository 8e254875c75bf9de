//! Request URL composition.
//!
//! The upstream service takes the query in a `q` parameter appended to a
//! path that already carries its own parameters, so the composer always
//! appends `&q=`, never `?q=`.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::config::Endpoints;
use crate::error::AtomicsError;

/// Bytes left as-is: unreserved and reserved URI characters. Everything else,
/// including space, `%`, `<`, `>`, `"` and non-ASCII, is percent-encoded.
const QUERY_UNSAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b';')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b',')
    .remove(b'[')
    .remove(b']');

/// Escape a query string for the `q` parameter.
pub fn escape_query(sql: &str) -> String {
    utf8_percent_encode(sql, QUERY_UNSAFE).to_string()
}

/// Build `http://{host}:{port}{path}&q={escaped sql}` for `service`.
pub fn construct_url_for_sql(
    endpoints: &Endpoints,
    service: &str,
    sql: &str,
) -> Result<String, AtomicsError> {
    let endpoint = endpoints.get(service)?;
    Ok(format!(
        "http://{}:{}{}&q={}",
        endpoint.host,
        endpoint.port,
        endpoint.path,
        escape_query(sql)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Endpoint;

    fn endpoints() -> Endpoints {
        Endpoints::new().insert(
            "my_type",
            Endpoint::new("orb-atomics.example.com", "8080", "/jAtomics/select/?version=1"),
        )
    }

    #[test]
    fn composes_url_with_escaped_query() {
        let url = construct_url_for_sql(&endpoints(), "my_type", "select * from foo where bar = 'wibble'")
            .unwrap();
        assert_eq!(
            url,
            "http://orb-atomics.example.com:8080/jAtomics/select/?version=1&q=select%20*%20from%20foo%20where%20bar%20=%20'wibble'"
        );
    }

    #[test]
    fn escapes_unsafe_characters_only() {
        assert_eq!(escape_query("a,b=1&c"), "a,b=1&c");
        assert_eq!(escape_query("x < 5 AND y > \"z\""), "x%20%3C%205%20AND%20y%20%3E%20%22z%22");
        assert_eq!(escape_query("100%"), "100%25");
        assert_eq!(escape_query("café"), "caf%C3%A9");
        assert_eq!(escape_query("a{b}|c"), "a%7Bb%7D%7Cc");
    }

    #[test]
    fn unknown_service_fails() {
        let err = construct_url_for_sql(&endpoints(), "hr", "SELECT * FROM t").unwrap_err();
        assert!(matches!(err, AtomicsError::UnknownService(ref s) if s == "hr"));
    }
}
