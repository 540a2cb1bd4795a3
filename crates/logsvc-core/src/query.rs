//! LogQL query compiler.
//!
//! Turns a label set and a keyword list into a stream selector followed by
//! line filters:
//!
//! ```text
//! {cluster_id="c1",app="pd"} |= "error" |= "region \"42\""
//! ```

/// Escape a value for use inside a double-quoted LogQL string.
pub fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            other => out.push(other),
        }
    }
    out
}

/// Build a LogQL query.
///
/// Labels keep caller order. Each non-empty keyword becomes a ` |= "<kw>"`
/// line filter, in order. Empty keywords are skipped.
pub fn build_logql<K, V, S>(labels: &[(K, V)], keywords: &[S]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
    S: AsRef<str>,
{
    let selector = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k.as_ref(), escape_value(v.as_ref())))
        .collect::<Vec<_>>()
        .join(",");

    let mut query = format!("{{{}}}", selector);
    for keyword in keywords {
        let keyword = keyword.as_ref();
        if keyword.is_empty() {
            continue;
        }
        query.push_str(" |= \"");
        query.push_str(&escape_value(keyword));
        query.push('"');
    }
    query
}
