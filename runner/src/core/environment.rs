//! Parsing of `KEY=VALUE` environment entries.

/// Split an entry at its first `=` after position 0.
///
/// A leading `=` belongs to the key so Windows drive-cwd entries such as
/// `=C:=C:\work` survive. Returns `None` for entries without a separator or
/// with an empty key.
pub fn split_entry(entry: &str) -> Option<(&str, &str)> {
    let search_from = usize::from(entry.starts_with('='));
    let eq = entry[search_from..].find('=')? + search_from;
    let (key, value) = (&entry[..eq], &entry[eq + 1..]);
    if key.is_empty() {
        return None;
    }
    Some((key, value))
}

/// Return the first malformed entry, if any.
pub fn first_invalid<S: AsRef<str>>(entries: &[S]) -> Option<&str> {
    entries
        .iter()
        .map(AsRef::as_ref)
        .find(|entry| split_entry(entry).is_none())
}
