//! Ordered HTTP header list with case-insensitive name lookup.
//!
//! The same type carries request headers (arrival order, duplicates kept) and
//! response headers, where the order built up by the assembler is exactly the
//! order written to the wire.

use std::fmt;

/// A case-insensitive, order-preserving, multi-value header list.
///
/// # Examples
///
/// ```
/// use basehttp::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Content-Type", "text/plain");
/// headers.prepend("Content-Length", "5");
///
/// assert_eq!(headers.get("content-type"), Some("text/plain"));
/// let names: Vec<_> = headers.iter().map(|(name, _)| name).collect();
/// assert_eq!(names, vec!["Content-Length", "Content-Type"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Adds an entry after all existing ones. Repeated names are kept.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Adds an entry before all existing ones.
    pub fn prepend(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(0, (name.into(), value.into()));
    }

    /// Moves every entry of `other` to the end of this list.
    pub fn extend(&mut self, other: Headers) {
        self.entries.extend(other.entries);
    }

    /// Values of every entry named `name`, in list order.
    pub fn get_all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> {
        self.entries
            .iter()
            .filter(move |(entry, _)| entry.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Value of the first entry named `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(entry, _)| entry.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Whether some entry named `name` carries `value`, ignoring ASCII case in both.
    pub fn has_value(&self, name: &str, value: &str) -> bool {
        self.get_all(name).any(|v| v.eq_ignore_ascii_case(value))
    }

    /// Number of entries, counting repeated names separately.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

impl<N, V> FromIterator<(N, V)> for Headers
where
    N: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

impl<N, V, const L: usize> From<[(N, V); L]> for Headers
where
    N: Into<String>,
    V: Into<String>,
{
    fn from(pairs: [(N, V); L]) -> Self {
        pairs.into_iter().collect()
    }
}

impl IntoIterator for Headers {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// The wire header block: `Name: value` lines, each ending in CRLF.
impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.iter()
            .try_for_each(|(name, value)| write!(f, "{name}: {value}\r\n"))
    }
}
