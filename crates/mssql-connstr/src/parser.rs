//! ODBC connection string parser.
//!
//! Implements the `key=value;key=value` grammar from MS-ODBCSTR:
//!
//! ```text
//! Server=localhost;Database=mydb;PWD={p}}w{{d};
//! ```
//!
//! - Pairs are separated by `;`, a trailing `;` is allowed.
//! - A value starting with `{` is braced and runs to the matching unescaped
//!   `}`; inside it `}}` stands for `}` and `{{` stands for `{`.
//! - Any other value runs to the next `;` with trailing whitespace removed.
//! - Keywords are case-insensitive and returned lowercased.
//!
//! The scanner keeps going after a bad token so that a single call reports
//! every problem. The one exception is an unclosed brace: there is no way to
//! tell where the value was meant to end, so scanning stops there.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::allowlist::{AllowList, PASSWORD};
use crate::error::{ParseError, ParseErrors};

/// Validated keyword/value pairs from one parse.
///
/// Keys are the keywords as written, trimmed and lowercased. Values are
/// unescaped.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ParsedParameters {
    params: BTreeMap<String, String>,
}

impl ParsedParameters {
    /// Look up a value by keyword, ignoring case.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .get(&key.trim().to_lowercase())
            .map(String::as_str)
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether no parameters were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Iterate over `(keyword, value)` pairs in keyword order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Consume into the underlying map.
    #[must_use]
    pub fn into_map(self) -> BTreeMap<String, String> {
        self.params
    }
}

impl fmt::Debug for ParsedParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never expose passwords in debug output
        let mut map = f.debug_map();
        for (key, value) in &self.params {
            if AllowList::standard().normalize(key) == Some(PASSWORD) {
                map.entry(key, &"[REDACTED]");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}

impl IntoIterator for ParsedParameters {
    type Item = (String, String);
    type IntoIter = std::collections::btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.into_iter()
    }
}

/// Connection string parser.
///
/// Without an allow-list any keyword is accepted except the reserved ones.
/// With one, unknown keywords are errors and synonyms count as duplicates of
/// each other (`Server=a;Addr=b` is rejected).
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionStringParser<'a> {
    allowlist: Option<&'a AllowList>,
    allow_reserved: bool,
}

impl<'a> ConnectionStringParser<'a> {
    /// Create a parser with no allow-list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate keywords against an allow-list.
    #[must_use]
    pub fn with_allowlist(mut self, allowlist: &'a AllowList) -> Self {
        self.allowlist = Some(allowlist);
        self
    }

    /// Accept reserved keywords instead of rejecting them.
    ///
    /// Only useful for reading back strings the builder produced.
    #[must_use]
    pub fn allow_reserved(mut self, allow: bool) -> Self {
        self.allow_reserved = allow;
        self
    }

    /// Parse a connection string.
    pub fn parse(&self, input: &str) -> Result<ParsedParameters, ParseErrors> {
        let bytes = input.as_bytes();
        let len = bytes.len();

        let mut pos = 0;
        let mut errors = Vec::new();
        let mut params = BTreeMap::new();
        let mut seen = HashSet::new();

        loop {
            while pos < len && (bytes[pos] == b';' || bytes[pos].is_ascii_whitespace()) {
                pos += 1;
            }
            if pos >= len {
                break;
            }

            let key_start = pos;
            while pos < len && bytes[pos] != b'=' && bytes[pos] != b';' {
                pos += 1;
            }

            if pos >= len || bytes[pos] != b'=' {
                errors.push(ParseError::MissingValue {
                    keyword: input[key_start..pos].trim().to_string(),
                });
                continue;
            }

            let keyword = input[key_start..pos].trim();
            pos += 1;

            if keyword.is_empty() {
                errors.push(ParseError::EmptyKeyword);
                pos = skip_to_separator(bytes, pos);
                continue;
            }

            let value = match read_value(input, pos) {
                Ok((value, next)) => {
                    pos = next;
                    value
                }
                Err(position) => {
                    return Err(ParseErrors::fatal(ParseError::UnclosedBrace {
                        keyword: keyword.to_string(),
                        position,
                    }));
                }
            };

            match self.check_keyword(keyword, &mut seen) {
                Some(error) => errors.push(error),
                None => {
                    params.insert(keyword.to_lowercase(), value);
                }
            }
        }

        match ParseErrors::from_vec(errors) {
            Some(errors) => Err(errors),
            None => {
                tracing::debug!(parameters = params.len(), "parsed connection string");
                Ok(ParsedParameters { params })
            }
        }
    }

    fn check_keyword(&self, keyword: &str, seen: &mut HashSet<String>) -> Option<ParseError> {
        let table = self.allowlist.unwrap_or(AllowList::standard());

        if !self.allow_reserved && table.is_reserved(keyword) {
            return Some(ParseError::ReservedKeyword {
                keyword: keyword.to_string(),
            });
        }

        let identity = match self.allowlist {
            Some(allowlist) => match allowlist.normalize(keyword) {
                Some(canonical) => canonical.to_string(),
                None => {
                    return Some(ParseError::UnknownKeyword {
                        keyword: keyword.to_string(),
                    });
                }
            },
            None => keyword.to_lowercase(),
        };

        if !seen.insert(identity) {
            return Some(ParseError::DuplicateKeyword {
                keyword: keyword.to_string(),
            });
        }

        None
    }
}

/// Parse a connection string, optionally validating against an allow-list.
pub fn parse(input: &str, allowlist: Option<&AllowList>) -> Result<ParsedParameters, ParseErrors> {
    let parser = ConnectionStringParser::new();
    match allowlist {
        Some(allowlist) => parser.with_allowlist(allowlist).parse(input),
        None => parser.parse(input),
    }
}

fn skip_to_separator(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos] != b';' {
        pos += 1;
    }
    pos
}

/// Read the value starting at `pos`. Returns the value and the position after
/// it, or the offset of an unclosed `{`.
fn read_value(input: &str, mut pos: usize) -> Result<(String, usize), usize> {
    let bytes = input.as_bytes();
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }

    if pos < bytes.len() && bytes[pos] == b'{' {
        read_braced_value(input, pos)
    } else {
        let end = skip_to_separator(bytes, pos);
        Ok((input[pos..end].trim_end().to_string(), end))
    }
}

fn read_braced_value(input: &str, open: usize) -> Result<(String, usize), usize> {
    let bytes = input.as_bytes();
    let len = bytes.len();

    let mut value = String::new();
    let mut pos = open + 1;
    let mut chunk_start = pos;

    while pos < len {
        match bytes[pos] {
            b'}' if pos + 1 < len && bytes[pos + 1] == b'}' => {
                value.push_str(&input[chunk_start..=pos]);
                pos += 2;
                chunk_start = pos;
            }
            b'}' => {
                value.push_str(&input[chunk_start..pos]);
                return Ok((value, pos + 1));
            }
            b'{' if pos + 1 < len && bytes[pos + 1] == b'{' => {
                value.push_str(&input[chunk_start..=pos]);
                pos += 2;
                chunk_start = pos;
            }
            _ => pos += 1,
        }
    }

    Err(open)
}
