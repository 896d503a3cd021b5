//! Canonical connection strings.
//!
//! A canonical string is what the native driver receives and what the pool
//! registry uses as its key. Two inputs that differ only in keyword case,
//! whitespace, parameter order or synonym choice resolve to the same string.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::allowlist::AllowList;
use crate::builder::{ConnectionStringBuilder, DriverIdentity};
use crate::error::{ParseError, ParseErrors};
use crate::parser::ConnectionStringParser;

/// A validated, rebuilt connection string.
///
/// Cheap to clone. `Debug` and `Display` hide the password; use
/// [`CanonicalConnectionString::as_str`] to get the real value.
#[derive(Clone)]
pub struct CanonicalConnectionString {
    value: Arc<str>,
    redacted: Arc<str>,
}

impl CanonicalConnectionString {
    pub(crate) fn new(value: String, redacted: String) -> Self {
        Self {
            value: value.into(),
            redacted: redacted.into(),
        }
    }

    /// The full connection string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// The connection string with the password replaced by `***`.
    #[must_use]
    pub fn redacted(&self) -> &str {
        &self.redacted
    }

    /// Shared handle to the full string.
    #[must_use]
    pub fn to_shared(&self) -> Arc<str> {
        Arc::clone(&self.value)
    }
}

impl PartialEq for CanonicalConnectionString {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for CanonicalConnectionString {}

impl Hash for CanonicalConnectionString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl AsRef<str> for CanonicalConnectionString {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for CanonicalConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CanonicalConnectionString")
            .field(&&*self.redacted)
            .finish()
    }
}

impl fmt::Display for CanonicalConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted)
    }
}

/// Resolve a user connection string and keyword overrides into a canonical
/// string using the default [`DriverIdentity`].
pub fn resolve<I, K, V>(raw: &str, overrides: I) -> Result<CanonicalConnectionString, ParseErrors>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    resolve_with(raw, overrides, &DriverIdentity::default())
}

/// Resolve a user connection string and keyword overrides into a canonical
/// string.
///
/// The raw string is validated against the standard allow-list and every
/// problem is reported at once. Overrides go through the same keyword table:
/// they replace a parsed value for the same canonical name, reserved
/// keywords are errors, and unknown keywords are logged and dropped.
pub fn resolve_with<I, K, V>(
    raw: &str,
    overrides: I,
    identity: &DriverIdentity,
) -> Result<CanonicalConnectionString, ParseErrors>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    let allowlist = AllowList::standard();
    let parsed = ConnectionStringParser::new()
        .with_allowlist(allowlist)
        .parse(raw)?;

    let filtered = allowlist.filter(parsed);
    let mut builder =
        ConnectionStringBuilder::from_params(filtered.accepted).identity(identity.clone());

    let mut errors = Vec::new();
    for (key, value) in overrides {
        let key = key.as_ref();
        match allowlist.normalize(key) {
            Some(_) if allowlist.is_reserved(key) => {
                errors.push(ParseError::ReservedKeyword {
                    keyword: key.to_string(),
                });
            }
            Some(canonical) => {
                builder.set(canonical, value);
            }
            None => {
                tracing::warn!(
                    keyword = key,
                    "connection keyword override is not in the allow-list and will be ignored"
                );
            }
        }
    }

    if let Some(errors) = ParseErrors::from_vec(errors) {
        return Err(errors);
    }

    Ok(builder.build_canonical())
}
